//! Column typing for extracted tables.
//!
//! Odoo returns loosely typed JSON: dates are strings, a missing value is
//! often `false`, and numeric fields may arrive as strings. Before a
//! transformation sees a table, every column gets one Arrow type chosen by
//! [`classify_column`] and every value that does not fit becomes null.
//!
//! Classification, first match wins:
//! 1. name contains `date` (any case): UTC timestamp
//! 2. numeric-hinted name whose present values are mostly numeric: Int64 when
//!    every number is integral, else Float64
//! 3. inferred: all booleans, all numbers (with `false` as missing), else text

use crate::error::OdooSynthError;
use crate::models::RawTable;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use datafusion::arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampNanosecondArray,
};
use datafusion::arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::Value;
use std::sync::Arc;

/// Timezone attached to every timestamp column.
pub const UTC: &str = "UTC";

/// Name fragments marking a numeric field, matched against `_`-separated words.
const NUMERIC_HINTS: &[&str] = &[
    "amount", "price", "qty", "quantity", "total", "balance", "cost", "tax", "discount", "weight",
    "volume",
];

/// Storage type chosen for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Nanosecond timestamp in UTC
    Timestamp,
    /// 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// Boolean
    Boolean,
    /// UTF-8 text
    Text,
}

impl ColumnKind {
    /// Arrow type for this kind.
    pub fn data_type(self) -> DataType {
        match self {
            Self::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, Some(UTC.into())),
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Boolean => DataType::Boolean,
            Self::Text => DataType::Utf8,
        }
    }
}

fn is_date_name(name: &str) -> bool {
    name.to_ascii_lowercase().contains("date")
}

fn is_numeric_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with("_ids") {
        return false;
    }
    if lower == "id" || lower.ends_with("_id") {
        return true;
    }
    lower.split('_').any(|word| NUMERIC_HINTS.contains(&word))
}

/// Reads a number from a JSON number or a numeric string.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Parses the timestamp shapes Odoo emits; naive values are taken as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Chooses the storage type of a column from its name and values.
///
/// # Example
/// ```rust
/// use odoosynth_core::sandbox::{ColumnKind, classify_column};
/// use serde_json::json;
///
/// let values = [json!("2024-01-05 10:00:00"), json!(false)];
/// assert_eq!(classify_column("date_order", &values), ColumnKind::Timestamp);
///
/// let values = [json!(10), json!(12.5)];
/// assert_eq!(classify_column("amount_total", &values), ColumnKind::Float);
///
/// let values = [json!("[1,2]")];
/// assert_eq!(classify_column("tag_ids", &values), ColumnKind::Text);
/// ```
pub fn classify_column<'a, I>(name: &str, values: I) -> ColumnKind
where
    I: IntoIterator<Item = &'a Value>,
{
    if is_date_name(name) {
        return ColumnKind::Timestamp;
    }

    let numeric_hint = is_numeric_name(name);
    let mut all_integral = true;
    let mut all_boolean = true;
    let mut all_numeric = true;
    let mut any_number = false;
    let mut any_boolean = false;
    let mut numeric_like = 0usize;
    let mut non_numeric = 0usize;

    for value in values {
        match value {
            Value::Null => {}
            Value::Bool(flag) => {
                any_boolean = true;
                // Odoo reports a missing value as false
                if *flag {
                    all_numeric = false;
                    non_numeric += 1;
                }
            }
            Value::Number(_) => {
                any_number = true;
                all_boolean = false;
                numeric_like += 1;
                if as_integer(value).is_none() {
                    all_integral = false;
                }
            }
            other => {
                all_boolean = false;
                all_numeric = false;
                if as_number(other).is_some() {
                    numeric_like += 1;
                    if as_integer(other).is_none() {
                        all_integral = false;
                    }
                } else {
                    non_numeric += 1;
                }
            }
        }
    }

    // A hint never overrides text-valued data such as `amount_type`
    if numeric_hint && (non_numeric == 0 || numeric_like > non_numeric) {
        return if all_integral {
            ColumnKind::Integer
        } else {
            ColumnKind::Float
        };
    }

    if any_boolean && all_boolean {
        return ColumnKind::Boolean;
    }

    if any_number && all_numeric {
        return if all_integral {
            ColumnKind::Integer
        } else {
            ColumnKind::Float
        };
    }

    ColumnKind::Text
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn build_array<'a, I>(kind: ColumnKind, values: I) -> ArrayRef
where
    I: Iterator<Item = &'a Value>,
{
    match kind {
        ColumnKind::Timestamp => Arc::new(
            values
                .map(|value| parse_timestamp(value).and_then(|ts| ts.timestamp_nanos_opt()))
                .collect::<TimestampNanosecondArray>()
                .with_timezone(UTC),
        ),
        ColumnKind::Integer => Arc::new(values.map(as_integer).collect::<Int64Array>()),
        ColumnKind::Float => Arc::new(values.map(as_number).collect::<Float64Array>()),
        ColumnKind::Boolean => Arc::new(values.map(Value::as_bool).collect::<BooleanArray>()),
        ColumnKind::Text => Arc::new(values.map(to_text).collect::<StringArray>()),
    }
}

/// Converts a raw table into a typed Arrow batch.
///
/// # Errors
/// Returns `TransformationExecutionFailed` if Arrow rejects the batch
pub fn to_record_batch(table: &RawTable) -> crate::Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays = Vec::with_capacity(table.columns().len());

    for (index, name) in table.columns().iter().enumerate() {
        let kind = classify_column(name, table.column_values(index));
        fields.push(Field::new(name.as_str(), kind.data_type(), true));
        arrays.push(build_array(kind, table.column_values(index)));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .map_err(|e| OdooSynthError::execution_failed(format!("Failed to build input table: {}", e)))
}

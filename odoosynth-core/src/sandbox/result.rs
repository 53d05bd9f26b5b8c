//! Output of a successful transformation.

use crate::error::OdooSynthError;
use crate::models::Record;
use chrono::DateTime;
use datafusion::arrow::datatypes::{Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::pretty::pretty_format_batches;
use datafusion::common::ScalarValue;
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

static UNSAFE_RUN: OnceLock<Regex> = OnceLock::new();

/// Rewrites a column name into `[A-Za-z0-9_]` with no leading digit.
///
/// Every run of other characters becomes one underscore.
///
/// # Example
/// ```rust
/// use odoosynth_core::sandbox::sanitize_column_name;
///
/// assert_eq!(sanitize_column_name("2024 Revenue (€)"), "_2024_Revenue_");
/// assert_eq!(sanitize_column_name("salesperson_id"), "salesperson_id");
/// ```
pub fn sanitize_column_name(name: &str) -> String {
    let pattern = UNSAFE_RUN
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9_]+").expect("Invalid column name pattern"));

    let cleaned = pattern.replace_all(name, "_");
    match cleaned.chars().next() {
        None => "_".to_string(),
        Some(first) if first.is_ascii_digit() => format!("_{}", cleaned),
        Some(_) => cleaned.into_owned(),
    }
}

/// Sanitizes every name and suffixes collisions with `_2`, `_3`, ...
fn sanitize_all<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .map(|name| {
            let base = sanitize_column_name(name);
            let mut candidate = base.clone();
            let mut suffix = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

/// Final table produced by a transformation, with sanitized column names.
#[derive(Debug, Clone)]
pub struct ResultTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl ResultTable {
    /// Wraps engine output, renaming columns to safe identifiers.
    ///
    /// # Errors
    /// Returns `TransformationExecutionFailed` if a batch does not match the
    /// schema
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> crate::Result<Self> {
        let names = sanitize_all(schema.fields().iter().map(|field| field.name().as_str()));
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .zip(names)
            .map(|(field, name)| (**field).clone().with_name(name))
            .collect();
        let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

        let batches = batches
            .into_iter()
            .filter(|batch| batch.num_rows() > 0)
            .map(|batch| RecordBatch::try_new(schema.clone(), batch.columns().to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                OdooSynthError::execution_failed(format!("Result does not match its schema: {}", e))
            })?;

        Ok(Self { schema, batches })
    }

    /// Arrow schema with sanitized names.
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Result batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }

    /// Total number of rows.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Whether the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Converts every row to a JSON object keyed by column name.
    ///
    /// # Errors
    /// Returns `TransformationExecutionFailed` if a cell cannot be read
    pub fn to_json_rows(&self) -> crate::Result<Vec<Record>> {
        let mut rows = Vec::with_capacity(self.num_rows());

        for batch in &self.batches {
            for row in 0..batch.num_rows() {
                let mut record = Record::new();
                for (field, column) in self.schema.fields().iter().zip(batch.columns()) {
                    let scalar = ScalarValue::try_from_array(column, row).map_err(|e| {
                        OdooSynthError::execution_failed(format!(
                            "Failed to read column '{}': {}",
                            field.name(),
                            e
                        ))
                    })?;
                    record.insert(field.name().clone(), scalar_to_json(&scalar));
                }
                rows.push(record);
            }
        }

        Ok(rows)
    }

    /// Renders the table as aligned text.
    ///
    /// # Errors
    /// Returns `TransformationExecutionFailed` if a value cannot be formatted
    pub fn to_pretty_string(&self) -> crate::Result<String> {
        if self.batches.is_empty() {
            return Ok(format!("({} columns, no rows)", self.schema.fields().len()));
        }

        pretty_format_batches(&self.batches)
            .map(|table| table.to_string())
            .map_err(|e| OdooSynthError::execution_failed(format!("Failed to format result: {}", e)))
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn timestamp(seconds: i64, nanos: u32) -> Value {
    DateTime::from_timestamp(seconds, nanos)
        .map_or(Value::Null, |ts| Value::String(ts.to_rfc3339()))
}

/// Maps one engine value to JSON; timestamps become RFC 3339 strings in UTC.
fn scalar_to_json(value: &ScalarValue) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    match value {
        ScalarValue::Boolean(Some(v)) => Value::Bool(*v),
        ScalarValue::Int8(Some(v)) => Value::from(*v),
        ScalarValue::Int16(Some(v)) => Value::from(*v),
        ScalarValue::Int32(Some(v)) => Value::from(*v),
        ScalarValue::Int64(Some(v)) => Value::from(*v),
        ScalarValue::UInt8(Some(v)) => Value::from(*v),
        ScalarValue::UInt16(Some(v)) => Value::from(*v),
        ScalarValue::UInt32(Some(v)) => Value::from(*v),
        ScalarValue::UInt64(Some(v)) => Value::from(*v),
        ScalarValue::Float32(Some(v)) => float(f64::from(*v)),
        ScalarValue::Float64(Some(v)) => float(*v),
        ScalarValue::Utf8(Some(v))
        | ScalarValue::LargeUtf8(Some(v))
        | ScalarValue::Utf8View(Some(v)) => Value::String(v.clone()),
        ScalarValue::TimestampSecond(Some(v), _) => timestamp(*v, 0),
        ScalarValue::TimestampMillisecond(Some(v), _) => {
            timestamp(v.div_euclid(1_000), (v.rem_euclid(1_000) * 1_000_000) as u32)
        }
        ScalarValue::TimestampMicrosecond(Some(v), _) => {
            timestamp(v.div_euclid(1_000_000), (v.rem_euclid(1_000_000) * 1_000) as u32)
        }
        ScalarValue::TimestampNanosecond(Some(v), _) => {
            timestamp(v.div_euclid(1_000_000_000), v.rem_euclid(1_000_000_000) as u32)
        }
        ScalarValue::Decimal128(Some(_), _, _) => value
            .to_string()
            .parse::<f64>()
            .map_or_else(|_| Value::String(value.to_string()), float),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Float64Array, Int64Array, StringArray, TimestampNanosecondArray};
    use datafusion::arrow::datatypes::{DataType, TimeUnit};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_sanitize_column_name() {
        assert_eq!(sanitize_column_name("2024 Revenue (€)"), "_2024_Revenue_");
        assert_eq!(sanitize_column_name("total_revenue"), "total_revenue");
        assert_eq!(sanitize_column_name("Sales Person"), "Sales_Person");
        assert_eq!(sanitize_column_name("month"), "month");
        assert_eq!(sanitize_column_name("sum(amount_total)"), "sum_amount_total_");
        assert_eq!(sanitize_column_name(""), "_");
    }

    #[test]
    fn test_sanitize_all_deduplicates() {
        let names = sanitize_all(["a b", "a-b", "a_b"].into_iter());
        assert_eq!(names, vec!["a_b", "a_b_2", "a_b_3"]);
    }

    fn sample() -> ResultTable {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Sales Person", DataType::Utf8, true),
            Field::new("2024 Revenue (€)", DataType::Float64, true),
            Field::new("orders", DataType::Int64, false),
            Field::new(
                "month",
                DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
                true,
            ),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![Some("Mitchell"), None])),
                Arc::new(Float64Array::from(vec![Some(1500.5), None])),
                Arc::new(Int64Array::from(vec![3, 1])),
                Arc::new(
                    TimestampNanosecondArray::from(vec![Some(1_704_067_200_000_000_000), None])
                        .with_timezone("UTC"),
                ),
            ],
        )
        .unwrap();
        ResultTable::new(schema, vec![batch]).unwrap()
    }

    #[test]
    fn test_result_table_sanitizes_schema() {
        let table = sample();
        assert_eq!(
            table.column_names(),
            vec!["Sales_Person", "_2024_Revenue_", "orders", "month"]
        );
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.batches()[0].schema().field(1).name(), "_2024_Revenue_");
    }

    #[test]
    fn test_to_json_rows() {
        let rows = sample().to_json_rows().unwrap();
        assert_eq!(rows[0].get("Sales_Person"), Some(&json!("Mitchell")));
        assert_eq!(rows[0].get("_2024_Revenue_"), Some(&json!(1500.5)));
        assert_eq!(rows[0].get("orders"), Some(&json!(3)));
        assert_eq!(rows[0].get("month"), Some(&json!("2024-01-01T00:00:00+00:00")));
        assert_eq!(rows[1].get("Sales_Person"), Some(&Value::Null));
        assert_eq!(rows[1].get("month"), Some(&Value::Null));
    }

    #[test]
    fn test_pretty_output() {
        let text = sample().to_pretty_string().unwrap();
        assert!(text.contains("Sales_Person"));
        assert!(text.contains("Mitchell"));
    }

    #[test]
    fn test_empty_result() {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
        let table = ResultTable::new(schema, Vec::new()).unwrap();
        assert!(table.is_empty());
        assert!(table.to_json_rows().unwrap().is_empty());
        assert_eq!(table.to_pretty_string().unwrap(), "(1 columns, no rows)");
    }
}

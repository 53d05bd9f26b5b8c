//! Flattening of remote records into [`RawTable`]s.
//!
//! Odoo returns many2one fields as `[id, display_name]` pairs and x2many
//! fields as id lists. The normalizer reduces a reference pair to its id and
//! stringifies any other array or object as compact JSON, so every cell of the
//! resulting table is a scalar. Pure and free of I/O.

use crate::models::{RawTable, Record};
use serde_json::Value;
use std::collections::BTreeSet;

/// Normalizes a single value.
///
/// # Example
/// ```rust
/// use odoosynth_core::normalize::normalize_value;
/// use serde_json::json;
///
/// assert_eq!(normalize_value(&json!([7, "Mitchell Admin"])), json!(7));
/// assert_eq!(normalize_value(&json!([1, 2, 3])), json!("[1,2,3]"));
/// assert_eq!(normalize_value(&json!(42.5)), json!(42.5));
/// ```
pub fn normalize_value(value: &Value) -> Value {
    if let Some(id) = reference_id(value) {
        return Value::from(id);
    }

    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar.clone(),
    }
}

/// Returns the identifier of an `[integer, label]` reference pair.
///
/// The label is a string, or `false` when the target has no display name.
/// A pair of integers is an x2many id list and is left alone.
fn reference_id(value: &Value) -> Option<i64> {
    match value.as_array()?.as_slice() {
        [id, Value::String(_) | Value::Bool(false) | Value::Null] if id.is_i64() || id.is_u64() => {
            id.as_i64()
        }
        _ => None,
    }
}

/// Normalizes records into a table whose columns are the union of all record
/// keys, in name order. Missing values become null.
pub fn normalize(records: &[Record]) -> RawTable {
    let columns: BTreeSet<&String> = records.iter().flat_map(|record| record.keys()).collect();
    let columns: Vec<String> = columns.into_iter().cloned().collect();
    normalize_with_columns(records, &columns)
}

/// Normalizes records onto an explicit column list.
///
/// Keys not in `columns` (such as the `id` Odoo always returns) are dropped
/// and absent keys become null.
pub fn normalize_with_columns(records: &[Record], columns: &[String]) -> RawTable {
    let mut table = RawTable::new(columns.to_vec());

    for record in records {
        let row = columns
            .iter()
            .map(|column| record.get(column).map_or(Value::Null, normalize_value))
            .collect();
        table.push_row(row);
    }

    table
}

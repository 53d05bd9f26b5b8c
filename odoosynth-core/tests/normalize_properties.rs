//! Property tests for record normalization.

use odoosynth_core::Record;
use odoosynth_core::normalize::{normalize, normalize_value};
use proptest::prelude::*;
use serde_json::{Map, Value};

const FIELDS: &[&str] = &["name", "partner_id", "tag_ids", "amount_total", "active", "note"];

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9).prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            // many2one shape
            (any::<u32>(), "[A-Z][a-z]{1,8}")
                .prop_map(|(id, name)| Value::Array(vec![Value::from(id), Value::String(name)])),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..3)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

fn arb_record() -> impl Strategy<Value = Record> {
    prop::collection::vec((prop::sample::select(FIELDS), arb_value()), 0..FIELDS.len()).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(field, value)| (field.to_string(), value))
                .collect::<Map<String, Value>>()
        },
    )
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

proptest! {
    #[test]
    fn prop_normalized_tables_are_flat(records in prop::collection::vec(arb_record(), 0..8)) {
        let table = normalize(&records);

        prop_assert!(table.is_flat());
        prop_assert_eq!(table.num_rows(), records.len());
        for row in table.rows() {
            prop_assert_eq!(row.len(), table.columns().len());
            prop_assert!(row.iter().all(is_scalar));
        }
    }

    #[test]
    fn prop_normalize_is_idempotent(records in prop::collection::vec(arb_record(), 0..8)) {
        let once = normalize(&records);
        let twice = normalize(&once.to_records());

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_value_normalization_is_stable(value in arb_value()) {
        let once = normalize_value(&value);

        prop_assert!(is_scalar(&once));
        prop_assert_eq!(normalize_value(&once), once);
    }

    #[test]
    fn prop_columns_cover_every_key(records in prop::collection::vec(arb_record(), 1..8)) {
        let table = normalize(&records);

        for record in &records {
            for key in record.keys() {
                prop_assert!(table.column_index(key).is_some());
            }
        }
    }
}

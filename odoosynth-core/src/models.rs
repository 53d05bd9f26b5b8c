//! Data types passed between pipeline stages.
//!
//! Everything here is plain data: catalogs and schemas discovered on the
//! remote, the plan produced by the reasoning service, extracted tables and
//! the bundle handed to a human between synthesis and execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One record as returned by the remote: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

static NULL: Value = Value::Null;

/// Name of the relation a transformation must define.
pub const ENTRY_POINT: &str = "transform_data";

/// Sorted, de-duplicated set of remote model names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog(BTreeSet<String>);

impl ModelCatalog {
    /// Builds a catalog, dropping duplicates and blank names.
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            models
                .into_iter()
                .map(Into::into)
                .filter(|name| !name.trim().is_empty())
                .collect(),
        )
    }

    /// Whether `model` is in the catalog.
    pub fn contains(&self, model: &str) -> bool {
        self.0.contains(model)
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Model names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Queryable field names per model, discovered lazily.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema(BTreeMap<String, BTreeSet<String>>);

impl FieldSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the fields of one model, replacing any earlier entry.
    pub fn insert<I, S>(&mut self, model: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(model.into(), fields.into_iter().map(Into::into).collect());
    }

    /// Fields of `model`, if it was discovered.
    pub fn fields_of(&self, model: &str) -> Option<&BTreeSet<String>> {
        self.0.get(model)
    }

    /// Whether `model` has a field named `field`.
    pub fn contains_field(&self, model: &str, field: &str) -> bool {
        self.0
            .get(model)
            .is_some_and(|fields| fields.contains(field))
    }

    /// Discovered model names.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of discovered models.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over (model, fields).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(model, fields)| (model.as_str(), fields))
    }
}

/// Model name to the ordered list of fields to extract.
///
/// Produced by an untrusted reasoning service, so it must pass
/// [`validate_plan`](crate::validation::validate_plan) before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionPlan(BTreeMap<String, Vec<String>>);

impl ExtractionPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the field list for `model`.
    pub fn insert<I, S>(&mut self, model: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(model.into(), fields.into_iter().map(Into::into).collect());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_model<I, S>(mut self, model: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(model, fields);
        self
    }

    /// Requested fields of `model`.
    pub fn fields(&self, model: &str) -> Option<&[String]> {
        self.0.get(model).map(Vec::as_slice)
    }

    /// Planned model names.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over (model, fields).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(model, fields)| (model.as_str(), fields.as_slice()))
    }

    /// Number of planned models.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the plan names no model.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Vec<String>>> for ExtractionPlan {
    fn from(entries: BTreeMap<String, Vec<String>>) -> Self {
        Self(entries)
    }
}

/// Arguments of one `search_read` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Odoo domain; empty selects every record
    pub domain: Vec<Value>,
    /// Fields to return
    pub fields: Vec<String>,
    /// Page size
    pub limit: u32,
    /// Records to skip
    pub offset: u64,
}

impl SearchRequest {
    /// Request for one page of every record.
    pub fn page(fields: &[String], limit: u32, offset: u64) -> Self {
        Self {
            domain: Vec::new(),
            fields: fields.to_vec(),
            limit,
            offset,
        }
    }
}

/// Flat table of one model's records.
///
/// Cells are JSON scalars only (null, boolean, number, string); the
/// normalizer guarantees no nested value survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    /// Creates an empty table with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row; missing trailing cells are filled with null and extra
    /// cells are dropped.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Appends all rows of `other`, matching columns by name.
    pub fn append(&mut self, other: Self) {
        if other.columns == self.columns {
            self.rows.extend(other.rows);
            return;
        }

        let positions: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|column| other.column_index(column))
            .collect();

        for mut row in other.rows {
            let projected = positions
                .iter()
                .map(|position| {
                    position
                        .and_then(|i| row.get_mut(i).map(std::mem::take))
                        .unwrap_or(Value::Null)
                })
                .collect();
            self.rows.push(projected);
        }
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in arrival order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `column`.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| row.get(index).unwrap_or(&NULL))
    }

    /// Whether every cell is a scalar.
    pub fn is_flat(&self) -> bool {
        self.rows
            .iter()
            .flatten()
            .all(|cell| !cell.is_array() && !cell.is_object())
    }

    /// Converts rows back to records, one entry per column.
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Source text of a generated transformation.
///
/// The text is a sequence of SQL `CREATE VIEW` statements that must define a
/// relation named [`ENTRY_POINT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformationProcedure(String);

impl TransformationProcedure {
    /// Wraps procedure source text.
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// The source text.
    pub fn source(&self) -> &str {
        &self.0
    }
}

/// Everything produced by plan synthesis, ready for human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedPlan {
    /// Unique identifier for this plan
    pub plan_id: uuid::Uuid,
    /// When synthesis finished
    pub created_at: DateTime<Utc>,
    /// The user's goal, verbatim
    pub goal: String,
    /// Models chosen in stage 1
    pub relevant_models: Vec<String>,
    /// Fields to extract per model
    pub extraction_plan: ExtractionPlan,
    /// Generated transformation
    pub procedure: TransformationProcedure,
    /// Field schema the plan was validated against
    pub field_schema: FieldSchema,
    /// Literal stage-2 response text
    pub raw_response: String,
}

/// Progress notification emitted after each extracted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionProgress {
    /// Model being extracted
    pub model: String,
    /// One-based page number
    pub page: u32,
    /// Rows accumulated so far for this model
    pub rows_so_far: usize,
    /// Set on the notification sent after the final (empty) page
    pub finished: bool,
}

/// Callback receiving extraction progress.
pub type ProgressCallback = Arc<dyn Fn(&ExtractionProgress) + Send + Sync>;

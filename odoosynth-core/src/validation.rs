//! Validation of reasoning service responses and extraction plans.
//!
//! Both reasoning stages must answer with a JSON object of a fixed shape. The
//! shapes are embedded JSON Schemas, compiled once and checked before any
//! response is deserialized. A plan that passes the shape check is still
//! untrusted: [`validate_plan`] checks it against the fields actually
//! discovered on the remote before anything is extracted.
//!
//! # Example
//! ```rust
//! use odoosynth_core::validation::parse_model_selection;
//!
//! let selection = parse_model_selection(r#"{"relevant_models": ["sale.order"]}"#)?;
//! assert_eq!(selection.relevant_models, vec!["sale.order"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::OdooSynthError;
use crate::models::{ExtractionPlan, FieldSchema, TransformationProcedure};
use jsonschema::Validator;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use thiserror::Error;

/// Shape validation errors with field-level detail.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedded schema failed to compile
    #[error("JSON Schema compilation failed: {message}")]
    SchemaCompilation { message: String },

    /// The document does not match the schema
    #[error("Schema validation failed with {error_count} errors: {errors:?}")]
    ValidationFailed {
        error_count: usize,
        errors: Vec<String>,
    },

    /// The text is not JSON
    #[error("JSON parsing failed: {source}")]
    JsonParsing {
        #[from]
        source: serde_json::Error,
    },
}

/// Stage 1 response: `{"relevant_models": [...]}`
const MODEL_SELECTION_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "Model selection response",
  "type": "object",
  "required": ["relevant_models"],
  "properties": {
    "relevant_models": {
      "type": "array",
      "items": { "type": "string", "minLength": 1 }
    }
  }
}"#;

/// Stage 2 response: field lists plus the transformation source.
const PROCEDURE_SYNTHESIS_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "Field and procedure synthesis response",
  "type": "object",
  "required": ["models_and_fields"],
  "properties": {
    "models_and_fields": {
      "type": "object",
      "minProperties": 1,
      "additionalProperties": {
        "type": "array",
        "items": { "type": "string", "minLength": 1 }
      }
    },
    "transform_sql": { "type": "string", "minLength": 1 },
    "python_code": { "type": "string", "minLength": 1 }
  },
  "anyOf": [
    { "required": ["transform_sql"] },
    { "required": ["python_code"] }
  ]
}"#;

static MODEL_SELECTION_VALIDATOR: OnceLock<Validator> = OnceLock::new();
static PROCEDURE_SYNTHESIS_VALIDATOR: OnceLock<Validator> = OnceLock::new();

/// Parsed stage 1 response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSelection {
    /// Models the service considers relevant to the goal
    pub relevant_models: Vec<String>,
}

/// Parsed stage 2 response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureSynthesis {
    /// Fields to extract per model
    pub plan: ExtractionPlan,
    /// Transformation source
    pub procedure: TransformationProcedure,
}

#[derive(Deserialize)]
struct RawProcedureSynthesis {
    models_and_fields: BTreeMap<String, Vec<String>>,
    transform_sql: Option<String>,
    python_code: Option<String>,
}

fn compiled(
    cell: &'static OnceLock<Validator>,
    source: &str,
) -> Result<&'static Validator, ValidationError> {
    if let Some(validator) = cell.get() {
        return Ok(validator);
    }

    let schema_json: Value =
        serde_json::from_str(source).map_err(|e| ValidationError::SchemaCompilation {
            message: format!("Failed to parse embedded schema: {}", e),
        })?;

    let validator =
        jsonschema::validator_for(&schema_json).map_err(|e| ValidationError::SchemaCompilation {
            message: format!("Schema compilation error: {}", e),
        })?;

    // Another thread may have won the race; either instance is equivalent
    let _ = cell.set(validator);

    cell.get().ok_or_else(|| ValidationError::SchemaCompilation {
        message: "validator cache unavailable".to_string(),
    })
}

/// Compiles both embedded schemas so the first request does not pay for it.
///
/// # Errors
/// Returns `ValidationError::SchemaCompilation` if an embedded schema is invalid.
pub fn initialize_response_validators() -> Result<(), ValidationError> {
    compiled(&MODEL_SELECTION_VALIDATOR, MODEL_SELECTION_SCHEMA)?;
    compiled(&PROCEDURE_SYNTHESIS_VALIDATOR, PROCEDURE_SYNTHESIS_SCHEMA)?;
    Ok(())
}

/// Removes a Markdown code fence some services wrap around JSON.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn check_shape(
    cell: &'static OnceLock<Validator>,
    schema: &str,
    raw: &str,
) -> Result<Value, ValidationError> {
    let validator = compiled(cell, schema)?;
    let value: Value = serde_json::from_str(strip_code_fence(raw))?;

    if let Err(validation_error) = validator.validate(&value) {
        return Err(ValidationError::ValidationFailed {
            error_count: 1,
            errors: vec![validation_error.to_string()],
        });
    }

    Ok(value)
}

/// Parses and shape-checks a stage 1 response.
///
/// # Errors
/// Returns `PlanResponseMalformed` carrying `raw` if the text is not JSON or
/// does not match the schema
pub fn parse_model_selection(raw: &str) -> crate::Result<ModelSelection> {
    let value = check_shape(&MODEL_SELECTION_VALIDATOR, MODEL_SELECTION_SCHEMA, raw)
        .map_err(|e| OdooSynthError::malformed_response(e.to_string(), raw))?;

    serde_json::from_value(value)
        .map_err(|e| OdooSynthError::malformed_response(e.to_string(), raw))
}

/// Parses and shape-checks a stage 2 response.
///
/// The transformation is read from `transform_sql`; `python_code` is accepted
/// as an alias when `transform_sql` is absent.
///
/// # Errors
/// Returns `PlanResponseMalformed` carrying `raw` if the text is not JSON or
/// does not match the schema
pub fn parse_procedure_synthesis(raw: &str) -> crate::Result<ProcedureSynthesis> {
    let value = check_shape(&PROCEDURE_SYNTHESIS_VALIDATOR, PROCEDURE_SYNTHESIS_SCHEMA, raw)
        .map_err(|e| OdooSynthError::malformed_response(e.to_string(), raw))?;

    let parsed: RawProcedureSynthesis = serde_json::from_value(value)
        .map_err(|e| OdooSynthError::malformed_response(e.to_string(), raw))?;

    let source = parsed
        .transform_sql
        .or(parsed.python_code)
        .ok_or_else(|| OdooSynthError::malformed_response("no transformation source", raw))?;

    Ok(ProcedureSynthesis {
        plan: ExtractionPlan::from(parsed.models_and_fields),
        procedure: TransformationProcedure::new(source),
    })
}

/// Checks every (model, field) of `plan` against `schema`.
///
/// # Errors
/// Returns `PlanRejected` for an empty plan, an undiscovered model, an empty
/// or duplicated field list, or a field the model does not have
pub fn validate_plan(plan: &ExtractionPlan, schema: &FieldSchema) -> crate::Result<()> {
    if plan.is_empty() {
        return Err(OdooSynthError::plan_rejected("(plan)", "plan names no model"));
    }

    for (model, fields) in plan.iter() {
        let known = schema.fields_of(model).ok_or_else(|| {
            OdooSynthError::plan_rejected(model, "model is not part of the discovered schema")
        })?;

        if fields.is_empty() {
            return Err(OdooSynthError::plan_rejected(model, "field list is empty"));
        }

        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.as_str()) {
                return Err(OdooSynthError::plan_rejected(
                    model,
                    format!("field '{}' is requested twice", field),
                ));
            }
            if !known.contains(field) {
                return Err(OdooSynthError::plan_rejected(
                    model,
                    format!("unknown field '{}'", field),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;

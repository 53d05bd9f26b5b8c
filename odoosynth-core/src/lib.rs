//! Core pipeline for AI-guided Odoo extraction and transformation.
//!
//! Turns a natural-language reporting goal into a table: a reasoning service
//! picks the relevant Odoo models and fields and writes a SQL transformation,
//! the plan is checked against the live schema, records are extracted page by
//! page, and the transformation runs in an embedded SQL sandbox.
//!
//! # Security Guarantees
//! - The remote is only ever read (`search_read`, `fields_get`)
//! - Credentials live in zeroizing containers and never reach logs or errors
//! - Generated SQL can only define views over the extracted tables
//! - Optional AES-GCM sealing of stored credentials (feature `encryption`)
//!
//! # Architecture
//! - `remote` and `reasoning` are traits at the I/O seams, so every stage can
//!   run against test doubles
//! - `synth`, `extract` and `sandbox` are the three stages
//! - `pipeline` wires them into one session with stage-tagged errors

pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod reasoning;
pub mod remote;
pub mod sandbox;
pub mod security;
pub mod synth;
pub mod validation;

// Re-export commonly used types
pub use config::{ExtractionConfig, PipelineConfig, ReasoningConfig, RemoteConfig, SandboxConfig};
pub use error::{OdooSynthError, PipelineStage, Remediation, Result};
pub use extract::Extractor;
pub use models::{
    ENTRY_POINT, ExtractionPlan, ExtractionProgress, FieldSchema, ModelCatalog, ProgressCallback,
    RawTable, Record, SearchRequest, SynthesizedPlan, TransformationProcedure,
};
pub use pipeline::Pipeline;
pub use reasoning::{ChatMessage, ChatRequest, ChatRole, OpenAiClient, ReasoningService};
pub use remote::{OdooClient, RemoteSource};
pub use sandbox::{ResultTable, TransformationSandbox};
pub use security::{Connection, Credential, parse_connection_url};
pub use synth::PlanSynthesizer;

#[cfg(feature = "encryption")]
pub use security::encryption;

pub use validation::{
    ModelSelection, ProcedureSynthesis, ValidationError, initialize_response_validators,
    parse_model_selection, parse_procedure_synthesis, validate_plan,
};

//! Two-stage plan synthesis.
//!
//! Stage 1 narrows the full model catalog to the models relevant to a goal.
//! Stage 2 fetches the field schema of those models and asks for the field
//! lists to extract together with the SQL transformation. The resulting plan
//! is checked against the fetched schema before it is handed out.
//!
//! Every reasoning response is treated as untrusted input: it is shape-checked
//! by [`crate::validation`] and nothing it names reaches the remote until the
//! plan has been validated.

use crate::error::{OdooSynthError, PipelineStage};
use crate::models::{FieldSchema, ModelCatalog, SynthesizedPlan};
use crate::reasoning::ReasoningService;
use crate::remote::RemoteSource;
use crate::validation::{self, ProcedureSynthesis};
use crate::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod prompts;

/// Builds [`SynthesizedPlan`]s from a goal.
pub struct PlanSynthesizer {
    remote: Arc<dyn RemoteSource>,
    reasoning: Arc<dyn ReasoningService>,
}

impl PlanSynthesizer {
    /// Creates a synthesizer over a remote session and a reasoning service.
    pub fn new(remote: Arc<dyn RemoteSource>, reasoning: Arc<dyn ReasoningService>) -> Self {
        Self { remote, reasoning }
    }

    /// Stage 1: asks which catalog models matter for `goal`.
    ///
    /// The answer is returned as given, minus duplicates. Names missing from
    /// the catalog are filtered out later by [`targeted_schema`](Self::targeted_schema).
    ///
    /// # Errors
    /// `PlanGenerationFailed` if the call fails, `PlanResponseMalformed` if the
    /// answer has the wrong shape
    pub async fn select_models(
        &self,
        goal: &str,
        document_text: Option<&str>,
        catalog: &ModelCatalog,
    ) -> Result<Vec<String>> {
        let request = prompts::model_selection_request(goal, document_text, catalog);
        debug!(
            "Stage 1 prompt for {} catalog models sent to {}",
            catalog.len(),
            self.reasoning.describe()
        );

        let raw = self.reasoning.complete_json(&request).await?;
        let selection = validation::parse_model_selection(&raw)?;

        let mut seen = HashSet::new();
        let models: Vec<String> = selection
            .relevant_models
            .into_iter()
            .filter(|model| seen.insert(model.clone()))
            .collect();

        info!("Reasoning service selected {} model(s)", models.len());
        Ok(models)
    }

    /// Fetches the fields of every selected model present in the catalog.
    ///
    /// A model whose fields cannot be fetched is skipped with a warning.
    ///
    /// # Errors
    /// `PlanRejected` if no model survives
    pub async fn targeted_schema(
        &self,
        relevant_models: &[String],
        catalog: &ModelCatalog,
    ) -> Result<FieldSchema> {
        let mut schema = FieldSchema::new();

        for model in relevant_models {
            if !catalog.contains(model) {
                warn!(model = %model, "Selected model is not in the catalog; skipping");
                continue;
            }

            match self.remote.fields_of(model).await {
                Ok(fields) => {
                    debug!(model = %model, fields = fields.len(), "Fetched field schema");
                    schema.insert(model.as_str(), fields);
                }
                Err(e) => {
                    warn!(model = %model, "Field discovery failed; skipping model: {}", e);
                }
            }
        }

        if schema.is_empty() {
            return Err(OdooSynthError::plan_rejected(
                "(plan)",
                "none of the selected models could be described by the remote",
            ));
        }

        Ok(schema)
    }

    /// Stage 2: asks for field lists and the transformation.
    ///
    /// Returns the parsed synthesis and the literal response text.
    ///
    /// # Errors
    /// `PlanGenerationFailed` if the call fails, `PlanResponseMalformed` if the
    /// answer has the wrong shape
    pub async fn synthesize_procedure(
        &self,
        goal: &str,
        document_text: Option<&str>,
        schema: &FieldSchema,
    ) -> Result<(ProcedureSynthesis, String)> {
        let request = prompts::procedure_synthesis_request(goal, document_text, schema)?;
        debug!(
            "Stage 2 prompt for {} model(s) sent to {}",
            schema.len(),
            self.reasoning.describe()
        );

        let raw = self.reasoning.complete_json(&request).await?;
        let synthesis = validation::parse_procedure_synthesis(&raw)?;
        Ok((synthesis, raw))
    }

    /// Runs both stages and validates the plan.
    ///
    /// Failures are tagged with the stage that raised them.
    pub async fn synthesize(
        &self,
        goal: &str,
        document_text: Option<&str>,
        catalog: &ModelCatalog,
    ) -> Result<SynthesizedPlan> {
        if goal.trim().is_empty() {
            return Err(OdooSynthError::configuration("goal cannot be empty"));
        }

        let relevant_models = self
            .select_models(goal, document_text, catalog)
            .await
            .map_err(|e| e.in_stage(PipelineStage::ModelSelection))?;

        let field_schema = self
            .targeted_schema(&relevant_models, catalog)
            .await
            .map_err(|e| e.in_stage(PipelineStage::FieldSynthesis))?;

        let (synthesis, raw_response) = self
            .synthesize_procedure(goal, document_text, &field_schema)
            .await
            .map_err(|e| e.in_stage(PipelineStage::FieldSynthesis))?;

        validation::validate_plan(&synthesis.plan, &field_schema).map_err(|e| {
            e.in_stage(PipelineStage::PlanValidation)
                .with_artifact(raw_response.as_str())
        })?;

        info!(
            "Synthesized plan over {} model(s)",
            synthesis.plan.len()
        );

        Ok(SynthesizedPlan {
            plan_id: uuid::Uuid::new_v4(),
            created_at: Utc::now(),
            goal: goal.to_string(),
            relevant_models,
            extraction_plan: synthesis.plan,
            procedure: synthesis.procedure,
            field_schema,
            raw_response,
        })
    }
}

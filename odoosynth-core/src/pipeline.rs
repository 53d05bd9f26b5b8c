//! Pipeline orchestration.
//!
//! [`Pipeline`] is the session context for one user: it owns the remote
//! session, the reasoning service, the configuration and the model catalog
//! cache. Two entry points cover the review workflow:
//!
//! - [`Pipeline::synthesize_plan`] produces a [`SynthesizedPlan`] for review
//! - [`Pipeline::execute_plan`] re-validates a plan against the live remote
//!   schema, extracts and transforms
//!
//! [`Pipeline::run`] chains both. Every failure is tagged with the stage that
//! raised it and stops the remaining stages; nothing is retried.

use crate::config::PipelineConfig;
use crate::error::{OdooSynthError, PipelineStage};
use crate::extract::Extractor;
use crate::models::{ExtractionPlan, FieldSchema, ModelCatalog, ProgressCallback, SynthesizedPlan};
use crate::reasoning::ReasoningService;
use crate::remote::RemoteSource;
use crate::sandbox::{ResultTable, TransformationSandbox};
use crate::synth::PlanSynthesizer;
use crate::validation;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// One user's pipeline session.
pub struct Pipeline {
    remote: Arc<dyn RemoteSource>,
    reasoning: Arc<dyn ReasoningService>,
    config: PipelineConfig,
    catalog: RwLock<Option<Arc<ModelCatalog>>>,
}

impl Pipeline {
    /// Creates a session.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        reasoning: Arc<dyn ReasoningService>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            remote,
            reasoning,
            config,
            catalog: RwLock::new(None),
        })
    }

    /// Session configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the model catalog, fetching it on first use.
    ///
    /// # Errors
    /// Propagates the remote failure; nothing is cached on error
    pub async fn model_catalog(&self) -> Result<Arc<ModelCatalog>> {
        if let Some(catalog) = self.catalog.read().await.as_ref() {
            return Ok(catalog.clone());
        }

        let mut slot = self.catalog.write().await;
        if let Some(catalog) = slot.as_ref() {
            return Ok(catalog.clone());
        }

        let catalog = Arc::new(self.remote.list_models().await?);
        info!(
            "Loaded {} models from {}",
            catalog.len(),
            self.remote.describe()
        );
        *slot = Some(catalog.clone());
        Ok(catalog)
    }

    /// Drops the cached catalog so the next call fetches it again.
    pub async fn invalidate_catalog(&self) {
        *self.catalog.write().await = None;
    }

    /// Runs both synthesis stages and validates the plan.
    ///
    /// # Errors
    /// A `Pipeline` error tagged `ModelSelection`, `FieldSynthesis` or
    /// `PlanValidation` wrapping the originating failure
    pub async fn synthesize_plan(
        &self,
        goal: &str,
        document_text: Option<&str>,
    ) -> Result<SynthesizedPlan> {
        let start_time = Instant::now();
        info!("Synthesizing plan");

        let catalog = self
            .model_catalog()
            .await
            .map_err(|e| log_failure(e.in_stage(PipelineStage::ModelSelection)))?;

        let synthesizer = PlanSynthesizer::new(self.remote.clone(), self.reasoning.clone());
        let plan = synthesizer
            .synthesize(goal, document_text, &catalog)
            .await
            .map_err(log_failure)?;

        info!(
            "Plan {} synthesized in {:.2}s",
            plan.plan_id,
            start_time.elapsed().as_secs_f64()
        );
        Ok(plan)
    }

    /// Validates, extracts and transforms a reviewed plan.
    ///
    /// The plan file is editable, so the `field_schema` it carries is not
    /// trusted: the planned models are described again by the remote and the
    /// plan is checked against that before any record is searched.
    ///
    /// # Errors
    /// A `Pipeline` error tagged `PlanValidation`, `Extraction` or
    /// `Transformation` wrapping the originating failure. Validation and
    /// transformation failures carry the synthesized text as an artifact.
    pub async fn execute_plan(
        &self,
        plan: &SynthesizedPlan,
        progress: Option<ProgressCallback>,
    ) -> Result<ResultTable> {
        let start_time = Instant::now();

        let live_schema = self
            .live_schema(&plan.extraction_plan)
            .await
            .map_err(|e| log_failure(e.in_stage(PipelineStage::PlanValidation)))?;

        validation::validate_plan(&plan.extraction_plan, &live_schema).map_err(|e| {
            log_failure(
                e.in_stage(PipelineStage::PlanValidation)
                    .with_artifact(plan.raw_response.as_str()),
            )
        })?;

        let extractor = Extractor::new(self.remote.clone(), self.config.extraction.clone());
        let tables = extractor
            .extract(&plan.extraction_plan, progress)
            .await
            .map_err(|e| log_failure(e.in_stage(PipelineStage::Extraction)))?;

        let sandbox = TransformationSandbox::new(self.config.sandbox.clone());
        let result = sandbox
            .run(&plan.procedure, &tables)
            .await
            .map_err(|e| {
                log_failure(
                    e.in_stage(PipelineStage::Transformation)
                        .with_artifact(plan.procedure.source()),
                )
            })?;

        info!(
            "Plan {} executed in {:.2}s - {} row(s)",
            plan.plan_id,
            start_time.elapsed().as_secs_f64(),
            result.num_rows()
        );
        Ok(result)
    }

    /// Field lists of the planned models as the remote reports them now.
    ///
    /// A model the remote refuses to describe is left out so the plan naming
    /// it is rejected. Transport and credential failures propagate.
    async fn live_schema(&self, plan: &ExtractionPlan) -> Result<FieldSchema> {
        let mut schema = FieldSchema::new();
        for model in plan.models() {
            match self.remote.fields_of(model).await {
                Ok(fields) => schema.insert(model, fields),
                Err(
                    e @ (OdooSynthError::RemoteUnreachable { .. }
                    | OdooSynthError::RemoteAuthFailed { .. }),
                ) => return Err(e),
                Err(e) => warn!(model = %model, "Planned model cannot be described: {}", e),
            }
        }
        Ok(schema)
    }

    /// Synthesizes and immediately executes a plan.
    ///
    /// # Errors
    /// The first stage failure, tagged with its stage
    pub async fn run(
        &self,
        goal: &str,
        document_text: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<ResultTable> {
        let plan = self.synthesize_plan(goal, document_text).await?;
        self.execute_plan(&plan, progress).await
    }
}

fn log_failure(error: OdooSynthError) -> OdooSynthError {
    match error.stage() {
        Some(stage) => error!(stage = %stage, "Pipeline stage failed: {}", error.originating()),
        None => error!("Pipeline failed: {}", error),
    }
    error
}

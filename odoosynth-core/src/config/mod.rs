//! Configuration types for the pipeline.
//!
//! - `RemoteConfig`: timeouts for the Odoo JSON-RPC client
//! - `ExtractionConfig`: page size, caps and throttling for extraction
//! - `ReasoningConfig`: reasoning service model and endpoint
//! - `SandboxConfig`: resource limits for generated transformations
//! - `PipelineConfig`: all of the above, validated together
//!
//! # Security
//! None of these structs store the Odoo API key or the reasoning service key.
//! Secrets are handled by the security module and passed in separately.

mod extraction;
mod reasoning;
mod remote;
mod sandbox;

pub use extraction::ExtractionConfig;
pub use reasoning::ReasoningConfig;
pub use remote::RemoteConfig;
pub use sandbox::SandboxConfig;

use serde::{Deserialize, Serialize};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Remote datastore client settings
    pub remote: RemoteConfig,
    /// Extraction paging and caps
    pub extraction: ExtractionConfig,
    /// Reasoning service settings
    pub reasoning: ReasoningConfig,
    /// Transformation sandbox limits
    pub sandbox: SandboxConfig,
}

impl PipelineConfig {
    /// Validates every section.
    ///
    /// # Errors
    /// Returns the first invalid setting found
    pub fn validate(&self) -> crate::Result<()> {
        self.remote.validate()?;
        self.extraction.validate()?;
        self.reasoning.validate()?;
        self.sandbox.validate()?;
        Ok(())
    }

    /// Builder method to replace the extraction settings.
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// Builder method to replace the reasoning settings.
    pub fn with_reasoning(mut self, reasoning: ReasoningConfig) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Builder method to replace the sandbox settings.
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Builder method to replace the remote client settings.
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = remote;
        self
    }
}

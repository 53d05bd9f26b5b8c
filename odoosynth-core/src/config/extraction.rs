//! Paginated extraction configuration.
//!
//! Controls page size, the hard caps that stop a runaway model, inter-page
//! throttling and how many models are extracted at once.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest page size accepted by `validate`.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Largest number of models extracted concurrently.
pub const MAX_CONCURRENT_MODELS: usize = 16;

/// Configuration for the paginated extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Records requested per page
    pub page_size: u32,
    /// Maximum pages fetched for one model, including the final empty page
    pub max_pages_per_model: u32,
    /// Maximum wall-clock time spent on one model
    pub max_elapsed_per_model: Duration,
    /// Timeout for a single page fetch
    pub page_timeout: Duration,
    /// Optional delay between page fetches (milliseconds)
    pub throttle_ms: Option<u64>,
    /// Number of models extracted at the same time
    pub max_concurrent_models: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            page_size: 2_000,
            max_pages_per_model: 10_000,
            max_elapsed_per_model: Duration::from_secs(30 * 60),
            page_timeout: Duration::from_secs(120),
            throttle_ms: None,
            max_concurrent_models: 1,
        }
    }
}

impl ExtractionConfig {
    /// Creates a new extraction config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates paging and cap values.
    ///
    /// # Errors
    /// Returns error if a value is zero or above its upper bound
    pub fn validate(&self) -> crate::Result<()> {
        if self.page_size == 0 {
            return Err(crate::error::OdooSynthError::configuration(
                "page_size must be greater than 0",
            ));
        }

        if self.page_size > MAX_PAGE_SIZE {
            return Err(crate::error::OdooSynthError::configuration(format!(
                "page_size should not exceed {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.max_pages_per_model == 0 {
            return Err(crate::error::OdooSynthError::configuration(
                "max_pages_per_model must be greater than 0",
            ));
        }

        if self.max_elapsed_per_model.is_zero() {
            return Err(crate::error::OdooSynthError::configuration(
                "max_elapsed_per_model must be greater than 0",
            ));
        }

        if self.page_timeout.is_zero() {
            return Err(crate::error::OdooSynthError::configuration(
                "page_timeout must be greater than 0",
            ));
        }

        if self.max_concurrent_models == 0 || self.max_concurrent_models > MAX_CONCURRENT_MODELS {
            return Err(crate::error::OdooSynthError::configuration(format!(
                "max_concurrent_models must be between 1 and {}",
                MAX_CONCURRENT_MODELS
            )));
        }

        Ok(())
    }

    /// Builder method to set the page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Builder method to set the page cap.
    pub fn with_max_pages_per_model(mut self, pages: u32) -> Self {
        self.max_pages_per_model = pages;
        self
    }

    /// Builder method to set the elapsed time cap.
    pub fn with_max_elapsed_per_model(mut self, elapsed: Duration) -> Self {
        self.max_elapsed_per_model = elapsed;
        self
    }

    /// Builder method to set the per-page timeout.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Builder method to set throttle delay.
    pub fn with_throttle_ms(mut self, ms: u64) -> Self {
        self.throttle_ms = Some(ms);
        self
    }

    /// Builder method to set model concurrency.
    pub fn with_max_concurrent_models(mut self, models: usize) -> Self {
        self.max_concurrent_models = models;
        self
    }
}

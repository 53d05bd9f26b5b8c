//! Transformation sandbox limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest memory pool the sandbox will run with (16 MiB).
const MIN_MEMORY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Resource limits for running a generated transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Wall-clock budget for statement execution plus result collection
    pub execution_timeout: Duration,
    /// Memory pool size for the embedded engine
    pub memory_limit_bytes: usize,
    /// Also register each table under its underscore alias (`sale_order`)
    pub register_aliases: bool,
    /// Engine partitions used when executing the transformation
    pub target_partitions: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(60),
            memory_limit_bytes: 1024 * 1024 * 1024,
            register_aliases: true,
            target_partitions: 4,
        }
    }
}

impl SandboxConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates limits.
    ///
    /// # Errors
    /// Returns error if the timeout or partition count is zero or the memory
    /// pool is below 16 MiB
    pub fn validate(&self) -> crate::Result<()> {
        if self.execution_timeout.is_zero() {
            return Err(crate::error::OdooSynthError::configuration(
                "execution_timeout must be greater than 0",
            ));
        }

        if self.memory_limit_bytes < MIN_MEMORY_LIMIT_BYTES {
            return Err(crate::error::OdooSynthError::configuration(format!(
                "memory_limit_bytes must be at least {}",
                MIN_MEMORY_LIMIT_BYTES
            )));
        }

        if self.target_partitions == 0 {
            return Err(crate::error::OdooSynthError::configuration(
                "target_partitions must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Builder method to set the execution budget.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Builder method to set the memory pool size.
    pub fn with_memory_limit_bytes(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    /// Builder method to toggle underscore aliases.
    pub fn with_aliases(mut self, enabled: bool) -> Self {
        self.register_aliases = enabled;
        self
    }

    /// Builder method to set engine partitions.
    pub fn with_target_partitions(mut self, partitions: usize) -> Self {
        self.target_partitions = partitions;
        self
    }
}

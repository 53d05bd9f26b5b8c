//! File input and output for plans, results and sealed connections.

use odoosynth_core::{OdooSynthError, Result, ResultTable, SynthesizedPlan};
use std::path::Path;

async fn write_file(path: &Path, contents: String) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| OdooSynthError::Io {
            context: format!("Failed to write to {}", path.display()),
            source: e,
        })
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| OdooSynthError::Io {
            context: format!("Failed to read {}", path.display()),
            source: e,
        })
}

/// Writes a plan as pretty JSON for review.
pub async fn save_plan(plan: &SynthesizedPlan, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(plan)
        .map_err(|e| OdooSynthError::serialization("plan serialization", e))?;
    write_file(path, json).await
}

/// Loads a reviewed plan.
pub async fn load_plan(path: &Path) -> Result<SynthesizedPlan> {
    let json = read_file(path).await?;
    serde_json::from_str(&json).map_err(|e| {
        OdooSynthError::serialization(format!("plan in {} is not valid", path.display()), e)
    })
}

/// Writes result rows as a pretty JSON array of objects.
pub async fn save_rows(result: &ResultTable, path: &Path) -> Result<()> {
    let rows = result.to_json_rows()?;
    let json = serde_json::to_string_pretty(&rows)
        .map_err(|e| OdooSynthError::serialization("result serialization", e))?;
    write_file(path, json).await
}

/// Writes a sealed connection.
#[cfg(feature = "encryption")]
pub async fn save_sealed_connection(
    sealed: &odoosynth_core::encryption::SealedConnection,
    path: &Path,
) -> Result<()> {
    let json = serde_json::to_string_pretty(sealed)
        .map_err(|e| OdooSynthError::serialization("sealed connection serialization", e))?;
    write_file(path, json).await
}

/// Reads a sealed connection. Synchronous because it runs while arguments
/// are resolved, before any session exists.
#[cfg(feature = "encryption")]
pub fn read_sealed_connection(path: &Path) -> Result<odoosynth_core::encryption::SealedConnection> {
    let json = std::fs::read_to_string(path).map_err(|e| OdooSynthError::Io {
        context: format!("Failed to read {}", path.display()),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| {
        OdooSynthError::serialization(
            format!("sealed connection in {} is not valid", path.display()),
            e,
        )
    })
}

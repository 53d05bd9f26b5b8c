//! Remote datastore access.
//!
//! [`RemoteSource`] is the seam between the pipeline and the ERP: model
//! catalog, per-model field discovery and paged record search. It knows
//! nothing about reasoning services or table shaping.
//!
//! # Module Structure
//! - `odoo`: JSON-RPC client for Odoo's `/jsonrpc` dispatcher

use crate::Result;
use crate::models::{ModelCatalog, Record, SearchRequest};
use async_trait::async_trait;
use std::collections::BTreeSet;

pub mod odoo;

pub use odoo::OdooClient;

/// Introspection and search over a remote business-object datastore.
///
/// # Errors
/// Every method fails with `RemoteUnreachable` on transport problems,
/// `RemoteAuthFailed` when the credential is rejected or the session expired,
/// and `RemoteProtocolError` for application-level rejections. Implementations
/// never retry.
///
/// # Object Safety
/// This trait is object-safe, so the pipeline can hold an
/// `Arc<dyn RemoteSource>`.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Lists every model name visible to the principal.
    async fn list_models(&self) -> Result<ModelCatalog>;

    /// Lists the queryable field names of `model`.
    async fn fields_of(&self, model: &str) -> Result<BTreeSet<String>>;

    /// Returns one page of records of `model`.
    async fn search(&self, model: &str, request: &SearchRequest) -> Result<Vec<Record>>;

    /// Credential-free description used in logs.
    fn describe(&self) -> String {
        "remote datastore".to_string()
    }
}

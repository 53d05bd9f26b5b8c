//! Odoo JSON-RPC client.
//!
//! Talks to the `common` and `object` services through the `/jsonrpc`
//! dispatcher:
//!
//! - `common.authenticate(db, login, key, {})` once per session
//! - `object.execute_kw(db, uid, key, model, method, args, kwargs)` for
//!   `search_read` and `fields_get`
//!
//! # Security
//! - Only read methods are ever issued
//! - The API key travels in the request body, never in URLs or logs
//! - Transport errors are stripped of their URL before being wrapped

use super::RemoteSource;
use crate::config::RemoteConfig;
use crate::error::{MALFORMED_ENVELOPE_CODE, OdooSynthError, redact_endpoint};
use crate::models::{ModelCatalog, Record, SearchRequest};
use crate::security::Connection;
use crate::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Exception names Odoo uses for credential and session failures.
const AUTH_EXCEPTION_MARKERS: &[&str] = &["AccessDenied", "SessionExpired"];

/// Authenticated session against one Odoo database.
#[derive(Debug)]
pub struct OdooClient {
    http: reqwest::Client,
    connection: Connection,
    uid: i64,
    request_id: AtomicU64,
}

impl OdooClient {
    /// Probes the endpoint, authenticates and returns a ready session.
    ///
    /// # Errors
    /// Returns `RemoteUnreachable` if the endpoint does not answer within the
    /// reachability timeout, `RemoteAuthFailed` if the credential is rejected
    pub async fn connect(connection: Connection, config: &RemoteConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                OdooSynthError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        probe_reachability(&http, &connection, config).await?;

        let mut client = Self {
            http,
            connection,
            uid: 0,
            request_id: AtomicU64::new(1),
        };
        client.uid = client.authenticate().await?;

        info!(
            "Authenticated against {} (uid {})",
            client.connection.to_safe_string(),
            client.uid
        );

        Ok(client)
    }

    /// User id returned by `authenticate`.
    pub fn uid(&self) -> i64 {
        self.uid
    }

    async fn authenticate(&self) -> Result<i64> {
        let result = self
            .call(
                "common",
                "authenticate",
                json!([
                    self.connection.database(),
                    self.connection.login(),
                    self.connection.credential().expose(),
                    {}
                ]),
            )
            .await?;

        match result.as_i64() {
            Some(uid) if uid > 0 => Ok(uid),
            _ => Err(OdooSynthError::remote_auth_failed(format!(
                "credential rejected for database '{}'",
                self.connection.database()
            ))),
        }
    }

    async fn execute_kw(&self, model: &str, method: &str, args: Value, kwargs: Value) -> Result<Value> {
        self.call(
            "object",
            "execute_kw",
            json!([
                self.connection.database(),
                self.uid,
                self.connection.credential().expose(),
                model,
                method,
                args,
                kwargs
            ]),
        )
        .await
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": id,
        });

        debug!(
            "JSON-RPC {}.{} (id {}) on {}",
            service,
            method,
            id,
            redact_endpoint(self.connection.endpoint().as_str())
        );

        let response = self
            .http
            .post(self.connection.jsonrpc_url())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| transport_error(service, method, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(OdooSynthError::remote_auth_failed(format!(
                "HTTP {} from {}.{}",
                status.as_u16(),
                service,
                method
            )));
        }
        if !status.is_success() {
            return Err(OdooSynthError::remote_protocol(
                i64::from(status.as_u16()),
                format!("HTTP {} from {}.{}", status, service, method),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(service, method, e))?;

        let body: Value = serde_json::from_str(&body).map_err(|e| {
            OdooSynthError::remote_protocol(
                MALFORMED_ENVELOPE_CODE,
                format!("Response is not JSON: {}", e),
            )
        })?;

        decode_envelope(body)
    }
}

#[async_trait]
impl RemoteSource for OdooClient {
    async fn list_models(&self) -> Result<ModelCatalog> {
        let result = self
            .execute_kw("ir.model", "search_read", json!([[]]), json!({"fields": ["model"]}))
            .await?;

        let rows = result.as_array().ok_or_else(|| {
            OdooSynthError::remote_protocol(
                MALFORMED_ENVELOPE_CODE,
                "ir.model search_read did not return a list",
            )
        })?;

        let catalog = ModelCatalog::new(
            rows.iter()
                .filter_map(|row| row.get("model").and_then(Value::as_str)),
        );
        debug!("Model catalog has {} entries", catalog.len());
        Ok(catalog)
    }

    async fn fields_of(&self, model: &str) -> Result<BTreeSet<String>> {
        let result = self
            .execute_kw(model, "fields_get", json!([]), json!({"attributes": ["type"]}))
            .await?;

        let fields = result.as_object().ok_or_else(|| {
            OdooSynthError::remote_protocol(
                MALFORMED_ENVELOPE_CODE,
                format!("fields_get on '{}' did not return an object", model),
            )
        })?;

        Ok(fields.keys().cloned().collect())
    }

    async fn search(&self, model: &str, request: &SearchRequest) -> Result<Vec<Record>> {
        let result = self
            .execute_kw(
                model,
                "search_read",
                json!([request.domain]),
                json!({
                    "fields": request.fields,
                    "limit": request.limit,
                    "offset": request.offset,
                }),
            )
            .await?;

        match result {
            Value::Array(rows) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(record) => Ok(record),
                    _ => Err(OdooSynthError::remote_protocol(
                        MALFORMED_ENVELOPE_CODE,
                        format!("search_read on '{}' returned a non-record row", model),
                    )),
                })
                .collect(),
            _ => Err(OdooSynthError::remote_protocol(
                MALFORMED_ENVELOPE_CODE,
                format!("search_read on '{}' did not return a list", model),
            )),
        }
    }

    fn describe(&self) -> String {
        self.connection.to_safe_string()
    }
}

/// Issues a bounded GET against the endpoint; any HTTP answer counts.
async fn probe_reachability(
    http: &reqwest::Client,
    connection: &Connection,
    config: &RemoteConfig,
) -> Result<()> {
    http.get(connection.endpoint().as_str())
        .timeout(config.reachability_timeout)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| {
            OdooSynthError::remote_unreachable(
                format!(
                    "{} did not answer within {:?}",
                    redact_endpoint(connection.endpoint().as_str()),
                    config.reachability_timeout
                ),
                e.without_url(),
            )
        })
}

fn transport_error(service: &str, method: &str, error: reqwest::Error) -> OdooSynthError {
    let context = if error.is_timeout() {
        format!("{}.{} timed out", service, method)
    } else {
        format!("{}.{} could not be delivered", service, method)
    };
    OdooSynthError::remote_unreachable(context, error.without_url())
}

/// Extracts `result` from a JSON-RPC response or classifies its `error`.
pub(crate) fn decode_envelope(body: Value) -> Result<Value> {
    let Value::Object(mut envelope) = body else {
        return Err(OdooSynthError::remote_protocol(
            MALFORMED_ENVELOPE_CODE,
            "Response is not a JSON-RPC object",
        ));
    };

    if let Some(error) = envelope.remove("error") {
        return Err(classify_rpc_error(&error));
    }

    envelope.remove("result").ok_or_else(|| {
        OdooSynthError::remote_protocol(
            MALFORMED_ENVELOPE_CODE,
            "Response has neither 'result' nor 'error'",
        )
    })
}

fn classify_rpc_error(error: &Value) -> OdooSynthError {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    let data = error.get("data");
    let name = data
        .and_then(|d| d.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let message = data
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.get("message").and_then(Value::as_str))
        .unwrap_or("unknown remote error");

    if AUTH_EXCEPTION_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
    {
        return OdooSynthError::remote_auth_failed(message.to_string());
    }

    OdooSynthError::remote_protocol(code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope_result() {
        let value = decode_envelope(json!({"jsonrpc": "2.0", "id": 1, "result": [1, 2]})).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn test_decode_envelope_false_result_is_kept() {
        let value = decode_envelope(json!({"jsonrpc": "2.0", "id": 1, "result": false})).unwrap();
        assert_eq!(value, json!(false));
    }

    #[test]
    fn test_decode_envelope_access_denied() {
        let error = decode_envelope(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": {"name": "odoo.exceptions.AccessDenied", "message": "Access Denied"}
            }
        }))
        .unwrap_err();

        assert!(matches!(error, OdooSynthError::RemoteAuthFailed { .. }));
    }

    #[test]
    fn test_decode_envelope_session_expired() {
        let error = decode_envelope(json!({
            "error": {"code": 100, "message": "Odoo Session Expired",
                      "data": {"name": "odoo.http.SessionExpiredException"}}
        }))
        .unwrap_err();

        assert!(matches!(error, OdooSynthError::RemoteAuthFailed { .. }));
    }

    #[test]
    fn test_decode_envelope_application_error() {
        let error = decode_envelope(json!({
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": {"name": "builtins.ValueError", "message": "Invalid field 'foo' on model 'sale.order'"}
            }
        }))
        .unwrap_err();

        match error {
            OdooSynthError::RemoteProtocolError { code, message } => {
                assert_eq!(code, 200);
                assert!(message.contains("Invalid field 'foo'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_envelope_malformed() {
        let error = decode_envelope(json!({"jsonrpc": "2.0", "id": 1})).unwrap_err();
        assert!(matches!(
            error,
            OdooSynthError::RemoteProtocolError { code: MALFORMED_ENVELOPE_CODE, .. }
        ));

        let error = decode_envelope(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(error, OdooSynthError::RemoteProtocolError { .. }));
    }
}

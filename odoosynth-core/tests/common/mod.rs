//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use odoosynth_core::reasoning::{ChatRequest, ReasoningService};
use odoosynth_core::remote::RemoteSource;
use odoosynth_core::{ModelCatalog, OdooSynthError, Record, Result, SearchRequest};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory remote serving fixed records per model.
#[derive(Default)]
pub struct ScriptedRemote {
    fields: BTreeMap<String, BTreeSet<String>>,
    records: BTreeMap<String, Vec<Record>>,
    broken_models: HashSet<String>,
    search_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model with its fields and records.
    pub fn with_model(mut self, model: &str, fields: &[&str], records: Vec<Value>) -> Self {
        self.fields.insert(
            model.to_string(),
            fields.iter().map(|f| (*f).to_string()).collect(),
        );
        self.records.insert(
            model.to_string(),
            records
                .into_iter()
                .map(|value| match value {
                    Value::Object(map) => map,
                    other => panic!("record must be an object: {other}"),
                })
                .collect(),
        );
        self
    }

    /// Listed in the catalog but `fields_of` fails.
    pub fn with_broken_model(mut self, model: &str) -> Self {
        self.broken_models.insert(model.to_string());
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
    async fn list_models(&self) -> Result<ModelCatalog> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelCatalog::new(
            self.fields.keys().chain(self.broken_models.iter()).cloned(),
        ))
    }

    async fn fields_of(&self, model: &str) -> Result<BTreeSet<String>> {
        if self.broken_models.contains(model) {
            return Err(OdooSynthError::remote_protocol(
                200,
                format!("access to '{model}' is restricted"),
            ));
        }
        self.fields
            .get(model)
            .cloned()
            .ok_or_else(|| OdooSynthError::remote_protocol(200, format!("no model '{model}'")))
    }

    async fn search(&self, model: &str, request: &SearchRequest) -> Result<Vec<Record>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.get(model).cloned().unwrap_or_default();
        let start = usize::try_from(request.offset).unwrap();
        Ok(records
            .into_iter()
            .skip(start)
            .take(request.limit as usize)
            .map(|mut record| {
                record.retain(|key, _| key == "id" || request.fields.contains(key));
                record
            })
            .collect())
    }
}

/// Reasoning service answering from a queue of canned responses.
#[derive(Default)]
pub struct ScriptedReasoning {
    responses: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedReasoning {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails the first call with `PlanGenerationFailed`.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(OdooSynthError::plan_generation(
                "HTTP 503: upstream overloaded",
            ))])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn complete_json(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OdooSynthError::plan_generation("no scripted response left")))
    }
}

/// Three confirmed sale orders across two months and two salespeople.
pub fn sales_remote() -> ScriptedRemote {
    ScriptedRemote::new()
        .with_model(
            "sale.order",
            &["id", "name", "date_order", "amount_total", "user_id", "state"],
            vec![
                json!({"id": 1, "name": "SO001", "date_order": "2024-01-05 09:00:00",
                       "amount_total": 100.5, "user_id": [2, "Mitchell Admin"], "state": "sale"}),
                json!({"id": 2, "name": "SO002", "date_order": "2024-01-20 14:30:00",
                       "amount_total": 50.25, "user_id": [2, "Mitchell Admin"], "state": "sale"}),
                json!({"id": 3, "name": "SO003", "date_order": "2024-02-11 11:15:00",
                       "amount_total": 75.0, "user_id": [6, "Marc Demo"], "state": "sale"}),
            ],
        )
        .with_model(
            "res.users",
            &["id", "name", "login"],
            vec![
                json!({"id": 2, "name": "Mitchell Admin", "login": "admin"}),
                json!({"id": 6, "name": "Marc Demo", "login": "demo"}),
            ],
        )
        .with_model("product.product", &["id", "name", "list_price"], Vec::new())
}

pub const STAGE_ONE_SALES: &str = r#"{"relevant_models": ["sale.order", "res.users"]}"#;

pub const STAGE_TWO_SALES: &str = r#"{
  "models_and_fields": {
    "sale.order": ["date_order", "amount_total", "user_id"],
    "res.users": ["id", "name"]
  },
  "transform_sql": "CREATE VIEW transform_data AS SELECT date_trunc('month', o.date_order) AS month, u.name AS salesperson, SUM(o.amount_total) AS revenue FROM sale_order o JOIN \"res.users\" u ON o.user_id = u.id GROUP BY date_trunc('month', o.date_order), u.name ORDER BY month, salesperson"
}"#;

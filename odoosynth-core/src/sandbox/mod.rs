//! Sandboxed execution of generated transformations.
//!
//! A transformation is a sequence of SQL `CREATE VIEW` statements, one of
//! which defines `transform_data`. It runs in an embedded DataFusion context
//! built fresh for every run:
//!
//! - only the extracted tables are registered (by model name and by
//!   underscore alias); there is no information schema and no URL tables
//! - statements other than `CREATE VIEW` are rejected before anything runs
//! - DML and session statements are denied again at planning time
//! - the memory pool is bounded and evaluation has a wall-clock budget
//! - engine errors and panics come back as `TransformationExecutionFailed`
//!
//! # Module Structure
//! - `coercion`: column classification and Arrow conversion of raw tables
//! - `result`: the [`ResultTable`] output and column name sanitizing

use crate::config::SandboxConfig;
use crate::error::OdooSynthError;
use crate::models::{ENTRY_POINT, RawTable, TransformationProcedure};
use crate::Result;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::datasource::MemTable;
use datafusion::error::DataFusionError;
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::{SQLOptions, SessionConfig, SessionContext};
use datafusion::sql::TableReference;
use datafusion::sql::parser::{DFParser, Statement as DFStatement};
use datafusion::sql::sqlparser::ast::Statement;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub mod coercion;
pub mod result;

pub use coercion::{ColumnKind, classify_column, to_record_batch};
pub use result::{ResultTable, sanitize_column_name};

/// Longest statement excerpt quoted in a rejection message.
const EXCERPT_LEN: usize = 60;

/// Underscore alias of a model name: `sale.order` becomes `sale_order`.
pub fn table_alias(model: &str) -> String {
    model.replace('.', "_")
}

fn excerpt(statement: &impl ToString) -> String {
    let text = statement.to_string();
    match text.char_indices().nth(EXCERPT_LEN) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text,
    }
}

fn engine_error(error: DataFusionError) -> OdooSynthError {
    OdooSynthError::execution_failed(error.to_string())
}

/// Parses a procedure and keeps only plain `CREATE VIEW` statements.
///
/// # Errors
/// `TransformationExecutionFailed` for a syntax error, `ProcedureRejected`
/// for any other kind of statement
pub fn check_procedure(procedure: &TransformationProcedure) -> Result<Vec<Statement>> {
    let parsed = DFParser::parse_sql(procedure.source())
        .map_err(|e| OdooSynthError::execution_failed(format!("SQL syntax error: {}", e)))?;

    parsed
        .into_iter()
        .map(|statement| match statement {
            DFStatement::Statement(inner)
                if matches!(
                    *inner,
                    Statement::CreateView {
                        materialized: false,
                        ..
                    }
                ) =>
            {
                Ok(*inner)
            }
            other => Err(OdooSynthError::procedure_rejected(format!(
                "only CREATE VIEW statements are allowed, found '{}'",
                excerpt(&other)
            ))),
        })
        .collect()
}

fn statement_options() -> SQLOptions {
    SQLOptions::new()
        .with_allow_ddl(true)
        .with_allow_dml(false)
        .with_allow_statements(false)
}

/// Runs transformations against extracted tables.
pub struct TransformationSandbox {
    config: SandboxConfig,
}

impl TransformationSandbox {
    /// Creates a sandbox with the given limits.
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Runs `procedure` over `tables` and returns the `transform_data` relation.
    ///
    /// # Errors
    /// - `ProcedureRejected` if a statement is not a `CREATE VIEW`
    /// - `EntryPointMissing` if no `transform_data` relation exists afterwards
    /// - `TransformationExecutionFailed` for syntax, planning and execution
    ///   errors, panics, and an exhausted time budget
    pub async fn run(
        &self,
        procedure: &TransformationProcedure,
        tables: &BTreeMap<String, RawTable>,
    ) -> Result<ResultTable> {
        self.config.validate()?;

        let statements = check_procedure(procedure)?;
        let ctx = self.new_context()?;
        self.register_tables(&ctx, tables)?;

        debug!(
            "Running {} statement(s) over {} table(s)",
            statements.len(),
            tables.len()
        );

        let sql: Vec<String> = statements.iter().map(ToString::to_string).collect();
        let handle = tokio::spawn(execute(ctx, sql));
        let abort = handle.abort_handle();

        let result = match tokio::time::timeout(self.config.execution_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(join_failure(join_error)),
            Err(_) => {
                abort.abort();
                Err(OdooSynthError::execution_failed(format!(
                    "transformation did not finish within {:?}",
                    self.config.execution_timeout
                )))
            }
        }?;

        info!(
            "Transformation produced {} row(s) in {} column(s)",
            result.num_rows(),
            result.column_names().len()
        );
        Ok(result)
    }

    fn new_context(&self) -> Result<SessionContext> {
        let runtime = RuntimeEnvBuilder::new()
            .with_memory_limit(self.config.memory_limit_bytes, 1.0)
            .build_arc()
            .map_err(engine_error)?;

        let session = SessionConfig::new()
            .with_information_schema(false)
            .with_target_partitions(self.config.target_partitions);

        Ok(SessionContext::new_with_config_rt(session, runtime))
    }

    fn register_tables(
        &self,
        ctx: &SessionContext,
        tables: &BTreeMap<String, RawTable>,
    ) -> Result<()> {
        for (model, table) in tables {
            let batch = to_record_batch(table)?;
            let provider = Arc::new(
                MemTable::try_new(batch.schema(), vec![vec![batch]]).map_err(engine_error)?,
            );

            ctx.register_table(TableReference::bare(model.as_str()), provider.clone())
                .map_err(engine_error)?;

            let alias = table_alias(model);
            if self.config.register_aliases && alias != *model && !tables.contains_key(&alias) {
                ctx.register_table(TableReference::bare(alias.as_str()), provider)
                    .map_err(engine_error)?;
            }

            debug!(model = %model, rows = table.num_rows(), "Registered input table");
        }
        Ok(())
    }
}

async fn execute(ctx: SessionContext, statements: Vec<String>) -> Result<ResultTable> {
    for sql in &statements {
        ctx.sql_with_options(sql, statement_options())
            .await
            .map_err(engine_error)?;
    }

    if !ctx.table_exist(ENTRY_POINT).map_err(engine_error)? {
        return Err(OdooSynthError::EntryPointMissing {
            entry_point: ENTRY_POINT.to_string(),
        });
    }

    let frame = ctx.table(ENTRY_POINT).await.map_err(engine_error)?;
    let schema: SchemaRef = Arc::new(frame.schema().as_arrow().clone());
    let batches = frame.collect().await.map_err(engine_error)?;

    ResultTable::new(schema, batches)
}

fn join_failure(error: tokio::task::JoinError) -> OdooSynthError {
    if !error.is_panic() {
        return OdooSynthError::execution_failed("transformation was cancelled");
    }

    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    OdooSynthError::execution_failed(format!("transformation panicked: {}", message))
}

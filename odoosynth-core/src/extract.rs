//! Paginated extraction of planned models.
//!
//! Each model is read with `search` at offsets `0, P, 2P, ...` until a page
//! comes back empty, so `N` records cost exactly `ceil(N / P) + 1` calls. A
//! short page does not end pagination. Pages are normalized onto the planned
//! field list and concatenated in arrival order.
//!
//! # Limits
//! - `max_pages_per_model` counts every call, including the final empty one
//! - `max_elapsed_per_model` bounds wall-clock time for one model
//! - `page_timeout` bounds a single call
//!
//! Hitting any of them fails the model with `ExtractionBudgetExceeded`. Any
//! failure aborts the whole plan as `ExtractionFailed { model, .. }`.

use crate::config::ExtractionConfig;
use crate::error::OdooSynthError;
use crate::models::{ExtractionPlan, ExtractionProgress, ProgressCallback, RawTable, SearchRequest};
use crate::normalize::normalize_with_columns;
use crate::remote::RemoteSource;
use crate::Result;
use futures::{StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Reads planned models from a remote session.
pub struct Extractor {
    remote: Arc<dyn RemoteSource>,
    config: ExtractionConfig,
}

impl Extractor {
    /// Creates an extractor.
    pub fn new(remote: Arc<dyn RemoteSource>, config: ExtractionConfig) -> Self {
        Self { remote, config }
    }

    /// Extracts every model of `plan`.
    ///
    /// Models run up to `max_concurrent_models` at a time; pages within a
    /// model are always fetched in order.
    ///
    /// # Errors
    /// `Configuration` for an invalid config, otherwise `ExtractionFailed`
    /// for the first model that fails
    pub async fn extract(
        &self,
        plan: &ExtractionPlan,
        progress: Option<ProgressCallback>,
    ) -> Result<BTreeMap<String, RawTable>> {
        self.config.validate()?;

        let start_time = Instant::now();
        let concurrency = self.config.max_concurrent_models.max(1);

        info!(
            "Extracting {} model(s) with page size {}",
            plan.len(),
            self.config.page_size
        );

        let tables: Vec<(String, RawTable)> = futures::stream::iter(plan.iter())
            .map(|(model, fields)| {
                let progress = progress.as_ref();
                async move {
                    let table = self.extract_model(model, fields, progress).await?;
                    Ok::<_, OdooSynthError>((model.to_string(), table))
                }
            })
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

        let total_rows: usize = tables.iter().map(|(_, table)| table.num_rows()).sum();
        info!(
            "Extraction finished in {:.2}s - {} model(s), {} row(s)",
            start_time.elapsed().as_secs_f64(),
            tables.len(),
            total_rows
        );

        Ok(tables.into_iter().collect())
    }

    /// Extracts one model onto `fields`.
    ///
    /// # Errors
    /// `ExtractionFailed { model, cause }` wrapping the page failure or the
    /// exceeded budget
    pub async fn extract_model(
        &self,
        model: &str,
        fields: &[String],
        progress: Option<&ProgressCallback>,
    ) -> Result<RawTable> {
        self.paginate(model, fields, progress)
            .await
            .map_err(|e| {
                tracing::error!(model = %model, "Extraction failed: {}", e);
                OdooSynthError::extraction_failed(model, e)
            })
    }

    async fn paginate(
        &self,
        model: &str,
        fields: &[String],
        progress: Option<&ProgressCallback>,
    ) -> Result<RawTable> {
        let started = Instant::now();
        let page_size = self.config.page_size;
        let mut table = RawTable::new(fields.to_vec());
        let mut offset: u64 = 0;
        let mut page: u32 = 0;

        loop {
            if page >= self.config.max_pages_per_model {
                return Err(OdooSynthError::budget_exceeded(format!(
                    "'{}' did not finish within {} pages",
                    model, self.config.max_pages_per_model
                )));
            }

            if page > 0
                && let Some(throttle_ms) = self.config.throttle_ms
            {
                tokio::time::sleep(Duration::from_millis(throttle_ms)).await;
            }

            let remaining = self
                .config
                .max_elapsed_per_model
                .saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(elapsed_exceeded(model, self.config.max_elapsed_per_model));
            }

            page += 1;
            let request = SearchRequest::page(fields, page_size, offset);
            let page_budget = self.config.page_timeout.min(remaining);

            let records =
                match tokio::time::timeout(page_budget, self.remote.search(model, &request)).await
                {
                    Ok(result) => result?,
                    Err(_) if page_budget < self.config.page_timeout => {
                        return Err(elapsed_exceeded(model, self.config.max_elapsed_per_model));
                    }
                    Err(_) => {
                        return Err(OdooSynthError::budget_exceeded(format!(
                            "page {} of '{}' did not answer within {:?}",
                            page, model, self.config.page_timeout
                        )));
                    }
                };

            let finished = records.is_empty();
            if !finished {
                table.append(normalize_with_columns(&records, fields));
                offset += u64::from(page_size);
            }

            debug!(
                model = %model,
                page,
                offset,
                rows = records.len(),
                "Fetched page"
            );

            if let Some(callback) = progress {
                callback(&ExtractionProgress {
                    model: model.to_string(),
                    page,
                    rows_so_far: table.num_rows(),
                    finished,
                });
            }

            if finished {
                break;
            }
        }

        info!(
            model = %model,
            rows = table.num_rows(),
            "Extracted {} page(s) in {:.2}s",
            page,
            started.elapsed().as_secs_f64()
        );

        Ok(table)
    }
}

fn elapsed_exceeded(model: &str, limit: Duration) -> OdooSynthError {
    OdooSynthError::budget_exceeded(format!("'{}' did not finish within {:?}", model, limit))
}

// src/dispatch/pipeline.rs

use super::{run, DispatchOptions, DispatchReport};
use crate::{
    error::ConversionError,
    request::{Exchange, Executor, RetryPolicy},
    results::{AggregateState, Aggregator, LogFormat, RequestResult, RunLog},
};
use anyhow::Result;
use chrono::Local;
use reqwest::Method;
use std::{path::Path, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One row bound to its rendered payload and target endpoint.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub row: usize,
    pub key: Option<String>,
    pub method: Method,
    pub url: String,
    pub body: String,
    pub detail: Option<String>,
}

impl WorkItem {
    pub fn new(row: usize, method: Method, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            row,
            key: None,
            method,
            url: url.into(),
            body: body.into(),
            detail: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// How one operation sends its requests. Kept per operation: retry and pacing differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPolicy {
    pub retry: Option<RetryPolicy>,
    pub options: DispatchOptions,
    pub log_format: LogFormat,
}

impl OperationPolicy {
    /// Whether a response counts as success under this policy.
    pub fn accepts(&self, exchange: &Exchange) -> bool {
        match &self.retry {
            Some(retry) => exchange.status == retry.success_status,
            None => exchange.is_success(),
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: AggregateState,
    pub report: DispatchReport,
}

impl RunOutcome {
    /// Combine with the outcome of a dependent step that ran after this one.
    pub fn followed_by(mut self, later: RunOutcome) -> RunOutcome {
        self.state.absorb(later.state);
        self.report.dispatched += later.report.dispatched;
        self.report.cancelled += later.report.cancelled;
        self.report.elapsed += later.report.elapsed;
        self
    }
}

struct Shared {
    executor: Executor,
    policy: OperationPolicy,
    log: RunLog,
    aggregator: Aggregator,
    cancel: CancellationToken,
}

/// Builds work items, sends them through the dispatch engine and records every outcome.
pub struct Pipeline {
    shared: Arc<Shared>,
}

impl Pipeline {
    /// Open the run log at `log_path` in the policy's format.
    pub fn new(
        executor: Executor,
        policy: OperationPolicy,
        log_path: &Path,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let log = RunLog::open(log_path, policy.log_format)?;
        Ok(Self {
            shared: Arc::new(Shared {
                executor,
                policy,
                log,
                aggregator: Aggregator::new(),
                cancel,
            }),
        })
    }

    pub fn log_path(&self) -> &Path {
        self.shared.log.path()
    }

    /// Dispatch every input. `prepare` receives the 1-based row index and the input and
    /// runs on the worker; a conversion failure skips only that row.
    pub async fn run<T, P>(self, inputs: Vec<T>, prepare: P) -> RunOutcome
    where
        T: Send + 'static,
        P: Fn(usize, T) -> Result<WorkItem, ConversionError> + Send + Sync + 'static,
    {
        let items: Vec<(usize, T)> = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| (i + 1, input))
            .collect();
        let options = self.shared.policy.options;
        let cancel = self.shared.cancel.clone();

        let shared = Arc::clone(&self.shared);
        let report = run(items, &options, &cancel, move |(row, input)| {
            let shared = Arc::clone(&shared);
            let prepared = prepare(row, input);
            async move {
                match prepared {
                    Ok(item) => shared.send(item).await,
                    Err(e) => shared.skip(row, &e),
                }
            }
        })
        .await;

        // every task has joined, so this is normally the last reference
        let state = match Arc::try_unwrap(self.shared) {
            Ok(shared) => shared.aggregator.into_state(),
            Err(shared) => shared.aggregator.snapshot(),
        };
        RunOutcome { state, report }
    }
}

impl Shared {
    fn skip(&self, row: usize, err: &ConversionError) {
        warn!(row, error = %err, "skipping row");
        self.aggregator.skip(row);
        if let Err(e) = self.log.conversion_error(row, &err.to_string()) {
            warn!(row, error = %e, "could not write run log");
        }
    }

    async fn send(&self, item: WorkItem) {
        let started_at = Local::now();
        let start = Instant::now();
        let body = (!item.body.is_empty()).then_some(item.body.as_str());

        let outcome = match &self.policy.retry {
            Some(retry) => {
                self.executor
                    .execute_with_retry(&item.method, &item.url, body, retry, &self.cancel)
                    .await
            }
            None => {
                self.executor
                    .execute(&item.method, &item.url, body, &self.cancel)
                    .await
            }
        };

        let (status, response_body, response, error) = match outcome {
            Ok(ex) => {
                let error = (!self.policy.accepts(&ex))
                    .then(|| format!("unexpected status {}", ex.status));
                let response = ex.json();
                (ex.status, ex.body, response, error)
            }
            Err(e) => (e.status(), String::new(), None, Some(e.to_string())),
        };

        let result = RequestResult {
            row: item.row,
            key: item.key,
            status,
            body: response_body,
            response,
            error,
            method: item.method.to_string(),
            endpoint: item.url,
            payload: item.body,
            detail: item.detail,
            started_at,
            finished_at: Local::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        match &result.error {
            Some(err) => warn!(row = result.row, key = ?result.key, status, error = %err, "request failed"),
            None => info!(row = result.row, key = ?result.key, status, ms = result.duration_ms, "request ok"),
        }
        if let Err(e) = self.log.result(&result) {
            warn!(row = result.row, error = %e, "could not write run log");
        }
        self.aggregator.record(result);
    }
}

// src/results/mod.rs

use chrono::{DateTime, Local};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

pub mod artifacts;
pub mod log;
pub mod summary;

pub use artifacts::{write_case_ids, write_field_template, write_payloads};
pub use log::{LogFormat, RunLog};
pub use summary::{print_summary, print_unique_responses};

/// Outcome of one dispatched work item.
#[derive(Debug, Clone, Serialize)]
pub struct RequestResult {
    /// 1-based data-row index; the only ordering key across workers.
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// 0 when no response was received.
    pub status: u16,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub method: String,
    pub endpoint: String,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration_ms: u64,
}

impl RequestResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Counters and results accumulated over one dispatch run.
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    pub status_counts: BTreeMap<u16, usize>,
    pub unique_responses: BTreeMap<u16, BTreeMap<String, usize>>,
    /// In completion order, not input order.
    pub results: Vec<RequestResult>,
    /// Rows dropped before sending because their payload could not be built.
    pub skipped: Vec<usize>,
}

impl AggregateState {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn count(&self, status: u16) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Fold in the state of a later run of the same operation.
    pub fn absorb(&mut self, later: AggregateState) {
        for (status, n) in later.status_counts {
            *self.status_counts.entry(status).or_default() += n;
        }
        for (status, bodies) in later.unique_responses {
            let seen = self.unique_responses.entry(status).or_default();
            for (body, n) in bodies {
                *seen.entry(body).or_default() += n;
            }
        }
        self.results.extend(later.results);
        self.skipped.extend(later.skipped);
    }

    /// Results ordered by row index.
    pub fn sorted_results(&self) -> Vec<&RequestResult> {
        let mut out: Vec<_> = self.results.iter().collect();
        out.sort_by_key(|r| r.row);
        out
    }
}

/// Shared sink for results; every mutation is one critical section.
#[derive(Debug, Default)]
pub struct Aggregator {
    state: Mutex<AggregateState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: RequestResult) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state.status_counts.entry(result.status).or_default() += 1;
        *state
            .unique_responses
            .entry(result.status)
            .or_default()
            .entry(result.body.clone())
            .or_default() += 1;
        state.results.push(result);
    }

    pub fn skip(&self, row: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.skipped.push(row);
    }

    pub fn snapshot(&self) -> AggregateState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take the state out once all workers have joined.
    pub fn into_state(self) -> AggregateState {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn result(row: usize, status: u16, body: &str) -> RequestResult {
        let now = Local::now();
        RequestResult {
            row,
            key: Some(format!("C{}", row)),
            status,
            body: body.to_string(),
            response: serde_json::from_str(body).ok(),
            error: None,
            method: "POST".into(),
            endpoint: "http://localhost/x".into(),
            payload: "{}".into(),
            detail: None,
            started_at: now,
            finished_at: now,
            duration_ms: 3,
        }
    }
}

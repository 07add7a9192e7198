use super::AggregateState;
use std::fmt::Write;
use tracing::info;

/// Status histogram, ascending by status code.
pub fn format_summary(state: &AggregateState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Summary of Status Codes:");
    for (status, count) in &state.status_counts {
        let _ = writeln!(out, "Status Code {}: {} occurrences", status, count);
    }
    let _ = writeln!(out, "Total requests: {}", state.total());
    if !state.skipped.is_empty() {
        let _ = writeln!(out, "Skipped rows: {}", state.skipped.len());
    }
    out
}

pub fn print_summary(state: &AggregateState) {
    print!("{}", format_summary(state));
    for (status, count) in &state.status_counts {
        info!(status, count, "status count");
    }
    info!(
        total = state.total(),
        skipped = state.skipped.len(),
        "run finished"
    );
}

pub fn format_unique_responses(state: &AggregateState) -> String {
    let mut out = String::new();
    for (status, bodies) in &state.unique_responses {
        let _ = writeln!(out, "Status {}:", status);
        for (body, count) in bodies {
            let _ = writeln!(out, "  [{}x] {}", count, body);
        }
    }
    out
}

pub fn print_unique_responses(state: &AggregateState) {
    print!("{}", format_unique_responses(state));
}

// src/ops/add_fields.rs

use super::finish;
use crate::{
    context::RunContext,
    dispatch::{DispatchOptions, OperationPolicy, WorkItem},
    error::ConversionError,
    input::{read_table, Row},
    request::RetryPolicy,
    results::{AggregateState, LogFormat},
};
use anyhow::Result;
use reqwest::Method;
use serde::Serialize;

pub const ENDPOINT: &str = "/form/api/v1/add_field";
pub const LOG_FILE: &str = "add_fields.log";

#[derive(Debug, Clone, clap::Args)]
pub struct AddFieldsArgs {
    /// CSV under data/ with columns form_name, field_name, is_mandatory
    #[arg(long, default_value = "form_fields.csv")]
    pub file: String,
    /// Number of parallel workers
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

#[derive(Debug, Serialize)]
struct FieldPayload<'a> {
    form_name: &'a str,
    field_name: &'a str,
    is_mandatory: bool,
    source: &'static str,
}

pub fn policy(concurrency: usize) -> OperationPolicy {
    OperationPolicy {
        retry: Some(RetryPolicy::until_ok(3)),
        options: DispatchOptions::workers(concurrency),
        log_format: LogFormat::Block,
    }
}

fn cell<'a>(row: &'a Row, idx: usize, column: &str) -> Result<&'a str, ConversionError> {
    row.cells()
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| ConversionError::MissingColumn(column.to_string()))
}

/// Columns are positional: form name, field name, mandatory flag.
fn prepare(row: &Row, url: &str) -> Result<WorkItem, ConversionError> {
    let form_name = cell(row, 0, "form_name")?;
    let field_name = cell(row, 1, "field_name")?;
    let is_mandatory = cell(row, 2, "is_mandatory")?.to_lowercase() == "true";

    let body = serde_json::to_string_pretty(&FieldPayload {
        form_name,
        field_name,
        is_mandatory,
        source: "selected",
    })?;

    Ok(WorkItem::new(row.index, Method::POST, url, body)
        .with_key(format!("{}/{}", form_name, field_name))
        .with_detail(format!(
            "Form Name: {}, Field Name: {}, Is Mandatory: {}",
            form_name, field_name, is_mandatory
        )))
}

pub async fn run(ctx: &RunContext, args: &AddFieldsArgs) -> Result<AggregateState> {
    let table = read_table(&ctx.layout.data_dir().join(&args.file))?;
    let url = ctx.url(ENDPOINT);
    let pipeline = ctx.pipeline(policy(args.concurrency), LOG_FILE)?;
    let log_path = pipeline.log_path().to_path_buf();

    let outcome = pipeline
        .run(table.rows, move |_, row: Row| prepare(&row, &url))
        .await;
    Ok(finish(outcome, &log_path))
}

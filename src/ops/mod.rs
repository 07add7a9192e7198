// src/ops/mod.rs

//! The bulk operations, one typed handler per CLI subcommand.

use crate::{
    context::RunContext,
    dispatch::RunOutcome,
    error::SetupError,
    input::{list_files, Row},
    payload::{template::unresolved_placeholders, Template},
    results::{print_summary, AggregateState},
};
use anyhow::Result;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod add_fields;
pub mod answer_csv;
pub mod answer_template;
pub mod apply_product;
pub mod assign_role;
pub mod call_api;
pub mod get_fields;

#[derive(Debug, Clone, Subcommand)]
pub enum Operation {
    /// Add fields to forms from a CSV of form_name,field_name,is_mandatory
    AddFields(add_fields::AddFieldsArgs),
    /// Apply for a product N times and save the new case ids
    ApplyProduct(apply_product::ApplyProductArgs),
    /// Grant EDIT policies to roles from a CSV of role_name,url_path
    AssignRole(assign_role::AssignRoleArgs),
    /// Answer questions from a CSV with typed `name||type` headers
    AnswerCsv(answer_csv::AnswerCsvArgs),
    /// Render a JSON template once per saved case id and send it
    AnswerTemplate(answer_template::AnswerTemplateArgs),
    /// Render a JSON template once per CSV row, rate limited
    CallApi(call_api::CallApiArgs),
    /// Write the typed answer-csv header and an example row for a product's form
    GetFields(get_fields::GetFieldsArgs),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddFields(_) => "add-fields",
            Operation::ApplyProduct(_) => "apply-product",
            Operation::AssignRole(_) => "assign-role",
            Operation::AnswerCsv(_) => "answer-csv",
            Operation::AnswerTemplate(_) => "answer-template",
            Operation::CallApi(_) => "call-api",
            Operation::GetFields(_) => "get-fields",
        }
    }

    pub async fn run(&self, ctx: &RunContext) -> Result<AggregateState> {
        info!(operation = self.name(), "starting");
        match self {
            Operation::AddFields(args) => add_fields::run(ctx, args).await,
            Operation::ApplyProduct(args) => apply_product::run(ctx, args).await,
            Operation::AssignRole(args) => assign_role::run(ctx, args).await,
            Operation::AnswerCsv(args) => answer_csv::run(ctx, args).await,
            Operation::AnswerTemplate(args) => answer_template::run(ctx, args).await,
            Operation::CallApi(args) => call_api::run(ctx, args).await,
            Operation::GetFields(args) => get_fields::run(ctx, args).await,
        }
    }
}

/// `dir/name`, or a setup error listing the `ext` files that do exist there.
fn pick_file(dir: &Path, name: &str, ext: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if path.is_file() {
        return Ok(path);
    }
    let available = list_files(dir, ext).unwrap_or_default();
    Err(anyhow::Error::new(SetupError::MissingPath(path))
        .context(format!("available {} files: [{}]", ext, available.join(", "))))
}

/// Render `template` for `row`, reporting placeholders that nothing filled in.
fn render_row(template: &Template, row: &Row) -> String {
    let rendered = template.render(row);
    if !rendered.changed {
        info!(row = row.index, "no placeholder matched; sending template unchanged");
    }
    let unresolved = unresolved_placeholders(&rendered.text);
    if !unresolved.is_empty() {
        warn!(row = row.index, ?unresolved, "unresolved placeholders left in payload");
    }
    rendered.text
}

/// Common tail of every operation: histogram to stdout and the tracing log.
fn finish(outcome: RunOutcome, log_path: &Path) -> AggregateState {
    let RunOutcome { state, report } = outcome;
    print_summary(&state);
    info!(
        log = %log_path.display(),
        dispatched = report.dispatched,
        cancelled = report.cancelled,
        elapsed = ?report.elapsed,
        "results logged"
    );
    state
}

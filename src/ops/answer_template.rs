// src/ops/answer_template.rs

use super::{finish, pick_file, render_row};
use crate::{
    context::RunContext,
    dispatch::{DispatchOptions, OperationPolicy, WorkItem},
    error::ConversionError,
    input::{read_table, Row},
    ops::apply_product::CASE_IDS_FILE,
    payload::Template,
    results::{AggregateState, LogFormat},
};
use anyhow::Result;
use std::sync::Arc;

pub const LOG_FILE: &str = "answer_template.log";

#[derive(Debug, Clone, clap::Args)]
pub struct AnswerTemplateArgs {
    /// JSON template under templates/
    #[arg(long)]
    pub template: String,
    /// Endpoint name from config/endpoints.yaml
    #[arg(long)]
    pub endpoint: String,
    /// Case id CSV under data/
    #[arg(long, default_value = CASE_IDS_FILE)]
    pub file: String,
}

pub fn policy() -> OperationPolicy {
    OperationPolicy {
        retry: None,
        options: DispatchOptions::per_item(),
        log_format: LogFormat::Block,
    }
}

pub async fn run(ctx: &RunContext, args: &AnswerTemplateArgs) -> Result<AggregateState> {
    let template = Arc::new(Template::load(&pick_file(
        &ctx.layout.template_dir(),
        &args.template,
        ".json",
    )?)?);
    let table = read_table(&ctx.layout.data_dir().join(&args.file))?;
    let (method, url) = ctx.endpoint(&args.endpoint)?;
    let pipeline = ctx.pipeline(policy(), LOG_FILE)?;
    let log_path = pipeline.log_path().to_path_buf();

    let outcome = pipeline
        .run(table.rows, move |_, row: Row| {
            let case_id = row
                .get("case_id")
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ConversionError::MissingColumn("case_id".into()))?;
            let body = render_row(&template, &row);
            Ok(WorkItem::new(row.index, method.clone(), url.as_str(), body)
                .with_key(case_id)
                .with_detail(format!("Case ID: {}", case_id)))
        })
        .await;
    Ok(finish(outcome, &log_path))
}

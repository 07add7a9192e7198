// src/ops/apply_product.rs

use super::finish;
use crate::{
    config::{load_yaml, Products},
    context::RunContext,
    dispatch::{DispatchOptions, OperationPolicy, WorkItem},
    results::{print_unique_responses, write_case_ids, AggregateState, LogFormat},
};
use anyhow::{bail, Result};
use reqwest::Method;
use serde_json::json;
use tracing::info;

pub const ENDPOINT: &str = "/question-taskpool/api/v1/apply-for-product";
pub const CASE_IDS_FILE: &str = "multi_case_ids.csv";
pub const LOG_FILE: &str = "apply_product.log";

#[derive(Debug, Clone, clap::Args)]
pub struct ApplyProductArgs {
    /// Product key or display name from config/products.yaml
    #[arg(long)]
    pub product: String,
    /// Number of applications to submit
    #[arg(long)]
    pub count: usize,
}

pub fn policy() -> OperationPolicy {
    OperationPolicy {
        retry: None,
        options: DispatchOptions::per_item(),
        log_format: LogFormat::Block,
    }
}

/// Case ids found at `data.case_id` of the responses, in row order.
pub fn case_ids(state: &AggregateState) -> Vec<String> {
    state
        .sorted_results()
        .into_iter()
        .filter_map(|r| r.response.as_ref()?.get("data")?.get("case_id")?.as_str())
        .map(str::to_string)
        .collect()
}

pub async fn run(ctx: &RunContext, args: &ApplyProductArgs) -> Result<AggregateState> {
    if args.count == 0 {
        bail!("number of case ids must be greater than 0");
    }
    let products: Products = load_yaml(&ctx.layout.products_file())?;
    let product_name = products.resolve(&args.product)?.to_string();
    info!(product = %product_name, count = args.count, "applying for product");

    let body = json!({ "product_name": product_name }).to_string();
    let url = ctx.url(ENDPOINT);
    let pipeline = ctx.pipeline(policy(), LOG_FILE)?;
    let log_path = pipeline.log_path().to_path_buf();

    let outcome = pipeline
        .run(vec![(); args.count], move |row, ()| {
            Ok(WorkItem::new(row, Method::POST, url.as_str(), body.as_str())
                .with_detail(format!("Product: {}", product_name)))
        })
        .await;
    let state = finish(outcome, &log_path);

    let ids = case_ids(&state);
    write_case_ids(&ctx.layout.data_dir().join(CASE_IDS_FILE), &ids)?;
    println!("Unique responses:");
    print_unique_responses(&state);
    Ok(state)
}

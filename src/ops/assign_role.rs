// src/ops/assign_role.rs

use super::finish;
use crate::{
    context::RunContext,
    dispatch::{DispatchOptions, OperationPolicy, WorkItem},
    error::ConversionError,
    input::{read_table, Row},
    results::{AggregateState, LogFormat},
    session::validate_base_url,
};
use anyhow::Result;
use reqwest::Method;
use serde_json::json;

pub const ENDPOINT: &str = "/authentication/api/v1/rbac/add-role-policy";
pub const LOG_FILE: &str = "role_assignment.log";

#[derive(Debug, Clone, clap::Args)]
pub struct AssignRoleArgs {
    /// CSV under data/ with columns role_name, url_path
    #[arg(long, default_value = "roles.csv")]
    pub file: String,
}

pub fn policy() -> OperationPolicy {
    OperationPolicy {
        retry: None,
        options: DispatchOptions::per_item(),
        log_format: LogFormat::Block,
    }
}

fn prepare(row: &Row, url: &str) -> Result<WorkItem, ConversionError> {
    let mut cells = row.cells().iter();
    let (Some(role_name), Some(url_path)) = (cells.next(), cells.next()) else {
        return Err(ConversionError::MissingColumn("url_path".into()));
    };
    let body = json!({
        "policy": { "role_name": role_name, "url_path": url_path, "action": "EDIT" }
    })
    .to_string();

    Ok(WorkItem::new(row.index, Method::POST, url, body)
        .with_key(role_name.as_str())
        .with_detail(format!("Role Name: {}, URL Path: {}", role_name, url_path)))
}

pub async fn run(ctx: &RunContext, args: &AssignRoleArgs) -> Result<AggregateState> {
    validate_base_url(&ctx.environment.base_url)?;
    let table = read_table(&ctx.layout.data_dir().join(&args.file))?;
    let url = ctx.url(ENDPOINT);
    let pipeline = ctx.pipeline(policy(), LOG_FILE)?;
    let log_path = pipeline.log_path().to_path_buf();

    let outcome = pipeline
        .run(table.rows, move |_, row: Row| prepare(&row, &url))
        .await;
    Ok(finish(outcome, &log_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::Fixture;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, ResponseTemplate,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_role_is_sent_once_without_retry() -> Result<()> {
        let fx = Fixture::start().await;
        fx.write(
            "data/roles.csv",
            "role_name,url_path\nadmin,/cases\nviewer,/reports\n",
        );
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(body_json(json!({
                "policy": {"role_name": "admin", "url_path": "/cases", "action": "EDIT"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .expect(1)
            .mount(&fx.server)
            .await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&fx.server)
            .await;

        let state = run(&fx.ctx, &AssignRoleArgs { file: "roles.csv".into() }).await?;
        assert_eq!(state.count(201), 1);
        assert_eq!(state.count(500), 1);

        let log = fx.read("logs/role_assignment.log");
        assert!(log.contains("Row 1 successful\nRole Name: admin, URL Path: /cases\n"));
        assert!(log.contains("Error in row 2: unexpected status 500\n"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_roles_file_is_setup_error() {
        let fx = Fixture::start().await;
        let err = run(&fx.ctx, &AssignRoleArgs { file: "roles.csv".into() })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("roles.csv"));
    }
}

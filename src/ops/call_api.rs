// src/ops/call_api.rs

use super::{finish, pick_file, render_row};
use crate::{
    context::RunContext,
    dispatch::{DispatchOptions, OperationPolicy, RateLimit, WorkItem},
    input::{read_table, Row},
    payload::Template,
    results::{AggregateState, LogFormat},
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};

pub const LOG_FILE: &str = "call_api.log";
pub const MAX_IN_FLIGHT: usize = 5;

#[derive(Debug, Clone, clap::Args)]
pub struct CallApiArgs {
    /// JSON template under templates/
    #[arg(long)]
    pub template: String,
    /// Row data CSV under data/
    #[arg(long)]
    pub file: String,
    /// Endpoint name from config/endpoints.yaml
    #[arg(long)]
    pub endpoint: String,
    /// Minimum spacing between two requests
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
}

pub fn policy(interval: Duration) -> OperationPolicy {
    OperationPolicy {
        retry: None,
        options: DispatchOptions::per_item().with_rate_limit(RateLimit {
            interval,
            max_in_flight: MAX_IN_FLIGHT,
        }),
        log_format: LogFormat::Block,
    }
}

pub async fn run(ctx: &RunContext, args: &CallApiArgs) -> Result<AggregateState> {
    let template = Arc::new(Template::load(&pick_file(
        &ctx.layout.template_dir(),
        &args.template,
        ".json",
    )?)?);
    let table = read_table(&pick_file(&ctx.layout.data_dir(), &args.file, ".csv")?)?;
    let (method, url) = ctx.endpoint(&args.endpoint)?;
    let pipeline = ctx.pipeline(policy(Duration::from_millis(args.interval_ms)), LOG_FILE)?;
    let log_path = pipeline.log_path().to_path_buf();

    let outcome = pipeline
        .run(table.rows, move |_, row: Row| {
            let body = render_row(&template, &row);
            let mut item = WorkItem::new(row.index, method.clone(), url.as_str(), body);
            if let Some(first) = row.cells().first().filter(|c| !c.is_empty()) {
                item = item.with_key(first.as_str());
            }
            Ok(item)
        })
        .await;
    Ok(finish(outcome, &log_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::Fixture;
    use wiremock::{
        matchers::{method, path},
        Mock, ResponseTemplate,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_requests_are_paced_by_the_ticker() -> Result<()> {
        let fx = Fixture::start().await;
        fx.write(
            "config/endpoints.yaml",
            "endpoints-config:\n  - name: Update Case\n    endpoint: /case/api/v1/update\n    method: PATCH\n",
        );
        fx.write("templates/update.json", r#"{"case_id":"{{case_id}}","stage":"{{stage}}"}"#);
        fx.write(
            "data/stages.csv",
            "case_id,stage\nC1,review\nC2,review\nC3,done\nC4,done\nC5,done\n",
        );
        Mock::given(method("PATCH"))
            .and(path("/case/api/v1/update"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(5)
            .mount(&fx.server)
            .await;

        let args = CallApiArgs {
            template: "update.json".into(),
            file: "stages.csv".into(),
            endpoint: "Update Case".into(),
            interval_ms: 100,
        };
        let started = std::time::Instant::now();
        let state = run(&fx.ctx, &args).await?;
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(state.count(200), 5);

        let last = state.sorted_results()[4];
        assert_eq!(last.key.as_deref(), Some("C5"));
        assert_eq!(last.payload, r#"{"case_id":"C5","stage":"done"}"#);
        Ok(())
    }
}

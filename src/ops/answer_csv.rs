// src/ops/answer_csv.rs

use super::finish;
use crate::{
    context::RunContext,
    dispatch::{DispatchOptions, OperationPolicy, WorkItem},
    input::{read_table, Row},
    payload::{build_answers, AnswersPayload},
    results::{write_payloads, AggregateState, LogFormat},
};
use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_ENDPOINT: &str = "Answer Question";
pub const LOG_FILE: &str = "answer_csv.log";
pub const PAYLOADS_FILE: &str = "answer_payloads.json";

#[derive(Debug, Clone, clap::Args)]
pub struct AnswerCsvArgs {
    /// CSV under answers/ whose headers follow name||type[||MULTI]
    #[arg(long)]
    pub file: String,
    /// Endpoint name from config/endpoints.yaml
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
    /// Number of parallel workers
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

pub fn policy(concurrency: usize) -> OperationPolicy {
    OperationPolicy {
        retry: None,
        options: DispatchOptions::workers(concurrency),
        log_format: LogFormat::JsonLines,
    }
}

pub async fn run(ctx: &RunContext, args: &AnswerCsvArgs) -> Result<AggregateState> {
    let table = read_table(&ctx.layout.answers_dir().join(&args.file))?;
    let (method, url) = ctx.endpoint(&args.endpoint)?;
    let file_dir = ctx.layout.file_dir();
    let pipeline = ctx.pipeline(policy(args.concurrency), LOG_FILE)?;
    let log_path = pipeline.log_path().to_path_buf();

    let built: Arc<Mutex<Vec<(usize, AnswersPayload)>>> = Arc::default();
    let sink = Arc::clone(&built);
    let outcome = pipeline
        .run(table.rows, move |_, row: Row| {
            let payload = build_answers(&row, &file_dir)?;
            let body = serde_json::to_string(&payload)?;
            let item = WorkItem::new(row.index, method.clone(), url.as_str(), body)
                .with_key(payload.case_id.as_str());
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((row.index, payload));
            Ok(item)
        })
        .await;
    let state = finish(outcome, &log_path);

    let mut payloads = std::mem::take(&mut *built.lock().unwrap_or_else(PoisonError::into_inner));
    payloads.sort_by_key(|(row, _)| *row);
    let payloads: Vec<AnswersPayload> = payloads.into_iter().map(|(_, p)| p).collect();
    write_payloads(&ctx.layout.log_file(PAYLOADS_FILE), &payloads)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testing::Fixture;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, ResponseTemplate,
    };

    const ENDPOINTS: &str = "endpoints-config:\n  - name: Answer Question\n    endpoint: /question-taskpool/api/v1/answer\n    method: POST\n";

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_missing_file_reference_skips_only_that_row() -> Result<()> {
        let fx = Fixture::start().await;
        fx.write("config/endpoints.yaml", ENDPOINTS);
        fx.write("answers/files/id.png", "png-bytes");
        fx.write(
            "answers/batch.csv",
            "case_id,name||text,photo||file,tags||text||MULTI\n\
             C1,Alice,id.png,a\\b\n\
             C2,Bob,missing.png,c\n\
             C3,Cara,id.png,d\n",
        );
        Mock::given(method("POST"))
            .and(path("/question-taskpool/api/v1/answer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(2)
            .mount(&fx.server)
            .await;

        let args = AnswerCsvArgs {
            file: "batch.csv".into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            concurrency: 3,
        };
        let state = run(&fx.ctx, &args).await?;
        assert_eq!(state.count(200), 2);
        assert_eq!(state.skipped, vec![2]);

        let keys: Vec<_> = state
            .sorted_results()
            .iter()
            .filter_map(|r| r.key.clone())
            .collect();
        assert_eq!(keys, vec!["C1", "C3"]);

        let sent: serde_json::Value = serde_json::from_str(&state.sorted_results()[0].payload)?;
        assert_eq!(sent["case_id"], "C1");
        assert_eq!(sent["is_question_mode"], false);
        assert_eq!(sent["answers"][1]["field_name"], "photo");
        assert_eq!(
            sent["answers"][1]["field_value"],
            "data:application/octet-stream;base64,cG5nLWJ5dGVz"
        );
        assert_eq!(sent["answers"][2]["field_value"], r#"["a","b"]"#);

        let log = fx.read("logs/answer_csv.log");
        let events: Vec<String> = log
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["event"].to_string())
            .collect();
        assert_eq!(events.iter().filter(|e| e.contains("response_received")).count(), 2);
        assert_eq!(events.iter().filter(|e| e.contains("conversion_error")).count(), 1);

        let payloads: serde_json::Value =
            serde_json::from_str(&fx.read("logs/answer_payloads.json"))?;
        assert_eq!(payloads.as_array().map(Vec::len), Some(2));
        assert_eq!(payloads[1]["case_id"], "C3");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_endpoint_name_is_rejected() -> Result<()> {
        let fx = Fixture::start().await;
        fx.write("config/endpoints.yaml", ENDPOINTS);
        fx.write("answers/batch.csv", "case_id,name||text\nC1,Alice\n");
        let args = AnswerCsvArgs {
            file: "batch.csv".into(),
            endpoint: "Submit Case".into(),
            concurrency: 1,
        };
        assert!(run(&fx.ctx, &args).await.is_err());
        Ok(())
    }
}

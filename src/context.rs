// src/context.rs

use crate::{
    config::{load_yaml, EndpointConfig, Endpoints, EnvFile, Environment, Layout},
    dispatch::{OperationPolicy, Pipeline},
    request::{parse_method, Executor},
    session::{api_url, authenticate, validate_base_url, AuthHeaders},
};
use anyhow::{Context, Result};
use reqwest::{Client, Method};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything one dispatch run needs, passed explicitly to each operation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub layout: Layout,
    pub environment: Environment,
    pub executor: Executor,
    pub cancel: CancellationToken,
}

/// Shared HTTP client for a run; `timeout` bounds each request.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

impl RunContext {
    /// Load the named environment, log in once and keep the bearer headers for the run.
    pub async fn connect(
        layout: Layout,
        env_name: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let envs: EnvFile = load_yaml(&layout.env_file())?;
        let environment = envs.select(env_name)?.clone();
        validate_base_url(&environment.base_url)?;

        let client = build_client(timeout)?;
        let headers = authenticate(
            &client,
            &environment.base_url,
            &environment.email,
            &environment.password,
        )
        .await?;
        info!(env = %environment.name, base_url = %environment.base_url, "session ready");

        Ok(Self::new(layout, environment, client, headers, cancel))
    }

    pub fn new(
        layout: Layout,
        environment: Environment,
        client: Client,
        headers: AuthHeaders,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            layout,
            environment,
            executor: Executor::new(client, headers),
            cancel,
        }
    }

    pub fn url(&self, path: &str) -> String {
        api_url(&self.environment.base_url, path)
    }

    /// Resolve a named endpoint from `endpoints.yaml` to its method and full URL.
    pub fn endpoint(&self, name: &str) -> Result<(Method, String)> {
        let endpoints: Endpoints = load_yaml(&self.layout.endpoints_file())?;
        let EndpointConfig {
            endpoint, method, ..
        } = endpoints.find(name)?;
        let method = parse_method(method)?;
        Ok((method, self.url(endpoint)))
    }

    /// A pipeline whose run log is `logs/<log_name>`.
    pub fn pipeline(&self, policy: OperationPolicy, log_name: &str) -> Result<Pipeline> {
        self.layout
            .ensure_log_dir()
            .context("creating log directory")?;
        Pipeline::new(
            self.executor.clone(),
            policy,
            &self.layout.log_file(log_name),
            self.cancel.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SetupError, session::LOGIN_PATH};
    use std::fs;
    use tempfile::tempdir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn test_connect_authenticates_against_selected_env() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": {"session_id": "abc"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let layout = Layout::new(dir.path());
        fs::create_dir_all(layout.config_dir())?;
        fs::write(
            layout.env_file(),
            format!(
                "environments:\n  - name: local\n    base_url: {}\n    email: a@b.c\n    password: pw\n",
                server.uri()
            ),
        )?;
        fs::write(
            layout.endpoints_file(),
            "endpoints-config:\n  - name: Answer Question\n    endpoint: /q/answer\n    method: put\n",
        )?;

        let ctx = RunContext::connect(
            layout,
            "local",
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .await?;
        assert_eq!(ctx.url("/x/y"), format!("{}/x/y", server.uri()));

        let (m, url) = ctx.endpoint("Answer Question")?;
        assert_eq!(m, Method::PUT);
        assert_eq!(url, format!("{}/q/answer", server.uri()));
        assert!(ctx.endpoint("Missing").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_without_env_file_is_setup_error() -> Result<()> {
        let dir = tempdir()?;
        let err = RunContext::connect(
            Layout::new(dir.path()),
            "local",
            Duration::from_secs(1),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::MissingPath(_))
        ));
        Ok(())
    }
}

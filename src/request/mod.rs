// src/request/mod.rs

use crate::{error::RequestError, session::AuthHeaders};
use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub mod retry;

pub use retry::RetryPolicy;

/// Status and fully drained body of one HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub status: u16,
    pub body: String,
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body decoded as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

pub fn parse_method(s: &str) -> Result<Method, RequestError> {
    Method::from_bytes(s.trim().to_uppercase().as_bytes())
        .map_err(|_| RequestError::InvalidMethod(s.to_string()))
}

/// Sends requests on the run's shared client with the authenticated headers merged in.
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
    headers: AuthHeaders,
}

impl Executor {
    pub fn new(client: Client, headers: AuthHeaders) -> Self {
        Self { client, headers }
    }

    /// Send one request. Any received status is `Ok`; only transport failures and
    /// cancellation are errors. The response body is always read to the end, and a
    /// failure there keeps the status in [`RequestError::Body`].
    pub async fn execute(
        &self,
        method: &Method,
        url: &str,
        body: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Exchange, RequestError> {
        let mut req = self
            .client
            .request(method.clone(), url)
            .headers(self.headers.header_map().clone());
        if let Some(body) = body {
            req = req.body(body.to_string());
        }

        let exchange = async {
            let resp = req.send().await?;
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|source| RequestError::Body { status, source })?;
            Ok::<_, RequestError>(Exchange { status, body })
        };

        let exchange = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RequestError::Cancelled),
            res = exchange => res?,
        };

        debug!(%method, url, status = exchange.status, "response");
        trace!(body = %exchange.body, "response body");
        Ok(exchange)
    }
}

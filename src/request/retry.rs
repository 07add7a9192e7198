use super::{Exchange, Executor};
use crate::error::RequestError;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Bounded, immediate retry until a specific status is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub success_status: u16,
}

impl RetryPolicy {
    pub const fn until_ok(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            success_status: 200,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::until_ok(3)
    }
}

impl Executor {
    /// Send up to `policy.max_attempts` times, stopping at the first response with
    /// `policy.success_status`. When attempts run out the outcome of the last attempt
    /// is returned: the non-matching response, or the transport error. Cancellation
    /// stops retrying at once.
    pub async fn execute_with_retry(
        &self,
        method: &Method,
        url: &str,
        body: Option<&str>,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Exchange, RequestError> {
        let attempts = policy.max_attempts.max(1);
        let mut last = Err(RequestError::Cancelled);

        for attempt in 1..=attempts {
            info!(attempt, url, payload = body.unwrap_or_default(), "sending");
            match self.execute(method, url, body, cancel).await {
                Ok(ex) if ex.status == policy.success_status => return Ok(ex),
                Ok(ex) => {
                    warn!(attempt, status = ex.status, url, body = %ex.body, "unexpected status");
                    last = Ok(ex);
                }
                Err(RequestError::Cancelled) => return Err(RequestError::Cancelled),
                Err(e) => {
                    warn!(attempt, url, error = %e, "request failed");
                    last = Err(e);
                }
            }
        }

        last
    }
}

// src/session.rs

use crate::error::SetupError;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;

pub const LOGIN_PATH: &str = "/authentication/api/v1/login";

#[derive(Serialize)]
struct LoginPayload<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Deserialize)]
struct LoginData {
    session_id: String,
}

/// Headers every request of a run carries. Read-only once built.
#[derive(Debug, Clone)]
pub struct AuthHeaders {
    headers: HeaderMap,
}

impl AuthHeaders {
    pub fn bearer(token: &str) -> Result<Self, SetupError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| SetupError::Auth(format!("unusable session token: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
        Ok(Self { headers })
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Check that `base_url` is an absolute http(s) URL.
pub fn validate_base_url(base_url: &str) -> Result<Url, SetupError> {
    let url = Url::parse(base_url).map_err(|_| SetupError::InvalidBaseUrl(base_url.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(SetupError::InvalidBaseUrl(base_url.to_string())),
    }
}

/// Join an API path onto a base URL without doubling the slash.
pub fn api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Log in once and return the bearer header set shared by the whole run.
#[instrument(level = "info", skip(client, password))]
pub async fn authenticate(
    client: &Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<AuthHeaders, SetupError> {
    validate_base_url(base_url)?;
    let url = api_url(base_url, LOGIN_PATH);

    let resp = client
        .post(&url)
        .json(&LoginPayload { email, password })
        .send()
        .await
        .map_err(|e| SetupError::Auth(format!("POST {}: {}", url, e)))?;

    let status = resp.status();
    if status != StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(SetupError::Auth(format!("{} {}", status, body.trim())));
    }

    let login: LoginResponse = resp
        .json()
        .await
        .map_err(|e| SetupError::Auth(format!("decoding login response: {}", e)))?;

    info!("authenticated");
    AuthHeaders::bearer(&login.data.session_id)
}

// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems found before any request is dispatched.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("missing file or directory: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("no data rows in {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("unknown environment `{0}`")]
    UnknownEnvironment(String),

    #[error("endpoint `{0}` not found in endpoint config")]
    UnknownEndpoint(String),

    #[error("product `{0}` not found in product config")]
    UnknownProduct(String),

    #[error("malformed config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Row-scoped failures while turning a CSV row into a payload. The row is skipped.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("cannot parse `{0}` as a date (expected DD-MM-YYYY)")]
    Date(String),

    #[error("cannot read file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed column header `{0}` (expected name||type[||MULTI])")]
    MalformedHeader(String),

    #[error("row has no `{0}` column")]
    MissingColumn(String),

    #[error("cannot encode values: {0}")]
    Json(#[from] serde_json::Error),
}

/// Row-scoped failures while talking to the remote API.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status {status} but reading the body failed: {source}")]
    Body {
        status: u16,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),

    #[error("cancelled")]
    Cancelled,
}

impl RequestError {
    /// Status to record for a failed request: the received one when headers arrived,
    /// otherwise 0.
    pub fn status(&self) -> u16 {
        match self {
            RequestError::Body { status, .. } => *status,
            _ => 0,
        }
    }
}

// src/config/mod.rs

use crate::error::SetupError;
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::debug;

pub mod layout;

pub use layout::Layout;

/// One target deployment of the case API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub base_url: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvFile {
    #[serde(default)]
    pub environments: Vec<Environment>,
}

impl EnvFile {
    pub fn select(&self, name: &str) -> Result<&Environment, SetupError> {
        self.environments
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SetupError::UnknownEnvironment(name.to_string()))
    }
}

/// A named API route; `endpoint` is a path appended to the environment's base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub endpoint: String,
    pub method: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(rename = "endpoints-config", default)]
    pub configs: Vec<EndpointConfig>,
}

impl Endpoints {
    pub fn find(&self, name: &str) -> Result<&EndpointConfig, SetupError> {
        self.configs
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SetupError::UnknownEndpoint(name.to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Products {
    #[serde(default)]
    pub products: BTreeMap<String, String>,
}

impl Products {
    /// Look a product up by key first, then by its display name.
    pub fn resolve(&self, wanted: &str) -> Result<&str, SetupError> {
        self.products
            .get(wanted)
            .or_else(|| self.products.values().find(|name| name.as_str() == wanted))
            .map(String::as_str)
            .ok_or_else(|| SetupError::UnknownProduct(wanted.to_string()))
    }
}

/// Read and deserialize a YAML file, mapping a missing file to `SetupError::MissingPath`.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(SetupError::MissingPath(path.to_path_buf()).into());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    serde_yaml::from_str(&text).map_err(|source| {
        SetupError::Config {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

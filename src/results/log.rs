//! Durable per-run log file.

use super::RequestResult;
use anyhow::{Context, Result};
use chrono::{Local, SecondsFormat};
use serde_json::json;
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

const SEPARATOR: &str = "----------------------------";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line block per result.
    Block,
    /// One `{"timestamp","event","details"}` object per line.
    JsonLines,
}

/// Append-only log shared by all workers of a run; its own lock serialises writes.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    format: LogFormat,
    file: Mutex<File>,
}

impl RunLog {
    pub fn open(path: impl Into<PathBuf>, format: LogFormat) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Self {
            path,
            format,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &str) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(entry.as_bytes())?;
        if !entry.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()
    }

    /// Write the entry for a completed request. In JSON-line form a request that got no
    /// response is a `request_error`; anything with a status is a `response_received`.
    pub fn result(&self, result: &RequestResult) -> io::Result<()> {
        let entry = match self.format {
            LogFormat::Block => format_block(result),
            LogFormat::JsonLines => {
                let event = if result.status == 0 {
                    "request_error"
                } else {
                    "response_received"
                };
                let details = serde_json::to_value(result).map_err(io::Error::other)?;
                format_json_line(event, details)
            }
        };
        self.append(&entry)
    }

    /// Write the entry for a row whose payload could not be built.
    pub fn conversion_error(&self, row: usize, error: &str) -> io::Result<()> {
        let entry = match self.format {
            LogFormat::Block => {
                format!("Conversion error in row {}: {}\n{}\n", row, error, SEPARATOR)
            }
            LogFormat::JsonLines => {
                format_json_line("conversion_error", json!({ "row": row, "error": error }))
            }
        };
        self.append(&entry)
    }
}

pub fn format_block(result: &RequestResult) -> String {
    let mut entry = String::new();
    match &result.error {
        Some(err) => entry.push_str(&format!("Error in row {}: {}\n", result.row, err)),
        None => {
            entry.push_str(&format!("Row {} successful\n", result.row));
            if let Some(detail) = &result.detail {
                entry.push_str(detail);
                entry.push('\n');
            }
        }
    }
    entry.push_str(&format!(
        "Status Code: {}, Response: {}\n",
        result.status, result.body
    ));
    entry.push_str(&format!(
        "Endpoint: {} {}\nPayload: {}\n",
        result.method, result.endpoint, result.payload
    ));
    entry.push_str(&format!(
        "Time Received: {}, Duration: {}ms\n",
        result.finished_at.format("%Y-%m-%d %H:%M:%S"),
        result.duration_ms
    ));
    entry.push_str(SEPARATOR);
    entry.push('\n');
    entry
}

pub fn format_json_line(event: &str, details: serde_json::Value) -> String {
    let entry = json!({
        "timestamp": Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        "event": event,
        "details": details,
    });
    format!("{}\n", entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::testing::result;
    use tempfile::tempdir;

    #[test]
    fn test_block_entry_for_success_and_error() {
        let mut ok = result(3, 200, r#"{"ok":true}"#);
        ok.detail = Some("Role Name: admin".into());
        let block = format_block(&ok);
        assert!(block.starts_with("Row 3 successful\nRole Name: admin\n"));
        assert!(block.contains("Status Code: 200, Response: {\"ok\":true}\n"));
        assert!(block.contains("Endpoint: POST http://localhost/x\n"));
        assert!(block.ends_with("----------------------------\n"));

        let mut failed = result(4, 0, "");
        failed.error = Some("transport error: refused".into());
        let block = format_block(&failed);
        assert!(block.starts_with("Error in row 4: transport error: refused\n"));
        assert!(!block.contains("successful"));
    }

    #[test]
    fn test_json_lines_are_appended() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("logs").join("run.log");

        {
            let log = RunLog::open(&path, LogFormat::JsonLines)?;
            log.result(&result(1, 200, "ok"))?;
            log.conversion_error(2, "bad date")?;
        }
        {
            let log = RunLog::open(&path, LogFormat::JsonLines)?;
            let mut failed = result(3, 0, "");
            failed.error = Some("cancelled".into());
            log.result(&failed)?;
        }

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "response_received");
        assert_eq!(lines[0]["details"]["status"], 200);
        assert_eq!(lines[1]["event"], "conversion_error");
        assert_eq!(lines[1]["details"]["row"], 2);
        assert_eq!(lines[2]["event"], "request_error");
        assert!(lines[0]["timestamp"].as_str().is_some());
        Ok(())
    }
}

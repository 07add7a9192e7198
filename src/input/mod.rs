// src/input/mod.rs
use crate::error::SetupError;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path, sync::Arc};
use tracing::debug;

/// One data line of an input CSV, keyed by the shared header row.
#[derive(Debug, Clone)]
pub struct Row {
    /// 1-based position among the data rows (the header row is not counted).
    pub index: usize,
    headers: Arc<[String]>,
    cells: Vec<String>,
}

impl Row {
    pub fn new(index: usize, headers: Arc<[String]>, cells: Vec<String>) -> Self {
        Self {
            index,
            headers,
            cells,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Value of the first column whose header is exactly `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| self.cells.get(i))
            .map(String::as_str)
    }

    /// `(header, cell)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(String::as_str))
    }
}

/// A parsed CSV: header row plus data rows, read once before fan-out.
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Arc<[String]>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse CSV text whose first record is the header row.
pub fn parse_table<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Arc<[String]> = rdr
        .headers()
        .context("reading CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>()
        .into();

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("CSV parse error at data row {}", idx + 1))?;
        let cells = record.iter().map(str::to_string).collect();
        rows.push(Row::new(idx + 1, Arc::clone(&headers), cells));
    }

    Ok(Table { headers, rows })
}

/// Read a CSV file from disk. A missing file or a file without data rows is a setup error.
pub fn read_table(path: &Path) -> Result<Table> {
    if !path.is_file() {
        return Err(SetupError::MissingPath(path.to_path_buf()).into());
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let table =
        parse_table(file).with_context(|| format!("reading CSV {}", path.display()))?;
    if table.is_empty() {
        return Err(SetupError::EmptyInput(path.to_path_buf()).into());
    }
    debug!(path = %path.display(), rows = table.len(), "loaded CSV");
    Ok(table)
}

/// Lists files in `dir` with the given extension, sorted by name.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(extension))
        .collect();
    names.sort();
    Ok(names)
}

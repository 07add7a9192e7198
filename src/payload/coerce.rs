//! Cell coercion: raw CSV strings into the representation the case API expects.

use super::header::{DataType, HeaderDescriptor};
use crate::error::ConversionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use std::{fs, path::Path};

/// Accepted date layouts, tried in order.
pub const DATE_LAYOUTS: &[&str] = &["%d-%m-%Y", "%-d-%-m-%Y"];

/// Separator between sub-values of a `MULTI` cell.
pub const MULTI_DELIMITER: char = '\\';

const FILE_URI_PREFIX: &str = "data:application/octet-stream;base64,";

/// Parse `DD-MM-YYYY` (or `D-M-YYYY`) as midnight UTC, returning epoch seconds.
pub fn parse_date_epoch(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(raw, layout).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Coerce one value according to `data_type`. `file_dir` is where `file` cells are resolved.
pub fn coerce(raw: &str, data_type: &DataType, file_dir: &Path) -> Result<String, ConversionError> {
    match data_type {
        DataType::Date | DataType::DateTime => parse_date_epoch(raw)
            .map(|secs| secs.to_string())
            .ok_or_else(|| ConversionError::Date(raw.to_string())),
        // Any casing of any word passes through; only the case is normalised.
        DataType::Boolean => Ok(raw.to_lowercase()),
        DataType::File => {
            let path = file_dir.join(raw);
            let bytes = fs::read(&path).map_err(|source| ConversionError::File { path, source })?;
            Ok(format!("{}{}", FILE_URI_PREFIX, STANDARD.encode(bytes)))
        }
        DataType::Text | DataType::Number | DataType::Other(_) => Ok(raw.to_string()),
    }
}

/// Coerce a cell under its header. `MULTI` cells become a JSON array string of coerced parts.
pub fn coerce_cell(
    raw: &str,
    header: &HeaderDescriptor,
    file_dir: &Path,
) -> Result<String, ConversionError> {
    if !header.multi {
        return coerce(raw, &header.data_type, file_dir);
    }
    let values = raw
        .split(MULTI_DELIMITER)
        .map(|part| coerce(part, &header.data_type, file_dir))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_string(&values)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn header(s: &str) -> HeaderDescriptor {
        HeaderDescriptor::parse(s).unwrap()
    }

    #[test]
    fn test_dates_are_midnight_utc_epoch() {
        let expected = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap().timestamp();
        let dir = Path::new(".");
        assert_eq!(coerce("01-02-2024", &DataType::Date, dir).unwrap(), expected.to_string());
        assert_eq!(coerce("1-2-2024", &DataType::DateTime, dir).unwrap(), expected.to_string());
    }

    #[test]
    fn test_bad_date_is_conversion_error() {
        let err = coerce("2024-02-01", &DataType::Date, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConversionError::Date(v) if v == "2024-02-01"));
        assert!(coerce("31-02-2024", &DataType::Date, Path::new(".")).is_err());
    }

    #[test]
    fn test_boolean_only_lowercases() {
        let dir = Path::new(".");
        assert_eq!(coerce("TRUE", &DataType::Boolean, dir).unwrap(), "true");
        assert_eq!(coerce("False", &DataType::Boolean, dir).unwrap(), "false");
        assert_eq!(coerce("Maybe", &DataType::Boolean, dir).unwrap(), "maybe");
    }

    #[test]
    fn test_text_number_and_unknown_pass_through() {
        let dir = Path::new(".");
        assert_eq!(coerce(" 42 ", &DataType::Number, dir).unwrap(), " 42 ");
        assert_eq!(coerce("x", &DataType::Other("enum".into()), dir).unwrap(), "x");
    }

    #[test]
    fn test_file_becomes_data_uri() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("id.txt"), b"hello")?;

        let value = coerce("id.txt", &DataType::File, dir.path())?;
        assert_eq!(value, "data:application/octet-stream;base64,aGVsbG8=");

        let missing = coerce("nope.pdf", &DataType::File, dir.path()).unwrap_err();
        assert!(matches!(missing, ConversionError::File { .. }));
        Ok(())
    }

    #[test]
    fn test_multi_cell_is_json_array_of_coerced_parts() -> Result<()> {
        let cell = r"01-02-2024\2-3-2024\15-12-2023";
        let value = coerce_cell(cell, &header("when||date||MULTI"), Path::new("."))?;

        let parsed: Vec<String> = serde_json::from_str(&value)?;
        assert_eq!(parsed.len(), cell.split('\\').count());
        assert_eq!(parsed[0], parse_date_epoch("01-02-2024").unwrap().to_string());
        Ok(())
    }

    #[test]
    fn test_multi_short_circuits_on_first_bad_part() {
        let err = coerce_cell(r"01-02-2024\garbage", &header("d||date||MULTI"), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Date(v) if v == "garbage"));
    }

    #[test]
    fn test_multi_text_keeps_empty_parts() -> Result<()> {
        let value = coerce_cell(r"a\\b", &header("tags||text||MULTI"), Path::new("."))?;
        assert_eq!(value, r#"["a","","b"]"#);
        Ok(())
    }
}

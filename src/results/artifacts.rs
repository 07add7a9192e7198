use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, fs::File, io::BufWriter, path::Path};
use tracing::info;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

/// Write extracted case ids as a one-column CSV with a `case_id` header.
pub fn write_case_ids<S: AsRef<str>>(path: &Path, ids: &[S]) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record(["case_id"])?;
    for id in ids {
        wtr.write_record([id.as_ref()])?;
    }
    wtr.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    info!(path = %path.display(), count = ids.len(), "wrote case ids");
    Ok(())
}

/// Write a header row and one example row, the input layout `answer-csv` reads.
pub fn write_field_template<S: AsRef<str>>(path: &Path, header: &[S], example: &[S]) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record(header.iter().map(|s| s.as_ref()))?;
    wtr.write_record(example.iter().map(|s| s.as_ref()))?;
    wtr.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    info!(path = %path.display(), columns = header.len(), "wrote field template");
    Ok(())
}

/// Write every constructed payload as one pretty-printed JSON array.
pub fn write_payloads<T: Serialize>(path: &Path, payloads: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), payloads)
        .with_context(|| format!("writing payloads to {}", path.display()))?;
    info!(path = %path.display(), count = payloads.len(), "wrote payloads");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::read_table;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_case_ids_round_trip_through_reader() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data").join("multi_case_ids.csv");
        write_case_ids(&path, &["C1", "C2", "C3"])?;

        let table = read_table(&path)?;
        assert_eq!(&*table.headers, &["case_id".to_string()]);
        let ids: Vec<_> = table.rows.iter().filter_map(|r| r.get("case_id")).collect();
        assert_eq!(ids, vec!["C1", "C2", "C3"]);
        Ok(())
    }

    #[test]
    fn test_payloads_are_a_pretty_array() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("answer_payloads.json");
        write_payloads(&path, &[json!({"case_id": "C1"}), json!({"case_id": "C2"})])?;

        let text = fs::read_to_string(&path)?;
        assert!(text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[1]["case_id"], "C2");
        Ok(())
    }
}

// src/output.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::Path};
use tempfile::NamedTempFile;
use tracing::debug;

/// Write `rows` as CSV under an explicit header, creating parent directories.
///
/// The header is written even when `rows` is empty. The file is staged next to
/// its destination and renamed into place once complete.
pub fn write_csv<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file());
        wtr.write_record(headers)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    tmp.persist(path)
        .with_context(|| format!("renaming into {}", path.display()))?;
    debug!(path = %path.display(), rows = rows.len(), "csv written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Serialize)]
    struct Row {
        name: String,
        value: Option<f64>,
    }

    #[test]
    fn writes_header_and_rows() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested/out.csv");
        let rows = vec![
            Row {
                name: "a".into(),
                value: Some(1.5),
            },
            Row {
                name: "b, c".into(),
                value: None,
            },
        ];
        write_csv(&path, &["name", "value"], &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "name,value\na,1.5\n\"b, c\",\n");
    }

    #[test]
    fn empty_rows_still_get_a_header() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("empty.csv");
        write_csv::<Row>(&path, &["name", "value"], &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "name,value\n");
    }

    #[test]
    fn overwrites_existing_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("out.csv");
        fs::write(&path, "stale").unwrap();
        write_csv::<Row>(&path, &["name"], &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "name\n");
    }
}

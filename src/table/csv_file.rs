use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, LocaflowError};
use super::{LocalizationTable, Row};

/// Reserved header of the identifier column
pub const KEY_COLUMN: &str = "keys";

/// Read a `keys,<lang>,<lang>...` table. Empty cells become absent entries.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<LocalizationTable> {
    let path = path.as_ref();
    info!("Reading localization table: {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    match headers.get(0) {
        Some(first) if first.trim_start_matches('\u{feff}').trim() == KEY_COLUMN => {}
        other => {
            return Err(LocaflowError::Parse {
                path: path.display().to_string(),
                line: 1,
                message: format!(
                    "first column must be '{}', found '{}'",
                    KEY_COLUMN,
                    other.unwrap_or_default()
                ),
            });
        }
    }

    let languages: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    let mut table = LocalizationTable::with_languages(languages.iter().cloned());

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let key = record.get(0).unwrap_or_default();
        if key.is_empty() {
            warn!("Skipping row {} without key; it will not be written back", idx + 2);
            continue;
        }

        let mut row = Row::new(key);
        for (language, value) in languages.iter().zip(record.iter().skip(1)) {
            if !value.is_empty() {
                row = row.with_text(language.as_str(), value);
            }
        }
        table.push_row(row)?;
    }

    info!("Loaded {} rows in {} languages", table.len(), table.languages().len());
    Ok(table)
}

/// Write every row with the languages in table order.
pub fn write_csv<P: AsRef<Path>>(table: &LocalizationTable, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Writing localization table: {}", path.display());

    let mut writer = csv::WriterBuilder::new().from_path(path)?;

    let mut header = vec![KEY_COLUMN.to_string()];
    header.extend(table.languages().iter().cloned());
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut record = vec![row.key.as_str()];
        record.extend(table.languages().iter().map(|l| row.text(l).unwrap_or_default()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_key_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "id,en\nhello,Hello\n").unwrap();

        let err = read_csv(&path).unwrap_err();
        assert!(matches!(err, LocaflowError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_empty_cells_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        std::fs::write(&path, "keys,en,ja\nstart,Start,\nquit,Quit,終了\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.column("ja"), vec![None, Some("終了")]);
        assert_eq!(table.text("start", "en"), Some("Start"));
    }

    #[test]
    fn test_rows_without_key_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.csv");
        std::fs::write(&path, "keys,en\nstart,Start\n,Orphan\nquit,Quit\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("en"), vec![Some("Start"), Some("Quit")]);
    }

    #[test]
    fn test_multiline_cells_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.csv");

        let mut table = LocalizationTable::with_languages(["en"]);
        table.push_row(Row::new("intro").with_text("en", "Line one\nLine, two")).unwrap();
        write_csv(&table, &path).unwrap();

        let loaded = read_csv(&path).unwrap();
        assert_eq!(loaded.text("intro", "en"), Some("Line one\nLine, two"));
    }
}

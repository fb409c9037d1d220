// Localization table and its file adapters
//
// The table is the only shape the translation workflow reads and writes.
// Adapters convert to and from it:
// - csv_file: `keys` column plus one column per language code
// - po_file: gettext PO/POT catalogs

pub mod csv_file;
pub mod po_file;

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, LocaflowError};

/// One localization entry: a unique key and its text per language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    texts: HashMap<String, String>,
}

impl Row {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            texts: HashMap::new(),
        }
    }

    /// Builder-style text assignment
    pub fn with_text<L: Into<String>, T: Into<String>>(mut self, language: L, text: T) -> Self {
        self.texts.insert(language.into(), text.into());
        self
    }

    pub fn text(&self, language: &str) -> Option<&str> {
        self.texts.get(language).map(String::as_str)
    }

    pub fn has_text(&self, language: &str) -> bool {
        self.texts.get(language).is_some_and(|t| !t.is_empty())
    }
}

/// Ordered rows keyed by a unique identifier.
///
/// Row order is positional data: the plain-text strategy aligns model output
/// by index, so no operation here reorders rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizationTable {
    languages: Vec<String>,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

impl LocalizationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_languages<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for language in languages {
            table.add_language(&language.into());
        }
        table
    }

    /// Append a row. Keys must be unique.
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if self.index.contains_key(&row.key) {
            return Err(LocaflowError::DuplicateKey(row.key));
        }
        for language in row.texts.keys() {
            if !self.languages.contains(language) {
                self.languages.push(language.clone());
            }
        }
        self.index.insert(row.key.clone(), self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    /// Register a language column, keeping first-seen order.
    pub fn add_language(&mut self, language: &str) {
        if !self.languages.iter().any(|l| l == language) {
            self.languages.push(language.to_string());
        }
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn text(&self, key: &str, language: &str) -> Option<&str> {
        self.get(key).and_then(|row| row.text(language))
    }

    /// Values of one language column in row order.
    pub fn column(&self, language: &str) -> Vec<Option<&str>> {
        self.rows.iter().map(|row| row.text(language)).collect()
    }

    /// Write `(row index, text)` pairs into the column for `language`.
    pub fn set_column(&mut self, language: &str, values: Vec<(usize, String)>) {
        self.add_language(language);
        for (idx, text) in values {
            if let Some(row) = self.rows.get_mut(idx) {
                row.texts.insert(language.to_string(), text);
            }
        }
    }

    pub fn set_text(&mut self, key: &str, language: &str, text: &str) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        self.add_language(language);
        self.rows[idx].texts.insert(language.to_string(), text.to_string());
        true
    }

    /// Every row must carry text for the source language.
    pub fn validate_source(&self, language: &str) -> Result<()> {
        match self.rows.iter().find(|row| !row.has_text(language)) {
            Some(row) => Err(LocaflowError::MissingSourceText {
                language: language.to_string(),
                key: row.key.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Supported on-disk shapes of a localization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Po,
    Pot,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "po" => Ok(Self::Po),
            "pot" => Ok(Self::Pot),
            other => Err(LocaflowError::UnsupportedFormat(format!(
                "{} (expected .csv, .po or .pot)",
                if other.is_empty() { path.display().to_string() } else { format!(".{}", other) }
            ))),
        }
    }

    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// Read a table from `path`, choosing the adapter by extension.
/// Gettext catalogs carry their source text in `msgid`, stored under `source_language`.
pub fn load_table<P: AsRef<Path>>(path: P, source_language: &str) -> Result<LocalizationTable> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LocaflowError::FileNotFound(path.display().to_string()));
    }

    match TableFormat::from_path(path)? {
        TableFormat::Csv => csv_file::read_csv(path),
        TableFormat::Po | TableFormat::Pot => po_file::read_po(path, source_language),
    }
}

/// Write `table` to `path`. A gettext catalog holds one language, `target_language`.
pub fn save_table<P: AsRef<Path>>(
    table: &LocalizationTable,
    path: P,
    source_language: &str,
    target_language: Option<&str>,
) -> Result<()> {
    let path = path.as_ref();
    match TableFormat::from_path(path)? {
        TableFormat::Csv => csv_file::write_csv(table, path),
        TableFormat::Po | TableFormat::Pot => {
            po_file::write_po(table, path, source_language, target_language.unwrap_or(""))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LocalizationTable {
        let mut table = LocalizationTable::with_languages(["en"]);
        table.push_row(Row::new("greeting").with_text("en", "Hello")).unwrap();
        table.push_row(Row::new("farewell").with_text("en", "Bye")).unwrap();
        table
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut table = sample();
        let err = table.push_row(Row::new("greeting")).unwrap_err();
        assert!(matches!(err, LocaflowError::DuplicateKey(k) if k == "greeting"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_set_column_keeps_order() {
        let mut table = sample();
        table.set_column("ja", vec![(1, "さようなら".to_string()), (0, "こんにちは".to_string())]);
        assert_eq!(table.column("ja"), vec![Some("こんにちは"), Some("さようなら")]);
        assert_eq!(table.rows()[0].key, "greeting");
        assert_eq!(table.languages(), &["en".to_string(), "ja".to_string()]);
    }

    #[test]
    fn test_validate_source_names_row() {
        let mut table = sample();
        table.push_row(Row::new("empty").with_text("en", "")).unwrap();
        match table.validate_source("en") {
            Err(LocaflowError::MissingSourceText { language, key }) => {
                assert_eq!(language, "en");
                assert_eq!(key, "empty");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a/b.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("game.pot")).unwrap(), TableFormat::Pot);
        assert!(TableFormat::from_path(Path::new("game.translation")).is_err());
    }
}

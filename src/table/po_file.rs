use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Result, LocaflowError};
use super::{LocalizationTable, Row};

/// Separator gettext uses between `msgctxt` and `msgid` in lookup keys
pub const CONTEXT_SEPARATOR: char = '\u{4}';

/// One catalog entry as written in the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoEntry {
    pub msgctxt: Option<String>,
    pub msgid: String,
    pub msgid_plural: Option<String>,
    pub msgstr: Vec<String>,
}

impl PoEntry {
    pub fn key(&self) -> String {
        match &self.msgctxt {
            Some(ctx) => format!("{}{}{}", ctx, CONTEXT_SEPARATOR, self.msgid),
            None => self.msgid.clone(),
        }
    }

    fn is_header(&self) -> bool {
        self.msgctxt.is_none() && self.msgid.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str(usize),
}

#[derive(Default)]
struct EntryBuilder {
    entry: PoEntry,
    started: bool,
    has_msgstr: bool,
    field: Option<Field>,
}

impl EntryBuilder {
    fn append(&mut self, field: Field, text: &str) {
        match field {
            Field::Context => self.entry.msgctxt.get_or_insert_with(String::new).push_str(text),
            Field::Id => self.entry.msgid.push_str(text),
            Field::IdPlural => self.entry.msgid_plural.get_or_insert_with(String::new).push_str(text),
            Field::Str(n) => {
                if self.entry.msgstr.len() <= n {
                    self.entry.msgstr.resize(n + 1, String::new());
                }
                self.entry.msgstr[n].push_str(text);
            }
        }
    }

    fn take(&mut self) -> Option<PoEntry> {
        let builder = std::mem::take(self);
        builder.started.then_some(builder.entry)
    }
}

/// Parse catalog text into entries. Obsolete (`#~`) entries are dropped.
pub fn parse_po(content: &str, origin: &str) -> Result<Vec<PoEntry>> {
    let mut entries = Vec::new();
    let mut current = EntryBuilder::default();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        let parse_error = |message: String| LocaflowError::Parse {
            path: origin.to_string(),
            line: line_no,
            message,
        };

        if line.is_empty() {
            entries.extend(current.take());
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        if line.starts_with('"') {
            let field = current
                .field
                .ok_or_else(|| parse_error("string continuation without a keyword".to_string()))?;
            let text = unquote(line).map_err(parse_error)?;
            current.append(field, &text);
            continue;
        }

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| parse_error(format!("unexpected line: {}", line)))?;
        let field = match keyword {
            "msgctxt" => Field::Context,
            "msgid" => Field::Id,
            "msgid_plural" => Field::IdPlural,
            "msgstr" => Field::Str(0),
            other => match other.strip_prefix("msgstr[").and_then(|s| s.strip_suffix(']')) {
                Some(n) => Field::Str(n.parse().map_err(|_| parse_error(format!("bad plural index: {}", other)))?),
                None => return Err(parse_error(format!("unknown keyword: {}", other))),
            },
        };

        // A new msgctxt/msgid after a msgstr starts the next entry even without a blank line.
        if matches!(field, Field::Context | Field::Id) && current.has_msgstr {
            entries.extend(current.take());
        }
        if field == Field::Context {
            current.entry.msgctxt = Some(String::new());
        }
        if let Field::Str(_) = field {
            current.has_msgstr = true;
        }

        let text = unquote(rest.trim()).map_err(parse_error)?;
        current.started = true;
        current.field = Some(field);
        current.append(field, &text);
    }
    entries.extend(current.take());

    Ok(entries)
}

/// Value of `Language:` in the header entry, normalized to table codes.
pub fn catalog_language(entries: &[PoEntry]) -> Option<String> {
    let header = entries.iter().find(|e| e.is_header())?;
    header.msgstr.first()?.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        let value = value.trim();
        (name.trim().eq_ignore_ascii_case("Language") && !value.is_empty())
            .then(|| value.to_lowercase().replace('-', "_"))
    })
}

/// Keys of entries with plural forms. Rows keep only the singular text,
/// so these are written back without `msgid_plural` and `msgstr[n]`.
pub fn plural_keys(entries: &[PoEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| !e.is_header() && e.msgid_plural.is_some())
        .map(PoEntry::key)
        .collect()
}

/// Read a PO/POT catalog. `msgid` becomes the `source_language` text; translated
/// `msgstr` values land under the header's `Language:` code when it has one.
pub fn read_po<P: AsRef<Path>>(path: P, source_language: &str) -> Result<LocalizationTable> {
    let path = path.as_ref();
    info!("Reading gettext catalog: {}", path.display());

    let content = std::fs::read_to_string(path)?;
    let entries = parse_po(&content, &path.display().to_string())?;
    let language = catalog_language(&entries).filter(|l| l != source_language);
    let plurals = plural_keys(&entries);
    if !plurals.is_empty() {
        warn!(
            "{} plural entr(ies) in {} will be translated and saved as singular: {}",
            plurals.len(),
            path.display(),
            plurals.join(", ")
        );
    }

    let mut table = LocalizationTable::with_languages([source_language]);
    for entry in entries.iter().filter(|e| !e.is_header()) {
        let mut row = Row::new(entry.key()).with_text(source_language, entry.msgid.as_str());
        if let (Some(language), Some(msgstr)) = (&language, entry.msgstr.first()) {
            if !msgstr.is_empty() {
                row = row.with_text(language.as_str(), msgstr.as_str());
            }
        }
        table.push_row(row)?;
    }

    debug!("Catalog language: {:?}", language);
    info!("Loaded {} catalog entries", table.len());
    Ok(table)
}

/// Write one catalog for `target_language`. An empty target writes a template.
pub fn write_po<P: AsRef<Path>>(
    table: &LocalizationTable,
    path: P,
    source_language: &str,
    target_language: &str,
) -> Result<()> {
    let path = path.as_ref();
    info!("Writing gettext catalog ({}): {}", target_language, path.display());

    let mut out = String::new();
    out.push_str("msgid \"\"\nmsgstr \"\"\n");
    out.push_str("\"Content-Type: text/plain; charset=UTF-8\\n\"\n");
    if !target_language.is_empty() {
        let _ = writeln!(out, "\"Language: {}\\n\"", escape(target_language));
    }

    for row in table.rows() {
        out.push('\n');
        let (context, id) = match row.key.split_once(CONTEXT_SEPARATOR) {
            Some((ctx, id)) => (Some(ctx), id),
            None => (None, row.key.as_str()),
        };
        let msgid = row.text(source_language).unwrap_or(id);
        let msgstr = if target_language.is_empty() {
            ""
        } else {
            row.text(target_language).unwrap_or_default()
        };

        if let Some(ctx) = context {
            let _ = writeln!(out, "msgctxt \"{}\"", escape(ctx));
        }
        let _ = writeln!(out, "msgid \"{}\"", escape(msgid));
        let _ = writeln!(out, "msgstr \"{}\"", escape(msgstr));
    }

    std::fs::write(path, out)?;
    Ok(())
}

fn unquote(text: &str) -> std::result::Result<String, String> {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| format!("expected quoted string: {}", text))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err("dangling escape".to_string()),
        }
    }
    Ok(out)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

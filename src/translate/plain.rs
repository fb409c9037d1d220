use serde_json::Value;
use tracing::warn;

use crate::config::StrategyKind;
use crate::error::{Result, LocaflowError};
use crate::table::LocalizationTable;
use super::{ContentStrategy, Reconciliation, strip_code_fence};

/// Sends one line per row and assigns the reply by line position.
///
/// Embedded newlines are sent as a literal `\n` so each row stays on one line;
/// only rows whose source had real newlines get them restored.
/// A reply whose line count differs from the row count is rejected whole.
pub struct PlainTextStrategy;

fn escape_line(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\n")
}

fn unescape_line(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Split a complete reply into row segments. Spaces inside a segment are kept.
pub fn split_segments(reply: &str) -> Vec<String> {
    let normalized = strip_code_fence(reply).replace("\r\n", "\n");
    let body = normalized.trim_matches(|c: char| c == '\n' || c == '\r');
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n').map(|s| s.trim_end_matches('\r').to_string()).collect()
}

impl ContentStrategy for PlainTextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PlainText
    }

    fn reply_instructions(&self, row_count: usize) -> String {
        format!(
            "\n## Reply format\n\
             The text has {} lines, one entry per line.\n\
             Reply with exactly {} lines: line N of your reply is the translation of line N.\n\
             Keep every literal \\n sequence. Do not merge, split, number or comment on lines.\n",
            row_count, row_count
        )
    }

    fn format_hint(&self) -> Option<Value> {
        None
    }

    fn build_message(&self, table: &LocalizationTable, source_language: &str) -> Result<String> {
        let lines: Vec<String> = table
            .rows()
            .iter()
            .map(|row| escape_line(row.text(source_language).unwrap_or_default()))
            .collect();
        Ok(lines.join("\n"))
    }

    fn reconcile(
        &self,
        reply: &str,
        table: &LocalizationTable,
        source_language: &str,
        target_language: &str,
    ) -> Result<Reconciliation> {
        let segments = split_segments(reply);
        if segments.len() != table.len() {
            warn!(
                "Reply for {} has {} lines for {} rows; nothing assigned",
                target_language,
                segments.len(),
                table.len()
            );
            return Err(LocaflowError::Alignment {
                language: target_language.to_string(),
                expected: table.len(),
                actual: segments.len(),
            });
        }

        let assignments = segments
            .into_iter()
            .zip(table.rows())
            .enumerate()
            .map(|(idx, (segment, row))| {
                let multiline = row.text(source_language).is_some_and(|t| t.contains('\n'));
                (idx, if multiline { unescape_line(&segment) } else { segment })
            })
            .collect();
        Ok(Reconciliation::complete(assignments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn table(texts: &[&str]) -> LocalizationTable {
        let mut table = LocalizationTable::with_languages(["en"]);
        for (i, text) in texts.iter().enumerate() {
            table.push_row(Row::new(format!("row{}", i)).with_text("en", *text)).unwrap();
        }
        table
    }

    #[test]
    fn test_message_is_one_line_per_row() {
        let message = PlainTextStrategy
            .build_message(&table(&["Hello", "Two\nlines", "Bye"]), "en")
            .unwrap();
        assert_eq!(message, "Hello\nTwo\\nlines\nBye");
    }

    #[test]
    fn test_positional_assignment() {
        let rows = table(&["a", "b\nb2", "c\\nc2", "d"]);
        let reply = "A\r\nB\\nB2\nC\\nC2\nD\n";
        let result = PlainTextStrategy.reconcile(reply, &rows, "en", "x").unwrap();
        assert_eq!(
            result.assignments,
            vec![
                (0, "A".to_string()),
                (1, "B\nB2".to_string()),
                (2, "C\\nC2".to_string()),
                (3, "D".to_string()),
            ]
        );
    }

    #[test]
    fn test_count_mismatch_assigns_nothing() {
        let rows = table(&["Hello", "Bye"]);
        let err = PlainTextStrategy.reconcile("你好", &rows, "en", "ja").unwrap_err();
        match err {
            LocaflowError::Alignment { language, expected, actual } => {
                assert_eq!(language, "ja");
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_segment_whitespace_is_kept() {
        let rows = table(&["Score: ", "  indented", "x"]);
        let reply = "Punkte: \r\n  eingerückt\nx";
        let result = PlainTextStrategy.reconcile(reply, &rows, "en", "de").unwrap();
        assert_eq!(
            result.assignments,
            vec![
                (0, "Punkte: ".to_string()),
                (1, "  eingerückt".to_string()),
                (2, "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_reply_has_no_segments() {
        assert!(split_segments("\n\n").is_empty());
    }
}

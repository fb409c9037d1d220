// Content strategies for a target-language pass
//
// A strategy decides how table rows are packed into the user message and how
// the model's complete reply is mapped back onto rows:
// - Structured: key -> text JSON object, matched by key
// - PlainText: one line per row, matched by position
//
// Reconciliation always works on the full reply; nothing is assigned from
// partial stream output.

pub mod plain;
pub mod structured;

use serde_json::Value;

use crate::config::StrategyKind;
use crate::error::{Result, LocaflowError};
use crate::table::LocalizationTable;

/// Outcome of matching a complete reply back to rows.
#[derive(Debug)]
pub struct Reconciliation {
    /// `(row index, translated text)` pairs safe to write
    pub assignments: Vec<(usize, String)>,
    /// Keys the reply missed or invented; the pass counts as failed when set
    pub gap: Option<LocaflowError>,
}

impl Reconciliation {
    pub fn complete(assignments: Vec<(usize, String)>) -> Self {
        Self { assignments, gap: None }
    }
}

/// Main trait for packing rows into a request and reading the reply back
pub trait ContentStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Reply-format instructions appended to the system prompt
    fn reply_instructions(&self, row_count: usize) -> String;

    /// Structured-response hint passed with the request
    fn format_hint(&self) -> Option<Value>;

    /// User message carrying every row's source text
    fn build_message(&self, table: &LocalizationTable, source_language: &str) -> Result<String>;

    /// Map the full reply onto rows. `Err` rejects the reply as a whole.
    fn reconcile(
        &self,
        reply: &str,
        table: &LocalizationTable,
        source_language: &str,
        target_language: &str,
    ) -> Result<Reconciliation>;
}

/// Factory for creating strategy instances
pub struct StrategyFactory;

impl StrategyFactory {
    pub fn create(kind: StrategyKind) -> Box<dyn ContentStrategy> {
        match kind {
            StrategyKind::Structured => Box::new(structured::StructuredStrategy),
            StrategyKind::PlainText => Box::new(plain::PlainTextStrategy),
        }
    }
}

/// Drop a surrounding markdown code fence, which chat models like to add.
pub(crate) fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return reply;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return reply;
    };
    // Skip the info string (```json) up to the first newline.
    match body.find('\n') {
        Some(pos) => &body[pos + 1..],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":\"b\"}\n```"), "{\"a\":\"b\"}\n");
        assert_eq!(strip_code_fence("plain\ntext"), "plain\ntext");
        assert_eq!(strip_code_fence("```\nx\ny\n```").trim_end(), "x\ny");
    }

    #[test]
    fn test_factory_kinds() {
        assert_eq!(StrategyFactory::create(StrategyKind::Structured).kind(), StrategyKind::Structured);
        assert_eq!(StrategyFactory::create(StrategyKind::PlainText).kind(), StrategyKind::PlainText);
    }
}

use serde_json::{Map, Value, json};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::StrategyKind;
use crate::error::{Result, LocaflowError};
use crate::table::LocalizationTable;
use super::{ContentStrategy, Reconciliation, strip_code_fence};

/// Sends `{key: source text}` as one JSON object and assigns the reply by key.
pub struct StructuredStrategy;

impl StructuredStrategy {
    fn parse_reply(reply: &str) -> Result<Map<String, Value>> {
        let body = strip_code_fence(reply).trim();

        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(first) => {
                // Models sometimes wrap the object in prose; retry on the outermost braces.
                let slice = match (body.find('{'), body.rfind('}')) {
                    (Some(start), Some(end)) if start < end => &body[start..=end],
                    _ => body,
                };
                serde_json::from_str(slice).map_err(|_| {
                    LocaflowError::ChatProtocol(format!("structured reply is not valid JSON: {}", first))
                })?
            }
        };

        match value {
            Value::Object(map) => Ok(map),
            other => Err(LocaflowError::ChatProtocol(format!(
                "structured reply is not a JSON object: {}",
                other
            ))),
        }
    }

    /// Unwrap `{"translations": {...}}`-style envelopes when no top-level key is a row key.
    fn unwrap_single_wrapper(mut map: Map<String, Value>, table: &LocalizationTable) -> Map<String, Value> {
        let wrapper = match map.iter().next() {
            Some((key, Value::Object(_))) if map.len() == 1 && table.get(key).is_none() => Some(key.clone()),
            _ => None,
        };
        if let Some(key) = wrapper {
            debug!("Unwrapping structured reply from '{}'", key);
            if let Some(Value::Object(inner)) = map.remove(&key) {
                return inner;
            }
        }
        map
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ContentStrategy for StructuredStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structured
    }

    fn reply_instructions(&self, row_count: usize) -> String {
        format!(
            "\n## Reply format\n\
             You receive one JSON object with {} entries mapping an identifier to source text.\n\
             Reply with one JSON object that has exactly the same keys, each value replaced by its translation.\n\
             Do not add, remove or rename keys. Reply with the JSON object only.\n",
            row_count
        )
    }

    fn format_hint(&self) -> Option<Value> {
        Some(json!("json"))
    }

    fn build_message(&self, table: &LocalizationTable, source_language: &str) -> Result<String> {
        let mut map = Map::new();
        for row in table.rows() {
            let text = row.text(source_language).unwrap_or_default();
            map.insert(row.key.clone(), Value::String(text.to_string()));
        }
        Ok(serde_json::to_string_pretty(&Value::Object(map))?)
    }

    fn reconcile(
        &self,
        reply: &str,
        table: &LocalizationTable,
        _source_language: &str,
        target_language: &str,
    ) -> Result<Reconciliation> {
        let map = Self::unwrap_single_wrapper(Self::parse_reply(reply)?, table);

        let mut assignments = Vec::with_capacity(table.len());
        let mut missing = Vec::new();
        for (idx, row) in table.rows().iter().enumerate() {
            match map.get(&row.key).and_then(text_value) {
                Some(text) => assignments.push((idx, text)),
                None => missing.push(row.key.clone()),
            }
        }

        let known: HashSet<&str> = table.rows().iter().map(|r| r.key.as_str()).collect();
        let unexpected: Vec<String> = map
            .keys()
            .filter(|k| !known.contains(k.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            return Ok(Reconciliation::complete(assignments));
        }

        warn!(
            "Structured reply for {} missed {} key(s) and added {} unknown key(s)",
            target_language,
            missing.len(),
            unexpected.len()
        );
        Ok(Reconciliation {
            assignments,
            gap: Some(LocaflowError::AlignmentGap {
                language: target_language.to_string(),
                missing,
                unexpected,
            }),
        })
    }
}

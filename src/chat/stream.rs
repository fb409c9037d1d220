use tracing::{debug, warn};

use crate::error::{Result, LocaflowError};
use crate::ollama::dto::ChatEnvelopeDto;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental content
    Delta(String),
    /// Terminal marker or final envelope
    Done,
}

/// Splits a streamed body into lines and decodes each partial envelope.
///
/// Lines may arrive split across network chunks; bytes are held until the
/// newline shows up so multi-byte characters are never cut. Undecodable lines
/// are skipped, but `max_failures` of them in a row fail the stream.
#[derive(Debug)]
pub struct StreamDecoder {
    pending: Vec<u8>,
    consecutive_failures: usize,
    max_failures: usize,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(max_failures: usize) -> Self {
        Self {
            pending: Vec::new(),
            consecutive_failures: 0,
            max_failures: max_failures.max(1),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes; returns the events of every completed line.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>> {
        let mut events = Vec::new();
        if self.finished {
            return Ok(events);
        }

        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            events.extend(self.decode_line(&line)?);
            if self.finished {
                self.pending.clear();
                break;
            }
        }
        Ok(events)
    }

    /// Decode whatever is left once the connection closed.
    pub fn finish(&mut self) -> Result<Vec<StreamEvent>> {
        if self.finished || self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let line = std::mem::take(&mut self.pending);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, raw: &[u8]) -> Result<Vec<StreamEvent>> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() || line.starts_with(':') || is_sse_field(line) {
            return Ok(Vec::new());
        }

        let payload = line.strip_prefix(DATA_PREFIX).map(str::trim).unwrap_or(line);
        if payload == DONE_MARKER {
            debug!("Stream terminal marker received");
            self.finished = true;
            return Ok(vec![StreamEvent::Done]);
        }

        let envelope = match serde_json::from_str::<ChatEnvelopeDto>(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Skipping undecodable stream chunk ({}/{}): {} ({})",
                    self.consecutive_failures, self.max_failures, payload, e
                );
                if self.consecutive_failures >= self.max_failures {
                    return Err(LocaflowError::ChatProtocol(format!(
                        "{} consecutive undecodable stream chunks, last: {}",
                        self.consecutive_failures, payload
                    )));
                }
                return Ok(Vec::new());
            }
        };
        self.consecutive_failures = 0;

        if let Some(message) = envelope.error_message() {
            return Err(LocaflowError::ChatProtocol(format!("service reported: {}", message)));
        }

        let mut events = Vec::new();
        if let Some(content) = envelope.content().filter(|c| !c.is_empty()) {
            events.push(StreamEvent::Delta(content.to_string()));
        }
        if envelope.done {
            self.finished = true;
            events.push(StreamEvent::Done);
        }
        Ok(events)
    }
}

fn is_sse_field(line: &str) -> bool {
    ["event:", "id:", "retry:"].iter().any(|p| line.starts_with(p))
}

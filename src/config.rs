use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, LocaflowError};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a professional game localization translator.\n\
\n\
## Task\n\
Translate the text sent to you.\n\
The source language is {source}, the target language is {target}.\n\
Keep the structure of the original text unchanged.\n\
Keep placeholders, markup tags and escape sequences exactly as they appear.\n";

fn default_probe_timeout_ms() -> u64 {
    1500
}

fn default_max_decode_failures() -> usize {
    3
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub translate: TranslateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Runtime binary, resolved through PATH when not absolute
    pub binary_path: String,
    /// Base URL of the inference service
    pub host: String,
    /// Chat endpoint path appended to `host`
    pub chat_path: String,
    /// Wire flavor of the chat endpoint; derived from `chat_path` when absent
    #[serde(default)]
    pub api: Option<ApiFlavor>,
    /// Deadline for the service to come up after `serve` was spawned
    pub startup_timeout_secs: u64,
    /// First readiness poll interval, doubled per retry
    pub poll_interval_ms: u64,
    /// Timeout for a single chat or model request
    pub request_timeout_secs: u64,
    /// Timeout for the liveness probe
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Consecutive undecodable stream chunks tolerated before giving up
    #[serde(default = "default_max_decode_failures")]
    pub max_decode_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiFlavor {
    /// OpenAI-compatible `/v1/chat/completions`
    OpenAi,
    /// Native `/api/chat`
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// How rows are packed into the request and matched back
    pub strategy: StrategyKind,
    /// What happens to the job when one target language fails
    pub failure_policy: FailurePolicy,
    /// Stream the reply (true) or wait for a single envelope
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// System prompt with `{source}` and `{target}` placeholders
    pub prompt_template: String,
    /// Preferred model; used instead of the default selection when installed
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Structured: key -> text JSON object, matched back by key
    Structured,
    /// PlainText: one line per row, matched back by position
    PlainText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failed language and continue with the next one
    Isolate,
    /// Stop the job at the first failed language
    Abort,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                binary_path: "ollama".to_string(),
                host: "http://localhost:11434".to_string(),
                chat_path: "/v1/chat/completions".to_string(),
                api: None,
                startup_timeout_secs: 20,
                poll_interval_ms: 250,
                request_timeout_secs: 600,
                probe_timeout_ms: default_probe_timeout_ms(),
                max_decode_failures: default_max_decode_failures(),
            },
            translate: TranslateConfig {
                strategy: StrategyKind::Structured,
                failure_policy: FailurePolicy::Isolate,
                stream: true,
                prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
                default_model: None,
            },
        }
    }
}

impl ServiceConfig {
    /// Wire flavor, falling back to the shape of the chat path
    pub fn api_flavor(&self) -> ApiFlavor {
        self.api.unwrap_or_else(|| {
            if self.chat_path.trim_end_matches('/').ends_with("/api/chat") {
                ApiFlavor::Ollama
            } else {
                ApiFlavor::OpenAi
            }
        })
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LocaflowError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| LocaflowError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LocaflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| LocaflowError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

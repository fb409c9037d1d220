use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocaflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Inference runtime not available: {0}")]
    ServiceUnavailable(String),

    #[error("Inference service at {host} unreachable after {waited_ms} ms")]
    ServiceUnreachable { host: String, waited_ms: u64 },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Row '{key}' has no source text for language '{language}'")]
    MissingSourceText { language: String, key: String },

    #[error("Failed to load model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Inference API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Chat protocol error: {0}")]
    ChatProtocol(String),

    #[error("Alignment error for '{language}': expected {expected} segments, got {actual}")]
    Alignment {
        language: String,
        expected: usize,
        actual: usize,
    },

    #[error("Alignment gap for '{language}': missing keys {missing:?}, unexpected keys {unexpected:?}")]
    AlignmentGap {
        language: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Translation job cancelled")]
    Cancelled,

    #[error("Duplicate row key: {0}")]
    DuplicateKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Parse error in {path} at line {line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LocaflowError>;

//! Wire shapes of the inference service endpoints.

use serde::{Deserialize, Serialize};

/// `GET /api/version`
#[derive(Debug, Clone, Deserialize)]
pub struct VersionDto {
    pub version: String,
}

/// `GET /v1/models`
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiModelListDto {
    #[serde(default)]
    pub data: Vec<OpenAiModelDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiModelDto {
    pub id: String,
}

/// `GET /api/ps`
#[derive(Debug, Clone, Deserialize)]
pub struct RunningModelListDto {
    #[serde(default)]
    pub models: Vec<RunningModelDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunningModelDto {
    pub name: String,
}

/// `POST /api/generate` without a prompt: loads, or with `keep_alive: 0` evicts
#[derive(Debug, Clone, Serialize)]
pub struct GenerateDto<'a> {
    pub model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResultDto {
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDto {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceDto {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: Option<ContentDto>,
    #[serde(default)]
    pub delta: Option<ContentDto>,
}

/// One chat reply envelope, either OpenAI-compatible (`choices`) or native (`message`).
/// Streamed chunks use the same shape with `delta` or partial `message` content.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatEnvelopeDto {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceDto>,
    #[serde(default)]
    pub message: Option<ContentDto>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ChatEnvelopeDto {
    /// Content carried by this envelope, if any
    pub fn content(&self) -> Option<&str> {
        let from_choice = self.choices.first().and_then(|choice| {
            choice
                .delta
                .as_ref()
                .and_then(|d| d.content.as_deref())
                .or_else(|| choice.message.as_ref().and_then(|m| m.content.as_deref()))
        });
        from_choice.or_else(|| self.message.as_ref().and_then(|m| m.content.as_deref()))
    }

    /// Error reported by the service inside a 2xx body
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string()),
            other => other.to_string(),
        })
    }
}

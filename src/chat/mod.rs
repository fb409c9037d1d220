// Chat requests against the inference service
//
// - ChatBackend: the seam the translation workflow talks to
// - ChatClient: HTTP implementation, single-envelope or streamed
// - stream: line decoder for streamed partial envelopes

pub mod stream;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::cancel::{CancellationToken, is_cancelled};
use crate::config::{ApiFlavor, ServiceConfig};
use crate::error::{Result, LocaflowError};
use crate::ollama::dto::ChatEnvelopeDto;
use crate::ollama::{OllamaApi, check_status};
pub use stream::{StreamDecoder, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Base64 images for multimodal models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self { role: ChatRole::System, content: content.into(), images: None }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self { role: ChatRole::User, content: content.into(), images: None }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self { role: ChatRole::Assistant, content: content.into(), images: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Single,
    Streaming,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub mode: ResponseMode,
    /// Structured-response hint: `"json"` or a JSON schema
    pub format: Option<Value>,
}

impl ChatRequest {
    pub fn new<S: Into<String>>(model: S, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            mode: ResponseMode::Streaming,
            format: None,
        }
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_format(mut self, format: Value) -> Self {
        self.format = Some(format);
        self
    }

    /// Request body in the given wire flavor
    pub fn to_body(&self, flavor: ApiFlavor) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
            "stream": self.mode == ResponseMode::Streaming,
        });
        if let Some(format) = &self.format {
            match flavor {
                ApiFlavor::Ollama => body["format"] = format.clone(),
                ApiFlavor::OpenAi => body["response_format"] = json!({ "type": "json_object" }),
            }
        }
        body
    }
}

/// Chat calls used by the translation workflow
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One round trip; returns the assistant text
    async fn send(&self, request: &ChatRequest) -> Result<String>;

    /// Streamed call. Each delta goes to `on_chunk`; the full text is returned
    /// once the stream ended.
    async fn stream(
        &self,
        request: &ChatRequest,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
        cancel: Option<&CancellationToken>,
    ) -> Result<String>;
}

pub struct ChatClient {
    api: OllamaApi,
    chat_path: String,
    flavor: ApiFlavor,
    max_decode_failures: usize,
}

impl ChatClient {
    pub fn new(api: OllamaApi, config: &ServiceConfig) -> Self {
        Self {
            api,
            chat_path: config.chat_path.clone(),
            flavor: config.api_flavor(),
            max_decode_failures: config.max_decode_failures,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(OllamaApi::new(config)?, config))
    }

    pub fn flavor(&self) -> ApiFlavor {
        self.flavor
    }

    async fn post(&self, request: &ChatRequest, mode: ResponseMode) -> Result<reqwest::Response> {
        let url = self.api.url(&self.chat_path);
        let body = ChatRequest { mode, ..request.clone() }.to_body(self.flavor);
        debug!("POST {} {}", url, body);

        let response = self
            .api
            .client()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LocaflowError::ChatProtocol(format!("request to {} failed: {}", url, e)))?;

        check_status(response).await.map_err(|e| LocaflowError::ChatProtocol(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn send(&self, request: &ChatRequest) -> Result<String> {
        let response = self.post(request, ResponseMode::Single).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LocaflowError::ChatProtocol(format!("failed to read reply: {}", e)))?;

        let envelope: ChatEnvelopeDto = serde_json::from_str(&text)
            .map_err(|e| LocaflowError::ChatProtocol(format!("undecodable reply: {} ({})", text, e)))?;
        if let Some(message) = envelope.error_message() {
            return Err(LocaflowError::ChatProtocol(format!("service reported: {}", message)));
        }

        envelope
            .content()
            .map(str::to_string)
            .ok_or_else(|| LocaflowError::ChatProtocol(format!("reply without message content: {}", text)))
    }

    async fn stream(
        &self,
        request: &ChatRequest,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let response = self.post(request, ResponseMode::Streaming).await?;
        let mut body = response.bytes_stream();
        let mut decoder = StreamDecoder::new(self.max_decode_failures);
        let mut text = String::new();

        let mut apply = |events: Vec<StreamEvent>, text: &mut String| {
            for event in events {
                if let StreamEvent::Delta(delta) = event {
                    on_chunk(&delta);
                    text.push_str(&delta);
                }
            }
        };

        while let Some(chunk) = body.next().await {
            if cancel.is_some_and(is_cancelled) {
                info!("Stream cancelled after {} characters", text.chars().count());
                return Err(LocaflowError::Cancelled);
            }
            let chunk = chunk.map_err(|e| LocaflowError::ChatProtocol(format!("stream read failed: {}", e)))?;
            apply(decoder.push(&chunk)?, &mut text);
            if decoder.is_finished() {
                break;
            }
        }

        // A closed connection without the terminal marker is a normal end.
        if !decoder.is_finished() {
            debug!("Stream closed without terminal marker");
            apply(decoder.finish()?, &mut text);
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest::new(
            "llama3.2:3b",
            vec![ChatMessage::system("translate"), ChatMessage::user("Hello")],
        )
    }

    #[test]
    fn test_body_without_format() {
        let body = request().to_body(ApiFlavor::OpenAi);
        assert_eq!(body["model"], "llama3.2:3b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert!(body["messages"][1].get("images").is_none());
        assert!(body.get("format").is_none());
    }

    #[test]
    fn test_format_hint_per_flavor() {
        let req = request().with_mode(ResponseMode::Single).with_format(json!("json"));

        let native = req.to_body(ApiFlavor::Ollama);
        assert_eq!(native["format"], "json");
        assert_eq!(native["stream"], false);

        let openai = req.to_body(ApiFlavor::OpenAi);
        assert_eq!(openai["response_format"]["type"], "json_object");
        assert!(openai.get("format").is_none());
    }
}

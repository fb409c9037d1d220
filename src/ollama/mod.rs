// HTTP access to the ollama service
//
// OllamaApi holds the shared reqwest client and knows the management
// endpoints (version, model lists, load/evict). Chat traffic lives in
// `crate::chat`, which borrows the same client.

pub mod dto;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::{Result, LocaflowError};
use crate::models::{ModelBackend, ModelDescriptor};
use dto::*;

#[derive(Clone)]
pub struct OllamaApi {
    client: Client,
    host: String,
    probe_timeout: Duration,
}

impl OllamaApi {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("locaflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            probe_timeout: config.probe_timeout(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.host, path)
        } else {
            format!("{}/{}", self.host, path)
        }
    }

    /// Version reported by the running service
    pub async fn version(&self) -> Result<String> {
        let response = self
            .client
            .get(self.url("/api/version"))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let version: VersionDto = check_status(response).await?.json().await?;
        Ok(version.version)
    }

    /// Installed models, in the order the service reports them
    pub async fn local_models(&self) -> Result<Vec<ModelDescriptor>> {
        let list: OpenAiModelListDto = self.get_json("/v1/models").await?;
        Ok(list.data.into_iter().map(|m| ModelDescriptor::new(m.id)).collect())
    }

    /// Models resident in service memory
    pub async fn running_models(&self) -> Result<Vec<ModelDescriptor>> {
        let list: RunningModelListDto = self.get_json("/api/ps").await?;
        Ok(list.models.into_iter().map(|m| ModelDescriptor::new(m.name)).collect())
    }

    pub async fn load_model(&self, name: &str) -> Result<bool> {
        let body = GenerateDto { model: name, keep_alive: None };
        let result: GenerateResultDto = self.post_json("/api/generate", &body).await?;
        Ok(result.done)
    }

    /// Evict by asking for zero retention
    pub async fn unload_model(&self, name: &str) -> Result<bool> {
        let body = GenerateDto { model: name, keep_alive: Some(0) };
        let result: GenerateResultDto = self.post_json("/api/generate", &body).await?;
        Ok(result.done)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Connection failures mean the service is not up; everything else stays an HTTP error.
    pub fn transport_error(&self, error: reqwest::Error) -> LocaflowError {
        if error.is_connect() {
            LocaflowError::ServiceUnreachable {
                host: self.host.clone(),
                waited_ms: 0,
            }
        } else {
            LocaflowError::Http(error)
        }
    }
}

/// Turn a non-2xx response into an API error carrying status and body
pub async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    Err(LocaflowError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ModelBackend for OllamaApi {
    async fn list_local(&self) -> Result<Vec<ModelDescriptor>> {
        self.local_models().await
    }

    async fn list_loaded(&self) -> Result<Vec<ModelDescriptor>> {
        self.running_models().await
    }

    async fn load(&self, name: &str) -> Result<bool> {
        self.load_model(name).await
    }

    async fn evict(&self, name: &str) -> Result<bool> {
        self.unload_model(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_url_joining() {
        let mut service = Config::default().service;
        service.host = "http://localhost:11434/".to_string();
        let api = OllamaApi::new(&service).unwrap();
        assert_eq!(api.url("/api/ps"), "http://localhost:11434/api/ps");
        assert_eq!(api.url("v1/models"), "http://localhost:11434/v1/models");
    }

    #[test]
    fn test_evict_body_has_zero_keep_alive() {
        let body = GenerateDto { model: "llama3.2:3b", keep_alive: Some(0) };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"model":"llama3.2:3b","keep_alive":0}"#
        );
        let load = GenerateDto { model: "llama3.2:3b", keep_alive: None };
        assert_eq!(serde_json::to_string(&load).unwrap(), r#"{"model":"llama3.2:3b"}"#);
    }
}

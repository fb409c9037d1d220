use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::{Result, LocaflowError};
use crate::ollama::OllamaApi;
use super::ServiceLifecycle;

/// The local ollama runtime: binary on PATH plus the HTTP service it serves.
pub struct OllamaProcess {
    binary_path: String,
    api: OllamaApi,
}

impl OllamaProcess {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            binary_path: config.binary_path.clone(),
            api: OllamaApi::new(config)?,
        })
    }
}

#[async_trait]
impl ServiceLifecycle for OllamaProcess {
    async fn is_available(&self) -> Option<String> {
        let output = match Command::new(&self.binary_path).arg("-v").output().await {
            Ok(output) => output,
            Err(e) => {
                debug!("{} -v failed: {}", self.binary_path, e);
                return None;
            }
        };

        // Without a running server the client prints its version as a warning on stderr.
        [&output.stdout, &output.stderr]
            .into_iter()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .find(|text| !text.is_empty())
    }

    async fn is_running(&self) -> bool {
        match self.api.version().await {
            Ok(version) => {
                debug!("Service answered with version {}", version);
                true
            }
            Err(e) => {
                debug!("Service probe failed: {}", e);
                false
            }
        }
    }

    async fn start(&self) -> Result<()> {
        let child = Command::new(&self.binary_path)
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LocaflowError::ServiceUnavailable(format!("failed to spawn '{} serve': {}", self.binary_path, e)))?;

        info!("Spawned '{} serve' (pid {:?})", self.binary_path, child.id());
        Ok(())
    }

    fn host(&self) -> String {
        self.api.host().to_string()
    }
}

// Inference runtime lifecycle
//
// The controller only talks to the runtime through the ServiceLifecycle
// capability, so the workflow can run against a fake service in tests:
// - ollama: the local ollama binary plus its HTTP liveness probe

pub mod ollama;

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use ollama::OllamaProcess;
use crate::config::ServiceConfig;
use crate::error::{Result, LocaflowError};

/// Upper bound for the readiness poll interval
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Capability interface over the local inference runtime
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Version string reported by the runtime binary, `None` when it is not installed
    async fn is_available(&self) -> Option<String>;

    /// Whether the service currently answers on its host
    async fn is_running(&self) -> bool;

    /// Launch the service in the background without waiting for it
    async fn start(&self) -> Result<()>;

    /// Base URL used in diagnostics
    fn host(&self) -> String;
}

/// Detects and starts the inference service.
pub struct ServiceController {
    lifecycle: Box<dyn ServiceLifecycle>,
    startup_timeout: Duration,
    poll_interval: Duration,
}

impl ServiceController {
    pub fn new(lifecycle: Box<dyn ServiceLifecycle>, startup_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            lifecycle,
            startup_timeout,
            poll_interval,
        }
    }

    /// Controller for the ollama runtime described by `config`
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let process = OllamaProcess::new(config)?;
        Ok(Self::new(Box::new(process), config.startup_timeout(), config.poll_interval()))
    }

    pub async fn detect_running(&self) -> bool {
        self.lifecycle.is_running().await
    }

    /// No-op when the service already runs. Otherwise probe the binary, spawn
    /// `serve` and poll with backoff until the service answers or the deadline passes.
    pub async fn ensure_started(&self) -> Result<()> {
        if self.detect_running().await {
            debug!("Inference service already running at {}", self.lifecycle.host());
            return Ok(());
        }

        let version = self.lifecycle.is_available().await.ok_or_else(|| {
            LocaflowError::ServiceUnavailable(
                "runtime binary did not report a version; is it installed and on PATH?".to_string(),
            )
        })?;
        info!("Starting inference service ({})", version);

        self.lifecycle.start().await?;

        let started = Instant::now();
        let mut interval = self.poll_interval;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self.detect_running().await {
                info!("Inference service is up after {} probe(s)", attempts);
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= self.startup_timeout {
                warn!("Inference service did not come up within {:?}", self.startup_timeout);
                return Err(LocaflowError::ServiceUnreachable {
                    host: self.lifecycle.host(),
                    waited_ms: elapsed.as_millis() as u64,
                });
            }

            let remaining = self.startup_timeout - elapsed;
            tokio::time::sleep(interval.min(remaining)).await;
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
        }
    }

    pub fn lifecycle(&self) -> &dyn ServiceLifecycle {
        self.lifecycle.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn controller(mock: MockServiceLifecycle) -> ServiceController {
        ServiceController::new(Box::new(mock), Duration::from_millis(200), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_already_running_is_noop() {
        let mut mock = MockServiceLifecycle::new();
        mock.expect_is_running().times(1).returning(|| true);
        mock.expect_is_available().never();
        mock.expect_start().never();
        mock.expect_host().returning(|| "http://localhost:11434".to_string());

        assert!(controller(mock).ensure_started().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let mut mock = MockServiceLifecycle::new();
        mock.expect_is_running().returning(|| false);
        mock.expect_is_available().times(1).returning(|| None);
        mock.expect_start().never();
        mock.expect_host().returning(|| "http://localhost:11434".to_string());

        let err = controller(mock).ensure_started().await.unwrap_err();
        assert!(matches!(err, LocaflowError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_polls_until_service_answers() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = probes.clone();

        let mut mock = MockServiceLifecycle::new();
        // First probe before start, then two failed polls, then up.
        mock.expect_is_running()
            .returning(move || counter.fetch_add(1, Ordering::SeqCst) >= 3);
        mock.expect_is_available().returning(|| Some("ollama version is 0.5.7".to_string()));
        mock.expect_start().times(1).returning(|| Ok(()));
        mock.expect_host().returning(|| "http://localhost:11434".to_string());

        assert!(controller(mock).ensure_started().await.is_ok());
        assert_eq!(probes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_deadline_gives_unreachable() {
        let mut mock = MockServiceLifecycle::new();
        mock.expect_is_running().returning(|| false);
        mock.expect_is_available().returning(|| Some("0.5.7".to_string()));
        mock.expect_start().times(1).returning(|| Ok(()));
        mock.expect_host().returning(|| "http://localhost:11434".to_string());

        let err = controller(mock).ensure_started().await.unwrap_err();
        match err {
            LocaflowError::ServiceUnreachable { host, waited_ms } => {
                assert_eq!(host, "http://localhost:11434");
                assert!(waited_ms >= 200);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

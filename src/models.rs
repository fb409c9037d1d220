//! Installed vs. resident models and the single-active-model policy.
//!
//! The service keeps at most one model resident on our behalf. [`ModelRegistry::set_active`]
//! evicts every other resident model before loading the requested one, and it is the
//! only place that issues load or evict calls.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Result, LocaflowError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelDescriptor {
    pub name: String,
}

impl ModelDescriptor {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Model management calls of the inference service
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// All installed models, in host-reported order
    async fn list_local(&self) -> Result<Vec<ModelDescriptor>>;

    /// Models currently resident in memory
    async fn list_loaded(&self) -> Result<Vec<ModelDescriptor>>;

    /// Load a model; `Ok(false)` means the service did not finish loading it
    async fn load(&self, name: &str) -> Result<bool>;

    /// Unload a model with zero retention
    async fn evict(&self, name: &str) -> Result<bool>;
}

/// Startup choice: first resident model, else first installed model, else nothing.
pub fn default_selection(loaded: &[ModelDescriptor], local: &[ModelDescriptor]) -> Option<String> {
    loaded
        .first()
        .or_else(|| local.first())
        .map(|m| m.name.clone())
}

pub struct ModelRegistry {
    backend: Arc<dyn ModelBackend>,
    active: Option<String>,
}

impl ModelRegistry {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend, active: None }
    }

    pub async fn list_local(&self) -> Result<Vec<ModelDescriptor>> {
        self.backend.list_local().await
    }

    pub async fn list_loaded(&self) -> Result<Vec<ModelDescriptor>> {
        self.backend.list_loaded().await
    }

    /// Name of the model made active by the last successful [`set_active`](Self::set_active)
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Evict every other resident model, then load `name`. On failure no model is active.
    pub async fn set_active(&mut self, name: &str) -> Result<()> {
        self.active = None;
        let model_error = |reason: String| LocaflowError::ModelLoad {
            model: name.to_string(),
            reason,
        };

        let loaded = self
            .backend
            .list_loaded()
            .await
            .map_err(|e| model_error(format!("listing resident models failed: {}", e)))?;

        for other in loaded.iter().filter(|m| m.name != name) {
            info!("Evicting resident model {}", other);
            match self.backend.evict(&other.name).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(model_error(format!("service did not confirm eviction of '{}'", other)));
                }
                Err(e) => return Err(model_error(format!("evicting '{}' failed: {}", other, e))),
            }
        }

        info!("Loading model {}", name);
        match self.backend.load(name).await {
            Ok(true) => {
                self.active = Some(name.to_string());
                info!("Model {} is active", name);
                Ok(())
            }
            Ok(false) => Err(model_error("service did not confirm the load".to_string())),
            Err(e) => Err(model_error(e.to_string())),
        }
    }

    /// Apply the startup selection. A configured preference wins when it is installed.
    pub async fn select_default(&mut self, preferred: Option<&str>) -> Result<Option<String>> {
        let local = self.list_local().await?;
        let loaded = self.list_loaded().await?;

        let choice = match preferred {
            Some(name) if local.iter().any(|m| m.name == name) => Some(name.to_string()),
            Some(name) => {
                warn!("Configured model '{}' is not installed, using default selection", name);
                default_selection(&loaded, &local)
            }
            None => default_selection(&loaded, &local),
        };

        match &choice {
            Some(name) => self.set_active(name).await?,
            None => warn!("No models installed; translation stays blocked until one is pulled"),
        }
        Ok(choice)
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeModelService;
    use super::*;

    fn names(models: &[ModelDescriptor]) -> Vec<&str> {
        models.iter().map(|m| m.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_set_active_evicts_previous_model() {
        let service = Arc::new(FakeModelService::new(&["a", "b"], &["a"]));
        let mut registry = ModelRegistry::new(service.clone());

        registry.set_active("b").await.unwrap();

        let loaded = registry.list_loaded().await.unwrap();
        assert_eq!(names(&loaded), vec!["b"]);
        assert_eq!(registry.active(), Some("b"));
        assert_eq!(*service.calls.lock().unwrap(), vec!["evict a", "load b"]);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_no_active_model() {
        let mut fake = FakeModelService::new(&["a", "b"], &["a"]);
        fake.fail_load = true;
        let mut registry = ModelRegistry::new(Arc::new(fake));
        registry.set_active("a").await.unwrap_err();

        let err = registry.set_active("b").await.unwrap_err();
        assert!(matches!(err, LocaflowError::ModelLoad { ref model, .. } if model == "b"));
        assert_eq!(registry.active(), None);
    }

    #[test]
    fn test_default_selection_rules() {
        let a = ModelDescriptor::new("a");
        let b = ModelDescriptor::new("b");
        assert_eq!(default_selection(&[b.clone()], &[a.clone(), b.clone()]).as_deref(), Some("b"));
        assert_eq!(default_selection(&[], &[a.clone(), b]).as_deref(), Some("a"));
        assert_eq!(default_selection(&[], &[]), None);
    }

    #[tokio::test]
    async fn test_select_default_prefers_configured_model() {
        let service = Arc::new(FakeModelService::new(&["a", "b"], &[]));
        let mut registry = ModelRegistry::new(service);

        let chosen = registry.select_default(Some("b")).await.unwrap();
        assert_eq!(chosen.as_deref(), Some("b"));

        let chosen = registry.select_default(Some("missing")).await.unwrap();
        assert_eq!(chosen.as_deref(), Some("b"));
        assert_eq!(registry.active(), Some("b"));
    }

    #[tokio::test]
    async fn test_select_default_with_nothing_installed() {
        let mut registry = ModelRegistry::new(Arc::new(FakeModelService::new(&[], &[])));
        assert_eq!(registry.select_default(None).await.unwrap(), None);
        assert_eq!(registry.active(), None);
    }
}

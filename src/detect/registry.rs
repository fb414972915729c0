use anyhow::{anyhow, Result};

use super::backend::ClassifierBackend;
#[cfg(feature = "backend-remote")]
use super::backends::RemoteBackend;
use super::backends::SyntheticBackend;
#[cfg(feature = "backend-tract")]
use super::backends::TractBackend;
use crate::config::{BackendKind, SentinelConfig};

type Factory = Box<dyn Fn() -> Result<Box<dyn ClassifierBackend>> + Send + Sync>;

/// Registry of classifier backend factories.
///
/// The pipeline owns exactly one backend instance at a time; the registry only
/// builds fresh instances when a session starts or the backend is swapped.
pub struct BackendRegistry {
    factories: Vec<(String, Factory)>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            default_name: None,
        }
    }

    /// Register a factory. The first registered backend becomes the default.
    /// Registering an existing name replaces its factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn ClassifierBackend>> + Send + Sync + 'static,
    {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        let factory: Factory = Box::new(factory);
        match self.factories.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((name.to_string(), factory)),
        }
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends in registration order.
    pub fn list(&self) -> Vec<String> {
        self.factories.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Build a fresh backend by name.
    pub fn build(&self, name: &str) -> Result<Box<dyn ClassifierBackend>> {
        let (_, factory) = self
            .factories
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        factory()
    }

    /// Build the default backend.
    pub fn build_default(&self) -> Result<Box<dyn ClassifierBackend>> {
        let name = self
            .default_name
            .as_deref()
            .ok_or_else(|| anyhow!("no backend registered"))?;
        self.build(name)
    }
}

impl BackendRegistry {
    /// Registry for a configured deployment: the configured backend as the
    /// default, plus the synthetic backend as a fallback swap target.
    pub fn from_settings(cfg: &SentinelConfig) -> Result<Self> {
        let mut registry = Self::new();
        match cfg.backend.kind {
            BackendKind::Synthetic => {}
            BackendKind::Local => register_local(&mut registry, cfg)?,
            BackendKind::Remote => register_remote(&mut registry, cfg)?,
        }
        let synthetic = cfg.synthetic_config();
        registry.register(BackendKind::Synthetic.id(), move || {
            Ok(Box::new(SyntheticBackend::new(synthetic.clone())))
        });
        Ok(registry)
    }
}

#[cfg(feature = "backend-tract")]
fn register_local(registry: &mut BackendRegistry, cfg: &SentinelConfig) -> Result<()> {
    let model = cfg.local_model_config()?;
    registry.register(BackendKind::Local.id(), move || {
        Ok(Box::new(TractBackend::new(model.clone())))
    });
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_local(_registry: &mut BackendRegistry, _cfg: &SentinelConfig) -> Result<()> {
    Err(anyhow!("local backend requires the backend-tract feature"))
}

#[cfg(feature = "backend-remote")]
fn register_remote(registry: &mut BackendRegistry, cfg: &SentinelConfig) -> Result<()> {
    let remote = cfg.remote_config()?;
    registry.register(BackendKind::Remote.id(), move || {
        Ok(Box::new(RemoteBackend::new(remote.clone())))
    });
    Ok(())
}

#[cfg(not(feature = "backend-remote"))]
fn register_remote(_registry: &mut BackendRegistry, _cfg: &SentinelConfig) -> Result<()> {
    Err(anyhow!("remote backend requires the backend-remote feature"))
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::SyntheticBackend;

    fn synthetic() -> Result<Box<dyn ClassifierBackend>> {
        Ok(Box::new(SyntheticBackend::default()))
    }

    #[test]
    fn first_registered_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register("synthetic", synthetic);
        registry.register("other", || Err(anyhow!("unavailable")));
        assert_eq!(registry.default_name(), Some("synthetic"));
        assert_eq!(registry.build_default().unwrap().name(), "synthetic");
        assert_eq!(registry.list(), vec!["synthetic", "other"]);
    }

    #[test]
    fn unknown_names_are_errors() {
        let mut registry = BackendRegistry::new();
        assert!(registry.build_default().is_err());
        registry.register("synthetic", synthetic);
        assert!(registry.set_default("tract").is_err());
        assert!(registry.build("tract").is_err());
    }

    #[test]
    fn default_settings_register_synthetic() {
        let cfg = SentinelConfig::default();
        let registry = BackendRegistry::from_settings(&cfg).unwrap();
        assert_eq!(registry.list(), vec!["synthetic"]);
        assert_eq!(registry.build_default().unwrap().name(), "synthetic");
    }

    #[test]
    fn factory_errors_surface_on_build() {
        let mut registry = BackendRegistry::new();
        registry.register("broken", || Err(anyhow!("no model")));
        let err = registry.build("broken").err().unwrap();
        assert!(err.to_string().contains("no model"));
    }
}

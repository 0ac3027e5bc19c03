use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};

use crate::config::ClassifierSettings;

use super::backend::ClassifierBackend;
use super::backends::StubBackend;

type BackendFactory =
    Box<dyn Fn(&ClassifierSettings) -> Result<Box<dyn ClassifierBackend>> + Send + Sync>;

/// Registry of classifier backend constructors.
///
/// Backends are built once at startup and handed to the invoker by value.
/// Construction failure is returned to the caller, which decides whether to
/// abort or fall back.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            default_name: None,
        }
    }

    /// Registry with the backends compiled into this build.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("stub", |settings| {
            let backend = StubBackend::new().with_top_k(settings.top_k);
            Ok(Box::new(backend) as Box<dyn ClassifierBackend>)
        });
        #[cfg(feature = "backend-tract")]
        registry.register("tract", |settings| {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract backend requires classifier.model_path"))?;
            let labels_path = settings
                .labels_path
                .clone()
                .unwrap_or_else(|| model_path.with_extension("labels.txt"));
            let backend = super::backends::TractBackend::new(
                model_path,
                labels_path,
                settings.input_width,
                settings.input_height,
            )?
            .with_top_k(settings.top_k);
            Ok(Box::new(backend) as Box<dyn ClassifierBackend>)
        });
        registry
    }

    /// Register a constructor. The first registered backend becomes the default.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ClassifierSettings) -> Result<Box<dyn ClassifierBackend>> + Send + Sync + 'static,
    {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.factories.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct the named backend.
    pub fn build(
        &self,
        name: &str,
        settings: &ClassifierSettings,
    ) -> Result<Box<dyn ClassifierBackend>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "backend '{}' not registered (available: {:?})",
                name,
                self.list()
            )
        })?;
        factory(settings)
    }

    /// Construct and warm up the backend named in `settings` (or the default
    /// when empty).
    ///
    /// A backend that fails to construct or to warm up counts as unavailable.
    /// When `settings.fallback_to_stub` is set, the stub backend is returned
    /// instead and the failure is logged.
    pub fn build_configured(
        &self,
        settings: &ClassifierSettings,
    ) -> Result<Box<dyn ClassifierBackend>> {
        let name = if settings.backend.trim().is_empty() {
            self.default_name
                .clone()
                .ok_or_else(|| anyhow!("no classifier backends registered"))?
        } else {
            settings.backend.clone()
        };

        let built = self.build(&name, settings).and_then(|mut backend| {
            backend.warm_up().context("warm-up failed")?;
            Ok(backend)
        });
        match built {
            Ok(backend) => {
                log::info!(
                    "classifier backend '{}' ready (compute_units={:?})",
                    backend.name(),
                    settings.compute_units
                );
                Ok(backend)
            }
            Err(e) if settings.fallback_to_stub && name != "stub" => {
                log::warn!("classifier backend '{}' unavailable: {:#}; using stub", name, e);
                self.build("stub", settings)
            }
            Err(e) => {
                Err(e.context(format!("failed to construct classifier backend '{}'", name)))
            }
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

//! PluginRegistry: name -> Plugin lookup with late binding.
//!
//! The upstream system this core is adapted from resolves plugins at
//! runtime by opening a compiled artifact and looking up a native symbol.
//! Per the re-architecture guidance, plugins are instead exposed as a
//! trait object behind a name-keyed registry of statically linked
//! implementations: a worker fetches a plugin's descriptor from the
//! orchestrator, then resolves it to a concrete `Arc<dyn Plugin>` through a
//! factory registered at process startup. The wire artifact never needs to
//! be a loadable binary; it only needs to name which statically linked
//! implementation to bind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

use crate::pipeline::PipelineContext;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("execution failed: {0}")]
    Execution(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The polymorphic capability every plugin implements.
///
/// The engine holds a short-lived `Arc<dyn Plugin>` reference during a
/// single step's execution and never stores it past that step, matching
/// the re-architecture guidance to avoid cyclic references between
/// pipeline, plugin, and context.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn plugin_name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn input_schema(&self) -> Value;
    fn validate_config(&self, config: &Value) -> Result<(), PluginError>;

    async fn execute(
        &self,
        action: &str,
        parameters: &HashMap<String, Value>,
        context: &PipelineContext,
    ) -> Result<HashMap<String, Value>, PluginError>;
}

type PluginFactory = Arc<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

/// Name-keyed registry. `factories` holds statically linked implementations
/// known at compile time; `loaded` caches instances already bound for the
/// lifetime of one worker process.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: Arc<DashMap<String, PluginFactory>>,
    loaded: Arc<DashMap<String, Arc<dyn Plugin>>>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown plugin: {0}")]
    Unknown(String),
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a statically linked plugin implementation under `name`.
    /// Called at process startup for built-ins; a worker binary may also
    /// register vendored plugin implementations it ships with.
    pub fn register_static<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Late-binds `name`: if already loaded for this process, returns the
    /// cached instance; otherwise instantiates it from a registered static
    /// factory. Missing or load-failed plugins return `RegistryError`,
    /// which the engine turns into a step failure for any step referencing
    /// them.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Plugin>, RegistryError> {
        if let Some(plugin) = self.loaded.get(name) {
            return Ok(plugin.clone());
        }
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        let instance = factory();
        self.loaded.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaded.contains_key(name) || self.factories.contains_key(name)
    }
}

use std::sync::Arc;

use orchestrator_core::{MetadataStore, PluginRegistry, Queue};

/// Shared application state threaded through every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
    pub queue: Arc<Queue>,
    pub plugins: PluginRegistry,
}

impl AppState {
    pub fn new(store: Arc<dyn MetadataStore>, queue: Arc<Queue>, plugins: PluginRegistry) -> Self {
        Self { store, queue, plugins }
    }
}

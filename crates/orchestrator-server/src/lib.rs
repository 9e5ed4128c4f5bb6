// Orchestrator Server Library
// Decision: shared library for the HTTP binary and any future admin tooling.

pub mod config;
pub mod routes;
pub mod state;

pub use config::OrchestratorConfig;
pub use state::AppState;

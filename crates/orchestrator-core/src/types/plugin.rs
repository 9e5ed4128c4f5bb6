use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a plugin registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    Registered,
    Compiled,
    Failed,
}

/// Metadata for one plugin registry entry. The compiled artifact itself
/// (bytes) is stored separately by the MetadataStore and fetched through
/// `GetPluginBinary`; `PluginRecord` is the row that describes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PluginRecord {
    pub name: String,
    pub version: String,
    pub source_reference: String,
    pub artifact_path: Option<String>,
    pub declared_actions: Vec<String>,
    pub input_schema: Value,
    pub status: PluginStatus,
}

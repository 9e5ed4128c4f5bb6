use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Pending,
    Training,
    Trained,
    Failed,
}

/// One point on a training or validation curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TrainingCurvePoint {
    pub epoch: u32,
    pub loss: f64,
    pub accuracy: f64,
}

/// Performance and training-curve metrics recorded for a trained model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TrainingMetrics {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    #[serde(default)]
    pub training_curve: Vec<TrainingCurvePoint>,
    #[serde(default)]
    pub validation_curve: Vec<TrainingCurvePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MlModel {
    pub id: String,
    pub ontology_id: String,
    pub model_type: String,
    pub training_config: Value,
    pub status: ModelStatus,
    pub artifact_location: Option<String>,
    pub metrics: Option<TrainingMetrics>,
}

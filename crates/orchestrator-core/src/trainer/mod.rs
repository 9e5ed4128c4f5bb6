//! TrainerFactory: dispatch point selecting an ML training strategy by
//! model type. Algorithm contracts belong to each trainer; the factory's
//! job is selection only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::{TrainingCurvePoint, TrainingMetrics};

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("training failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub metrics: TrainingMetrics,
    pub model_data: Vec<u8>,
    pub feature_importances: HashMap<String, f64>,
}

/// A single ML training strategy for one model type.
#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(&self, data: &Value, config: &Value) -> Result<TrainingResult, TrainerError>;
}

type TrainerFactoryFn = Arc<dyn Fn() -> Arc<dyn Trainer> + Send + Sync>;

/// Enumerates supported model types and returns a `Trainer` for one.
/// Unknown types fail with `UnsupportedModelType`; callers (a worker
/// running an `ml-training` task) surface that as task failure.
#[derive(Clone, Default)]
pub struct TrainerFactory {
    trainers: std::collections::HashMap<String, TrainerFactoryFn>,
}

impl TrainerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, model_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Trainer> + Send + Sync + 'static,
    {
        self.trainers.insert(model_type.into(), Arc::new(factory));
    }

    pub fn for_model_type(&self, model_type: &str) -> Result<Arc<dyn Trainer>, TrainerError> {
        self.trainers
            .get(model_type)
            .map(|factory| factory())
            .ok_or_else(|| TrainerError::Failed(format!("unsupported model type: {model_type}")))
    }
}

/// A trainer that always fails; useful as a placeholder registration for
/// model types whose real algorithm lives in an external collaborator this
/// crate doesn't implement.
pub struct UnimplementedTrainer;

#[async_trait]
impl Trainer for UnimplementedTrainer {
    async fn train(&self, _data: &Value, _config: &Value) -> Result<TrainingResult, TrainerError> {
        Err(TrainerError::Failed("trainer not implemented".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTrainer;

    #[async_trait]
    impl Trainer for StubTrainer {
        async fn train(&self, _data: &Value, _config: &Value) -> Result<TrainingResult, TrainerError> {
            Ok(TrainingResult {
                metrics: TrainingMetrics {
                    accuracy: Some(0.9),
                    training_curve: vec![TrainingCurvePoint {
                        epoch: 1,
                        loss: 0.1,
                        accuracy: 0.9,
                    }],
                    ..Default::default()
                },
                model_data: vec![1, 2, 3],
                feature_importances: HashMap::new(),
            })
        }
    }

    #[tokio::test]
    async fn dispatches_to_the_registered_trainer() {
        let mut factory = TrainerFactory::new();
        factory.register("classification", || Arc::new(StubTrainer));

        let trainer = factory.for_model_type("classification").unwrap();
        let result = trainer.train(&Value::Null, &Value::Null).await.unwrap();
        assert_eq!(result.metrics.accuracy, Some(0.9));
    }

    #[tokio::test]
    async fn unknown_model_type_fails() {
        let factory = TrainerFactory::new();
        assert!(factory.for_model_type("unknown").is_err());
    }
}

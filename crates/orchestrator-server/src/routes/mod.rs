pub mod digitaltwins;
pub mod error;
pub mod health;
pub mod mlmodels;
pub mod pipelines;
pub mod plugins;
pub mod worktasks;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(worktasks::routes(state.clone()))
        .merge(pipelines::routes(state.clone()))
        .merge(mlmodels::routes(state.clone()))
        .merge(digitaltwins::routes(state.clone()))
        .merge(plugins::routes(state))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        worktasks::get_work_task,
        worktasks::post_work_task_status,
        pipelines::get_pipeline,
        mlmodels::get_ml_model,
        mlmodels::training_complete,
        mlmodels::training_fail,
        digitaltwins::get_digital_twin,
        plugins::get_plugin_artifact,
    ),
    components(schemas(
        health::HealthResponse,
        orchestrator_core::WorkTask,
        orchestrator_core::TaskSpec,
        orchestrator_core::TaskStatus,
        orchestrator_core::TaskType,
        orchestrator_core::Pipeline,
        orchestrator_core::Step,
        orchestrator_core::MlModel,
        orchestrator_core::ModelStatus,
        orchestrator_core::TrainingMetrics,
        orchestrator_core::TrainingCurvePoint,
        orchestrator_core::DigitalTwin,
        orchestrator_core::TwinEntity,
        worktasks::WorkTaskStatusUpdate,
        mlmodels::TrainingComplete,
        mlmodels::TrainingFail,
    )),
    tags(
        (name = "worktasks", description = "WorkTask reconciliation"),
        (name = "pipelines", description = "Pipeline reads"),
        (name = "mlmodels", description = "ML model reads and training reconciliation"),
        (name = "digitaltwins", description = "Digital twin reads"),
        (name = "plugins", description = "Plugin artifact distribution"),
        (name = "health", description = "Liveness probe"),
    )
)]
pub struct ApiDoc;

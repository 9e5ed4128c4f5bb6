use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cron trigger bound to a pipeline.
///
/// Invariant: while `enabled`, `next_run` is always the smallest instant
/// strictly greater than `last_run` (or the creation time, before any run)
/// satisfying `cron_expression`. Disabled schedules retain `next_run` for
/// display but the Scheduler never fires them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Schedule {
    pub id: String,
    pub project_id: String,
    pub pipeline_id: String,
    pub cron_expression: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
}

//! In-memory MetadataStore used by tests and the in-process scheduler/
//! spawner test doubles. Never busy: `StoreError::Busy` is unreachable from
//! this implementation, which exercises the rest of the stack without the
//! busy-retry path.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{ListFilter, MetadataStore, StoreError};
use crate::types::{DigitalTwin, MlModel, Pipeline, PluginRecord, PluginStatus, Schedule, WorkTask};

#[derive(Default)]
pub struct InMemoryMetadataStore {
    work_tasks: RwLock<HashMap<String, WorkTask>>,
    pipelines: RwLock<HashMap<String, Pipeline>>,
    schedules: RwLock<HashMap<String, Schedule>>,
    plugins: RwLock<HashMap<String, (PluginRecord, Option<Vec<u8>>)>>,
    ml_models: RwLock<HashMap<String, MlModel>>,
    digital_twins: RwLock<HashMap<String, DigitalTwin>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! impl_crud {
    ($save:ident, $get:ident, $list:ident, $delete:ident, $field:ident, $ty:ty, $project_id:expr) => {
        async fn $save(&self, entity: &$ty) -> Result<(), StoreError> {
            self.$field
                .write()
                .insert(entity.id.clone(), entity.clone());
            Ok(())
        }

        async fn $get(&self, id: &str) -> Result<$ty, StoreError> {
            self.$field
                .read()
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        }

        async fn $list(&self, filter: ListFilter) -> Result<Vec<$ty>, StoreError> {
            let get_project_id: fn(&$ty) -> &str = $project_id;
            Ok(self
                .$field
                .read()
                .values()
                .filter(|entity| {
                    filter
                        .project_id
                        .as_deref()
                        .map(|p| get_project_id(entity) == p)
                        .unwrap_or(true)
                })
                .cloned()
                .collect())
        }

        async fn $delete(&self, id: &str) -> Result<(), StoreError> {
            self.$field.write().remove(id);
            Ok(())
        }
    };
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    impl_crud!(
        save_work_task,
        get_work_task,
        list_work_tasks,
        delete_work_task,
        work_tasks,
        WorkTask,
        |t| t.project_id.as_str()
    );

    impl_crud!(
        save_pipeline,
        get_pipeline,
        list_pipelines,
        delete_pipeline,
        pipelines,
        Pipeline,
        |_p| ""
    );

    impl_crud!(
        save_schedule,
        get_schedule,
        list_schedules,
        delete_schedule,
        schedules,
        Schedule,
        |s| s.project_id.as_str()
    );

    async fn list_due_schedules(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Schedule>, StoreError> {
        Ok(self
            .schedules
            .read()
            .values()
            .filter(|s| s.enabled && s.next_run <= now)
            .cloned()
            .collect())
    }

    async fn save_plugin(&self, meta: &PluginRecord, binary: Option<&[u8]>) -> Result<(), StoreError> {
        self.plugins.write().insert(
            meta.name.clone(),
            (meta.clone(), binary.map(|b| b.to_vec())),
        );
        Ok(())
    }

    async fn get_plugin_binary(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.plugins
            .read()
            .get(name)
            .and_then(|(_, bin)| bin.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn get_plugin(&self, name: &str) -> Result<PluginRecord, StoreError> {
        self.plugins
            .read()
            .get(name)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update_plugin_status(&self, name: &str, status: PluginStatus) -> Result<(), StoreError> {
        let mut plugins = self.plugins.write();
        let (meta, _) = plugins
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        meta.status = status;
        Ok(())
    }

    impl_crud!(
        save_ml_model,
        get_ml_model,
        list_ml_models,
        delete_ml_model,
        ml_models,
        MlModel,
        |_m| ""
    );

    impl_crud!(
        save_digital_twin,
        get_digital_twin,
        list_digital_twins,
        delete_digital_twin,
        digital_twins,
        DigitalTwin,
        |_t| ""
    );
}

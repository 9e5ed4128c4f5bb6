//! In-process FIFO admission queue.
//!
//! Holds only WorkTask identities; status is the MetadataStore's to own.
//! Safe for one producer (Scheduler or the reconciliation API) and one
//! consumer (WorkerSpawner) on separate threads — `Enqueue` happens-before
//! the corresponding `Dequeue` because both go through the same mutex.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::store::{MetadataStore, StoreError};
use crate::types::{TaskStatus, WorkTask};

pub struct Queue {
    store: Arc<dyn MetadataStore>,
    ids: Mutex<VecDeque<String>>,
}

impl Queue {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            ids: Mutex::new(VecDeque::new()),
        }
    }

    /// Admits `task` as queued: persists status `Queued` then appends its id
    /// to the FIFO.
    pub async fn enqueue(&self, mut task: WorkTask) -> Result<(), StoreError> {
        task.status = TaskStatus::Queued;
        task.updated_at = chrono::Utc::now();
        self.store.save_work_task(&task).await?;
        self.ids.lock().push_back(task.id.clone());
        debug!(task_id = %task.id, "enqueued work task");
        Ok(())
    }

    /// Returns the oldest queued task id, or `None` if empty. Does not
    /// itself mutate status — callers (the spawner) write the next status.
    pub fn dequeue(&self) -> Option<String> {
        self.ids.lock().pop_front()
    }

    pub fn queue_length(&self) -> usize {
        self.ids.lock().len()
    }

    /// Writes a status transition for `id`. Not itself queue-ordering:
    /// callers are responsible for calling this after `dequeue` or to
    /// requeue an already-dequeued id.
    pub async fn update_work_task_status(
        &self,
        id: &str,
        new_status: TaskStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut task = self.store.get_work_task(id).await?;
        task.status = new_status;
        task.error_message = error_message;
        task.updated_at = chrono::Utc::now();
        self.store.save_work_task(&task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMetadataStore;
    use crate::types::TaskSpec;

    fn task(id: &str) -> WorkTask {
        WorkTask::new(
            id,
            "proj",
            TaskSpec::PipelineExecution {
                pipeline_id: "p1".into(),
                parameters: Default::default(),
            },
        )
    }

    #[tokio::test]
    async fn fifo_ordering() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let queue = Queue::new(store);
        queue.enqueue(task("a")).await.unwrap();
        queue.enqueue(task("b")).await.unwrap();
        queue.enqueue(task("c")).await.unwrap();

        assert_eq!(queue.queue_length(), 3);
        assert_eq!(queue.dequeue().as_deref(), Some("a"));
        assert_eq!(queue.dequeue().as_deref(), Some("b"));
        assert_eq!(queue.queue_length(), 1);
    }

    #[tokio::test]
    async fn dequeue_on_empty_returns_none() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let queue = Queue::new(store);
        assert_eq!(queue.dequeue(), None);
    }

    #[tokio::test]
    async fn enqueue_persists_queued_status() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let queue = Queue::new(store.clone());
        queue.enqueue(task("a")).await.unwrap();
        let persisted = store.get_work_task("a").await.unwrap();
        assert_eq!(persisted.status, TaskStatus::Queued);
    }
}

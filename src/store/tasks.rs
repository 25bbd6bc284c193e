//! In-memory task repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Task, TaskStatus};
use crate::error::StoreError;

use super::traits::TaskRepository;

/// Tasks held in memory. Every mutation happens under one write lock, which is
/// what gives `assign_worker` its compare-and-set behaviour.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task, as the upstream order service would.
    pub async fn insert(&self, task: Task) {
        debug!(task_id = %task.id, task_type = %task.task_type, "Task stored");
        self.tasks.write().await.insert(task.id, task);
    }
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity: "task".to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update_task_status(&self, id: Uuid, status: TaskStatus) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or_else(|| not_found(id))?;

        if !task.status.can_transition_to(status) {
            return Err(StoreError::Conflict(format!(
                "task {id} cannot move from {} to {status}",
                task.status
            )));
        }
        task.status = status;
        Ok(())
    }

    async fn assign_worker(&self, task_id: Uuid, worker_id: Uuid) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&task_id).ok_or_else(|| not_found(task_id))?;

        if !task.status.is_offerable() {
            return Ok(false);
        }
        task.status = TaskStatus::Accepted;
        task.assigned_worker_id = Some(worker_id);
        task.assigned_at = Some(Utc::now());
        Ok(true)
    }

    async fn release_assignment(
        &self,
        task_id: Uuid,
        worker_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&task_id).ok_or_else(|| not_found(task_id))?;

        if task.status != TaskStatus::Accepted || task.assigned_worker_id != Some(worker_id) {
            return Ok(false);
        }
        task.status = TaskStatus::Offered;
        task.assigned_worker_id = None;
        task.assigned_at = None;
        Ok(true)
    }
}

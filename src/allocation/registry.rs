//! Live worker state: location, availability, and load.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{GeoPoint, WorkerAvailability};
use crate::store::WorkerPositions;

/// Transient per-worker state fed by heartbeats and offer outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerState {
    pub worker_id: Uuid,
    /// Unknown until the first location heartbeat.
    pub location: Option<GeoPoint>,
    pub availability: WorkerAvailability,
    /// Kept equal to `assigned_tasks.len()` by `assign` and `release`.
    pub active_task_count: u32,
    /// Tasks accepted by this worker and not yet released.
    pub assigned_tasks: BTreeSet<Uuid>,
    pub last_heartbeat: DateTime<Utc>,
    pub current_task_id: Option<Uuid>,
}

impl WorkerState {
    fn new(worker_id: Uuid) -> Self {
        Self {
            worker_id,
            location: None,
            availability: WorkerAvailability::Offline,
            active_task_count: 0,
            assigned_tasks: BTreeSet::new(),
            last_heartbeat: Utc::now(),
            current_task_id: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.availability == WorkerAvailability::Online
    }

    /// Add a task to the worker's load. Returns `false` if it was already there.
    pub fn assign(&mut self, task_id: Uuid) -> bool {
        let added = self.assigned_tasks.insert(task_id);
        if added {
            self.active_task_count = self.assigned_tasks.len() as u32;
            self.current_task_id = Some(task_id);
        }
        added
    }

    /// Drop a task from the worker's load. Returns `false` if it was not there.
    pub fn release(&mut self, task_id: Uuid) -> bool {
        let removed = self.assigned_tasks.remove(&task_id);
        if removed {
            self.active_task_count = self.assigned_tasks.len() as u32;
            if self.current_task_id == Some(task_id) {
                self.current_task_id = self.assigned_tasks.iter().next_back().copied();
            }
        }
        removed
    }
}

/// Concurrency-safe map of live worker state.
///
/// Many readers (discovery, scoring) and occasional writers (heartbeats,
/// availability toggles, offer outcomes). Entries are created lazily on first
/// write, starting offline with no load.
#[derive(Debug, Default)]
pub struct WorkerStateRegistry {
    states: RwLock<HashMap<Uuid, WorkerState>>,
}

impl WorkerStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, worker_id: Uuid) -> Option<WorkerState> {
        self.states.read().await.get(&worker_id).cloned()
    }

    /// Mutate a worker's state under the write lock, creating it if needed.
    pub async fn update<F, R>(&self, worker_id: Uuid, f: F) -> R
    where
        F: FnOnce(&mut WorkerState) -> R,
    {
        let mut states = self.states.write().await;
        let state = states
            .entry(worker_id)
            .or_insert_with(|| WorkerState::new(worker_id));
        f(state)
    }

    /// Record a location heartbeat.
    pub async fn record_location(&self, worker_id: Uuid, location: GeoPoint) {
        self.update(worker_id, |state| {
            state.location = Some(location);
            state.last_heartbeat = Utc::now();
        })
        .await;
    }

    pub async fn set_availability(&self, worker_id: Uuid, availability: WorkerAvailability) {
        self.update(worker_id, |state| state.availability = availability)
            .await;
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl WorkerPositions for WorkerStateRegistry {
    async fn online_positions(&self) -> Vec<(Uuid, GeoPoint)> {
        self.states
            .read()
            .await
            .values()
            .filter(|s| s.is_online())
            .filter_map(|s| s.location.map(|loc| (s.worker_id, loc)))
            .collect()
    }
}

//! Repository traits consumed by the allocation engine.
//!
//! The storage engine behind each repository belongs to the host service. The
//! engine only relies on the contracts documented here, in particular the
//! compare-and-set semantics of `assign_worker` and `update_offer_status`,
//! which are what make offer acceptance exclusive across engine instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{GeoPoint, GigWorker, OfferStatus, Task, TaskOffer, TaskStatus, WorkerType};
use crate::error::StoreError;

#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// Get a worker profile by ID.
    async fn get_worker(&self, id: Uuid) -> Result<Option<GigWorker>, StoreError>;

    /// Online workers of any of `types` within `radius_km` of `center`.
    async fn find_online_within_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        types: &[WorkerType],
    ) -> Result<Vec<GigWorker>, StoreError>;
}

/// Live worker positions, fed by location heartbeats.
#[async_trait]
pub trait WorkerPositions: Send + Sync {
    /// Online workers with a known location.
    async fn online_positions(&self) -> Vec<(Uuid, GeoPoint)>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Get a task by ID.
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Move a task to `status`. Fails with `StoreError::Conflict` when the
    /// current status does not allow the transition.
    async fn update_task_status(&self, id: Uuid, status: TaskStatus) -> Result<(), StoreError>;

    /// Assign `worker_id` and move the task to `accepted`, only if it is still
    /// `pending` or `offered`. Returns whether this call won the assignment.
    async fn assign_worker(&self, task_id: Uuid, worker_id: Uuid) -> Result<bool, StoreError>;

    /// Undo an assignment made by `assign_worker`, returning the task to
    /// `offered`. Only applies while the task is `accepted` by `worker_id`.
    async fn release_assignment(&self, task_id: Uuid, worker_id: Uuid)
    -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    /// Persist a new offer.
    async fn create_offer(&self, offer: &TaskOffer) -> Result<(), StoreError>;

    /// Get an offer by ID.
    async fn get_offer(&self, id: Uuid) -> Result<Option<TaskOffer>, StoreError>;

    /// Pending, unexpired offers for a task, oldest first.
    async fn active_offers_for_task(
        &self,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskOffer>, StoreError>;

    /// Pending, unexpired offers for a worker, oldest first.
    async fn active_offers_for_worker(
        &self,
        worker_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskOffer>, StoreError>;

    /// Move a pending offer to `status`, recording the decline reason if given.
    /// Returns `false` when the offer had already left `pending`.
    async fn update_offer_status(
        &self,
        id: Uuid,
        status: OfferStatus,
        decline_reason: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Mark every pending offer past its deadline as expired.
    /// Returns the offers that were expired by this call.
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<TaskOffer>, StoreError>;
}

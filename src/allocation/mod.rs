//! The allocation engine.
//!
//! Matches tasks to workers: discovery, scoring, offer dispatch and the offer
//! lifecycle, on top of a live registry of worker state.

pub mod discovery;
pub mod lifecycle;
pub mod registry;
pub mod scoring;
pub mod stats;
pub mod strategy;
pub mod sweeper;

pub use discovery::{Candidate, Ineligibility, check_eligibility, required_worker_types};
pub use lifecycle::{DeclineOutcome, SweepReport};
pub use registry::{WorkerState, WorkerStateRegistry};
pub use scoring::ScoreBreakdown;
pub use stats::StatsSnapshot;
pub use strategy::{AllocationResult, AllocationStrategy};
pub use sweeper::spawn_expiry_task;

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AllocationConfig;
use crate::domain::{GeoPoint, WorkerAvailability};
use crate::error::AllocationError;
use crate::services::{EarningCalculator, GeoService, WorkerNotifier};
use crate::store::{OfferRepository, TaskRepository, WorkerRepository};

use stats::EngineStats;

/// Collaborators the engine is built from.
#[derive(Clone)]
pub struct EngineDeps {
    pub workers: Arc<dyn WorkerRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub offers: Arc<dyn OfferRepository>,
    pub geo: Arc<dyn GeoService>,
    pub pricing: Arc<dyn EarningCalculator>,
    pub notifier: Arc<dyn WorkerNotifier>,
    /// Shared with whatever else reads worker positions (e.g. the worker
    /// repository's radius queries).
    pub registry: Arc<WorkerStateRegistry>,
}

pub struct AllocationEngine {
    config: AllocationConfig,
    workers: Arc<dyn WorkerRepository>,
    tasks: Arc<dyn TaskRepository>,
    offers: Arc<dyn OfferRepository>,
    geo: Arc<dyn GeoService>,
    pricing: Arc<dyn EarningCalculator>,
    notifier: Arc<dyn WorkerNotifier>,
    registry: Arc<WorkerStateRegistry>,
    stats: EngineStats,
}

impl AllocationEngine {
    pub fn new(config: AllocationConfig, deps: EngineDeps) -> Arc<Self> {
        Arc::new(Self {
            config,
            workers: deps.workers,
            tasks: deps.tasks,
            offers: deps.offers,
            geo: deps.geo,
            pricing: deps.pricing,
            notifier: deps.notifier,
            registry: deps.registry,
            stats: EngineStats::default(),
        })
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WorkerStateRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn worker_state(&self, worker_id: Uuid) -> Option<WorkerState> {
        self.registry.get(worker_id).await
    }

    /// Find workers for a task and send offers according to `strategy`.
    ///
    /// Having nobody to offer the task to is reported through
    /// `AllocationResult::success`, not as an error, and leaves the task
    /// untouched.
    #[tracing::instrument(skip_all, fields(task_id = %task_id, strategy = %strategy))]
    pub async fn allocate_task(
        &self,
        task_id: Uuid,
        strategy: AllocationStrategy,
    ) -> Result<AllocationResult, AllocationError> {
        let started = Instant::now();
        let outcome = self.run_allocation(task_id, strategy).await;
        let success = matches!(&outcome, Ok(result) if result.success);
        self.stats.record_allocation(success, started.elapsed());

        match &outcome {
            Ok(result) if result.success => info!(
                executed = %result.strategy,
                offers_created = result.offers_created,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Task allocated"
            ),
            Ok(result) => info!(
                reason = result.message.as_deref().unwrap_or(""),
                "Task not allocated"
            ),
            Err(e) => warn!(error = %e, "Allocation failed"),
        }

        outcome
    }

    /// Record a location heartbeat. Invalid coordinates are dropped.
    pub async fn update_worker_location(&self, worker_id: Uuid, location: GeoPoint) {
        if !location.is_valid() {
            warn!(
                worker_id = %worker_id,
                latitude = location.latitude,
                longitude = location.longitude,
                "Ignoring invalid worker location"
            );
            return;
        }
        self.registry.record_location(worker_id, location).await;
    }

    pub async fn set_worker_availability(
        &self,
        worker_id: Uuid,
        availability: WorkerAvailability,
    ) {
        self.registry.set_availability(worker_id, availability).await;
        info!(worker_id = %worker_id, availability = %availability, "Worker availability changed");
    }
}

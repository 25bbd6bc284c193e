//! Candidate discovery: who could take this task right now.

use std::collections::HashSet;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AllocationConfig;
use crate::domain::{GigWorker, Task, TaskType, VerificationStatus, WorkerStatus, WorkerType};
use crate::error::AllocationError;
use crate::services::EarningBreakdown;

use super::AllocationEngine;
use super::scoring::ScoreBreakdown;

/// Deliveries heavier than this need a driver.
pub const HEAVY_DELIVERY_KG: f64 = 50.0;
/// Deliveries heavier than this cannot go by bicycle.
pub const MEDIUM_DELIVERY_KG: f64 = 10.0;

/// Fallback travel time when the geo service cannot produce an ETA.
const FALLBACK_MINUTES_PER_KM: f64 = 3.0;

/// A worker that passed every hard constraint, enriched for scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub worker: GigWorker,
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub earning: EarningBreakdown,
    /// Load at discovery time, from the live registry.
    pub active_task_count: u32,
    pub breakdown: ScoreBreakdown,
    pub score: f64,
}

/// Why a worker was filtered out before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    NotActive,
    NotVerified,
    RatingBelowFloor,
    TaskTypeNotPreferred,
    InsufficientCapacity,
    DeclinesCashCollection,
}

/// Worker types capable of a task.
pub fn required_worker_types(task: &Task) -> &'static [WorkerType] {
    use WorkerType::*;

    match task.task_type {
        TaskType::Delivery if task.total_weight_kg > HEAVY_DELIVERY_KG => &[Driver],
        TaskType::Delivery if task.total_weight_kg > MEDIUM_DELIVERY_KG => &[Driver, Rider],
        TaskType::Delivery => &[Driver, Rider, Cyclist],
        TaskType::Collection => &[Collector, Driver, Rider],
        TaskType::Survey => &[Surveyor, Walker],
        TaskType::Merchandising => &[Merchandiser, Walker],
    }
}

/// Hard constraints on the worker profile.
pub fn check_eligibility(
    worker: &GigWorker,
    task: &Task,
    config: &AllocationConfig,
) -> Result<(), Ineligibility> {
    if worker.status != WorkerStatus::Active {
        return Err(Ineligibility::NotActive);
    }
    if worker.verification_status != VerificationStatus::Approved {
        return Err(Ineligibility::NotVerified);
    }
    if worker.rating < config.min_worker_rating {
        return Err(Ineligibility::RatingBelowFloor);
    }
    if !worker.accepts_task_type(task.task_type) {
        return Err(Ineligibility::TaskTypeNotPreferred);
    }
    if task.is_weight_bearing()
        && worker
            .vehicle
            .as_ref()
            .is_some_and(|v| v.capacity_kg < task.total_weight_kg)
    {
        return Err(Ineligibility::InsufficientCapacity);
    }
    if task.requires_cash_collection() && !worker.preferences.accept_cod {
        return Err(Ineligibility::DeclinesCashCollection);
    }
    Ok(())
}

fn fallback_eta(distance_km: f64) -> u32 {
    (distance_km * FALLBACK_MINUTES_PER_KM) as u32
}

impl AllocationEngine {
    /// Find eligible, online workers near the task, skipping `exclude`.
    ///
    /// ETA failures fall back to an estimate; distance and pricing failures
    /// drop only the affected worker. An empty result is not an error.
    pub(crate) async fn discover_candidates(
        &self,
        task: &Task,
        exclude: &HashSet<Uuid>,
    ) -> Result<Vec<Candidate>, AllocationError> {
        let location = task.location();
        let max_distance = self.config.max_worker_distance_km;

        let workers = self
            .workers
            .find_online_within_radius(location, max_distance, required_worker_types(task))
            .await?;

        let mut candidates = Vec::with_capacity(workers.len());

        for worker in workers {
            if exclude.contains(&worker.id) {
                continue;
            }

            if let Err(reason) = check_eligibility(&worker, task, &self.config) {
                debug!(worker_id = %worker.id, ?reason, "Worker ineligible");
                continue;
            }

            let Some(state) = self.registry.get(worker.id).await else {
                continue;
            };
            let Some(worker_location) = state.location.filter(|_| state.is_online()) else {
                continue;
            };

            let distance_km = match self.geo.distance_km(worker_location, location).await {
                Ok(km) => km,
                Err(e) => {
                    warn!(worker_id = %worker.id, error = %e, "Distance lookup failed, skipping worker");
                    continue;
                }
            };
            if distance_km > max_distance {
                continue;
            }

            let eta_minutes = match self
                .geo
                .eta_minutes(worker_location, location, worker.vehicle_type())
                .await
            {
                Ok(minutes) => minutes,
                Err(e) => {
                    warn!(worker_id = %worker.id, error = %e, "ETA lookup failed, estimating");
                    fallback_eta(distance_km)
                }
            };

            let earning = match self.pricing.calculate(task, &worker, distance_km).await {
                Ok(earning) => earning,
                Err(e) => {
                    warn!(worker_id = %worker.id, error = %e, "Earning calculation failed, skipping worker");
                    continue;
                }
            };

            candidates.push(Candidate {
                worker,
                distance_km,
                eta_minutes,
                earning,
                active_task_count: state.active_task_count,
                breakdown: ScoreBreakdown::default(),
                score: 0.0,
            });
        }

        debug!(task_id = %task.id, candidates = candidates.len(), "Candidate discovery finished");
        Ok(candidates)
    }
}

//! Offer responses: accept, decline, expiry, and what follows from them.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{OfferStatus, Task, TaskOffer, TaskStatus};
use crate::error::AllocationError;

use super::AllocationEngine;
use super::strategy::AllocationStrategy;

const TASK_TAKEN_MESSAGE: &str = "Task taken by another worker";

/// Result of a decline.
#[derive(Debug, Default)]
pub struct DeclineOutcome {
    /// Background re-allocation, started when the declined offer was the
    /// task's last active one. Dropping the handle does not cancel it.
    pub reallocation: Option<JoinHandle<()>>,
}

impl DeclineOutcome {
    pub fn reallocation_triggered(&self) -> bool {
        self.reallocation.is_some()
    }
}

/// Result of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub reallocations: usize,
}

fn authorize(offer: &TaskOffer, worker_id: Uuid) -> Result<(), AllocationError> {
    if offer.worker_id != worker_id {
        return Err(AllocationError::Unauthorized {
            offer_id: offer.id,
            worker_id,
        });
    }
    Ok(())
}

impl AllocationEngine {
    async fn load_offer(&self, offer_id: Uuid) -> Result<TaskOffer, AllocationError> {
        self.offers
            .get_offer(offer_id)
            .await?
            .ok_or(AllocationError::NotFound {
                entity: "offer",
                id: offer_id,
            })
    }

    async fn load_task(&self, task_id: Uuid) -> Result<Task, AllocationError> {
        self.tasks
            .get_task(task_id)
            .await?
            .ok_or(AllocationError::NotFound {
                entity: "task",
                id: task_id,
            })
    }

    /// Accept an offer on behalf of `worker_id`.
    ///
    /// Exactly one offer per task can win. The task assignment is a
    /// compare-and-set in the task repository; whoever loses it gets
    /// `InvalidState`. On success every other pending offer for the task is
    /// cancelled and the worker's load goes up by one.
    #[tracing::instrument(skip_all, fields(offer_id = %offer_id, worker_id = %worker_id))]
    pub async fn accept_offer(
        &self,
        offer_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Task, AllocationError> {
        let offer = self.load_offer(offer_id).await?;
        authorize(&offer, worker_id)?;

        if offer.status != OfferStatus::Pending {
            return Err(AllocationError::invalid_state(
                "offer",
                offer_id,
                offer.status,
                "offer is no longer pending",
            ));
        }

        if offer.is_expired_at(Utc::now()) {
            return Err(AllocationError::Expired {
                offer_id,
                expired_at: offer.expires_at,
            });
        }

        let task = self.load_task(offer.task_id).await?;
        if !task.status.is_offerable() {
            return Err(AllocationError::invalid_state(
                "task",
                task.id,
                task.status,
                "task is no longer open",
            ));
        }

        if !self.tasks.assign_worker(task.id, worker_id).await? {
            return Err(AllocationError::invalid_state(
                "task",
                task.id,
                TaskStatus::Accepted,
                "another worker accepted first",
            ));
        }

        match self
            .offers
            .update_offer_status(offer_id, OfferStatus::Accepted, None)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                self.undo_assignment(task.id, worker_id).await;
                return Err(AllocationError::invalid_state(
                    "offer",
                    offer_id,
                    "responded",
                    "offer left pending while accepting",
                ));
            }
            Err(e) => {
                self.undo_assignment(task.id, worker_id).await;
                return Err(e.into());
            }
        }

        let task = self.load_task(task.id).await?;
        self.cancel_sibling_offers(&task, offer_id).await;

        self.registry
            .update(worker_id, |state| state.assign(task.id))
            .await;
        self.stats.record_accept();

        info!(task_id = %task.id, "Offer accepted");
        Ok(task)
    }

    async fn undo_assignment(&self, task_id: Uuid, worker_id: Uuid) {
        match self.tasks.release_assignment(task_id, worker_id).await {
            Ok(true) => debug!(task_id = %task_id, "Assignment rolled back"),
            Ok(false) => warn!(task_id = %task_id, "Assignment already changed, nothing to roll back"),
            Err(e) => error!(task_id = %task_id, error = %e, "Failed to roll back assignment"),
        }
    }

    /// Cancel the other pending offers for an accepted task and tell those
    /// workers. Best effort: failures are logged and skipped.
    async fn cancel_sibling_offers(&self, task: &Task, accepted_offer_id: Uuid) {
        let siblings = match self.offers.active_offers_for_task(task.id, Utc::now()).await {
            Ok(offers) => offers,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Could not list sibling offers");
                return;
            }
        };

        let mut cancelled = 0usize;
        for sibling in siblings.iter().filter(|o| o.id != accepted_offer_id) {
            match self
                .offers
                .update_offer_status(sibling.id, OfferStatus::Cancelled, None)
                .await
            {
                Ok(true) => {
                    cancelled += 1;
                    if let Err(e) = self
                        .notifier
                        .push_task_update(sibling.worker_id, task, TASK_TAKEN_MESSAGE)
                        .await
                    {
                        warn!(worker_id = %sibling.worker_id, error = %e, "Failed to notify cancelled worker");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(offer_id = %sibling.id, error = %e, "Failed to cancel sibling offer");
                }
            }
        }

        if cancelled > 0 {
            debug!(task_id = %task.id, cancelled, "Sibling offers cancelled");
        }
    }

    /// Decline an offer on behalf of `worker_id`.
    ///
    /// When this was the task's last active offer, a broadcast re-allocation
    /// starts in the background. Its outcome is logged and never returned.
    #[tracing::instrument(skip_all, fields(offer_id = %offer_id, worker_id = %worker_id))]
    pub async fn decline_offer(
        self: &Arc<Self>,
        offer_id: Uuid,
        worker_id: Uuid,
        reason: Option<&str>,
    ) -> Result<DeclineOutcome, AllocationError> {
        let offer = self.load_offer(offer_id).await?;
        authorize(&offer, worker_id)?;

        if offer.status != OfferStatus::Pending {
            return Err(AllocationError::invalid_state(
                "offer",
                offer_id,
                offer.status,
                "offer is no longer pending",
            ));
        }

        if !self
            .offers
            .update_offer_status(offer_id, OfferStatus::Declined, reason)
            .await?
        {
            return Err(AllocationError::invalid_state(
                "offer",
                offer_id,
                "responded",
                "offer left pending while declining",
            ));
        }
        self.stats.record_decline();
        info!(task_id = %offer.task_id, reason = reason.unwrap_or(""), "Offer declined");

        let reallocation = self.reallocate_if_exhausted(offer.task_id).await;
        Ok(DeclineOutcome { reallocation })
    }

    /// Start a background broadcast for `task_id` if it has no active offers
    /// left and is still open.
    pub(crate) async fn reallocate_if_exhausted(
        self: &Arc<Self>,
        task_id: Uuid,
    ) -> Option<JoinHandle<()>> {
        match self.offers.active_offers_for_task(task_id, Utc::now()).await {
            Ok(remaining) if remaining.is_empty() => {}
            Ok(remaining) => {
                debug!(task_id = %task_id, remaining = remaining.len(), "Offers still outstanding");
                return None;
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Could not check remaining offers");
                return None;
            }
        }

        match self.tasks.get_task(task_id).await {
            Ok(Some(task)) if task.status.is_offerable() => {}
            Ok(_) => return None,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Could not load task for re-allocation");
                return None;
            }
        }

        self.stats.record_reallocation();
        info!(task_id = %task_id, "All offers exhausted, re-allocating");

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move {
            match engine
                .allocate_task(task_id, AllocationStrategy::Broadcast)
                .await
            {
                Ok(result) if result.success => {
                    info!(task_id = %task_id, offers_created = result.offers_created, "Re-allocation dispatched");
                }
                Ok(result) => {
                    warn!(task_id = %task_id, reason = ?result.message, "Re-allocation found no takers");
                }
                Err(e) => {
                    error!(task_id = %task_id, error = %e, "Re-allocation failed");
                }
            }
        }))
    }

    /// Expire every pending offer past its deadline. With
    /// `reallocate_on_expiry`, tasks left without active offers are
    /// re-allocated in the background.
    pub async fn sweep_expired_offers(self: &Arc<Self>) -> Result<SweepReport, AllocationError> {
        let expired = self.offers.expire_stale(Utc::now()).await?;
        let mut report = SweepReport {
            expired: expired.len(),
            reallocations: 0,
        };

        if self.config.reallocate_on_expiry {
            let task_ids: BTreeSet<Uuid> = expired.iter().map(|o| o.task_id).collect();
            for task_id in task_ids {
                if self.reallocate_if_exhausted(task_id).await.is_some() {
                    report.reallocations += 1;
                }
            }
        }

        Ok(report)
    }

    /// Drop a finished task from the worker's load.
    ///
    /// Called by whoever owns the task after `accepted` (completion, failure
    /// or cancellation). Repeated calls for the same task are no-ops and
    /// return `false`.
    pub async fn release_worker(
        &self,
        worker_id: Uuid,
        task_id: Uuid,
    ) -> Result<bool, AllocationError> {
        let task = self.load_task(task_id).await?;
        if task.assigned_worker_id != Some(worker_id) {
            return Err(AllocationError::invalid_state(
                "task",
                task_id,
                task.status,
                "task is not assigned to this worker",
            ));
        }

        let released = self
            .registry
            .update(worker_id, |state| state.release(task_id))
            .await;

        if released {
            debug!(worker_id = %worker_id, task_id = %task_id, "Worker released");
        } else {
            debug!(worker_id = %worker_id, task_id = %task_id, "Task already released");
        }
        Ok(released)
    }

    /// Pending, unexpired offers currently held by a worker.
    pub async fn active_offers_for_worker(
        &self,
        worker_id: Uuid,
    ) -> Result<Vec<TaskOffer>, AllocationError> {
        Ok(self
            .offers
            .active_offers_for_worker(worker_id, Utc::now())
            .await?)
    }
}

//! Allocation strategies and offer dispatch.
//!
//! A strategy is a closed set of variants, each mapped to a planner that picks
//! the weighting profile, how many offers may be outstanding and whether they
//! go out one at a time or all at once. Scoring is shared.

use std::collections::HashSet;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{AllocationConfig, ScoringWeights};
use crate::domain::{Task, TaskOffer, TaskStatus};
use crate::error::{AllocationError, StoreError};
use crate::services::EarningBreakdown;

use super::AllocationEngine;
use super::discovery::Candidate;
use super::scoring::rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// One offer to the best-ranked worker.
    Nearest,
    /// Simultaneous offers to the top candidates.
    Broadcast,
    /// Reserved for model-driven matching. Runs as `Nearest`.
    AiOptimized,
}

impl std::fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::AiOptimized => write!(f, "ai_optimized"),
        }
    }
}

impl std::str::FromStr for AllocationStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "broadcast" => Ok(Self::Broadcast),
            "ai_optimized" => Ok(Self::AiOptimized),
            _ => Err(format!("Unknown allocation strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Single,
    FanOut,
}

/// What a strategy resolves to for a given configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StrategyPlan {
    /// The strategy that actually runs, after any fallback.
    pub executed: AllocationStrategy,
    pub weights: ScoringWeights,
    /// Upper bound on pending offers for the task.
    pub max_offers: usize,
    pub dispatch: Dispatch,
}

type Planner = fn(&AllocationConfig) -> StrategyPlan;

impl AllocationStrategy {
    fn planner(self) -> Planner {
        match self {
            Self::Nearest => plan_nearest,
            Self::Broadcast => plan_broadcast,
            Self::AiOptimized => plan_ai_optimized,
        }
    }

    pub(crate) fn plan(self, config: &AllocationConfig) -> StrategyPlan {
        (self.planner())(config)
    }
}

fn plan_nearest(_config: &AllocationConfig) -> StrategyPlan {
    StrategyPlan {
        executed: AllocationStrategy::Nearest,
        weights: ScoringWeights::NEAREST,
        max_offers: 1,
        dispatch: Dispatch::Single,
    }
}

fn plan_broadcast(config: &AllocationConfig) -> StrategyPlan {
    StrategyPlan {
        executed: AllocationStrategy::Broadcast,
        weights: config.weights,
        max_offers: config.max_concurrent_offers,
        dispatch: Dispatch::FanOut,
    }
}

fn plan_ai_optimized(config: &AllocationConfig) -> StrategyPlan {
    if config.enable_ai_optimization {
        debug!("No optimizer attached, using nearest");
    } else {
        debug!("AI optimization disabled, using nearest");
    }
    plan_nearest(config)
}

/// Outcome of one `allocate_task` call.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationResult {
    pub success: bool,
    pub task_id: Uuid,
    /// Strategy that executed (`nearest` when AI optimization fell back).
    pub strategy: AllocationStrategy,
    /// Set when a single worker was offered the task.
    pub worker_id: Option<Uuid>,
    pub offer_id: Option<Uuid>,
    pub worker_ids: Vec<Uuid>,
    pub offer_ids: Vec<Uuid>,
    pub offers_attempted: usize,
    pub offers_created: usize,
    pub earning: Option<EarningBreakdown>,
    pub message: Option<String>,
}

impl AllocationResult {
    pub fn unsuccessful(
        task_id: Uuid,
        strategy: AllocationStrategy,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            task_id,
            strategy,
            worker_id: None,
            offer_id: None,
            worker_ids: Vec::new(),
            offer_ids: Vec::new(),
            offers_attempted: 0,
            offers_created: 0,
            earning: None,
            message: Some(message.into()),
        }
    }

    /// Some, but not all, broadcast offers were created.
    pub fn is_partial(&self) -> bool {
        self.success && self.offers_created < self.offers_attempted
    }
}

impl AllocationEngine {
    pub(crate) async fn run_allocation(
        &self,
        task_id: Uuid,
        strategy: AllocationStrategy,
    ) -> Result<AllocationResult, AllocationError> {
        let task = self
            .tasks
            .get_task(task_id)
            .await?
            .ok_or(AllocationError::NotFound {
                entity: "task",
                id: task_id,
            })?;

        if !task.status.is_offerable() {
            return Err(AllocationError::invalid_state(
                "task",
                task_id,
                task.status,
                "task can no longer be offered",
            ));
        }

        let plan = strategy.plan(&self.config);

        let outstanding = self.offers.active_offers_for_task(task_id, Utc::now()).await?;
        let budget = plan.max_offers.saturating_sub(outstanding.len());
        if budget == 0 {
            return Ok(AllocationResult::unsuccessful(
                task_id,
                plan.executed,
                format!("Task already has {} active offer(s)", outstanding.len()),
            ));
        }
        let exclude: HashSet<Uuid> = outstanding.iter().map(|o| o.worker_id).collect();

        let mut candidates = self.discover_candidates(&task, &exclude).await?;
        rank(&mut candidates, &plan.weights, &self.config);

        match self.execute_plan(&task, &plan, candidates, budget).await {
            Err(AllocationError::NoEligibleWorkers { task_id }) => Ok(AllocationResult::unsuccessful(
                task_id,
                plan.executed,
                "No eligible workers found",
            )),
            other => other,
        }
    }

    async fn execute_plan(
        &self,
        task: &Task,
        plan: &StrategyPlan,
        candidates: Vec<Candidate>,
        budget: usize,
    ) -> Result<AllocationResult, AllocationError> {
        match plan.dispatch {
            Dispatch::Single => self.offer_to_best(task, plan.executed, candidates).await,
            Dispatch::FanOut => {
                self.offer_to_many(task, plan.executed, candidates, budget)
                    .await
            }
        }
    }

    async fn offer_to_best(
        &self,
        task: &Task,
        strategy: AllocationStrategy,
        candidates: Vec<Candidate>,
    ) -> Result<AllocationResult, AllocationError> {
        let Some(best) = candidates.into_iter().next() else {
            return Err(AllocationError::NoEligibleWorkers { task_id: task.id });
        };

        let offer = self.dispatch_offer(task, &best).await?;
        self.mark_offered(task).await;

        Ok(AllocationResult {
            success: true,
            task_id: task.id,
            strategy,
            worker_id: Some(best.worker.id),
            offer_id: Some(offer.id),
            worker_ids: vec![best.worker.id],
            offer_ids: vec![offer.id],
            offers_attempted: 1,
            offers_created: 1,
            earning: Some(best.earning),
            message: None,
        })
    }

    async fn offer_to_many(
        &self,
        task: &Task,
        strategy: AllocationStrategy,
        candidates: Vec<Candidate>,
        budget: usize,
    ) -> Result<AllocationResult, AllocationError> {
        if candidates.is_empty() {
            return Err(AllocationError::NoEligibleWorkers { task_id: task.id });
        }

        let selected: Vec<Candidate> = candidates.into_iter().take(budget).collect();
        let attempts = selected.iter().map(|candidate| async move {
            (candidate.worker.id, self.dispatch_offer(task, candidate).await)
        });
        let outcomes = join_all(attempts).await;

        let offers_attempted = outcomes.len();
        let mut worker_ids = Vec::with_capacity(offers_attempted);
        let mut offer_ids = Vec::with_capacity(offers_attempted);
        for (worker_id, outcome) in outcomes {
            match outcome {
                Ok(offer) => {
                    worker_ids.push(worker_id);
                    offer_ids.push(offer.id);
                }
                Err(e) => {
                    warn!(task_id = %task.id, worker_id = %worker_id, error = %e, "Offer creation failed");
                }
            }
        }

        if offer_ids.is_empty() {
            let mut result = AllocationResult::unsuccessful(
                task.id,
                strategy,
                format!("All {} offer attempts failed", offers_attempted),
            );
            result.offers_attempted = offers_attempted;
            return Ok(result);
        }

        self.mark_offered(task).await;

        let offers_created = offer_ids.len();
        if offers_created < offers_attempted {
            info!(
                task_id = %task.id,
                offers_created,
                offers_attempted,
                "Broadcast partially succeeded"
            );
        }

        Ok(AllocationResult {
            success: true,
            task_id: task.id,
            strategy,
            worker_id: None,
            offer_id: None,
            worker_ids,
            offer_ids,
            offers_attempted,
            offers_created,
            earning: None,
            message: None,
        })
    }

    /// Persist an offer for `candidate`, then notify the worker.
    ///
    /// Only persistence can fail the attempt. Once stored, the offer stands
    /// even if the push does not get through.
    async fn dispatch_offer(
        &self,
        task: &Task,
        candidate: &Candidate,
    ) -> Result<TaskOffer, StoreError> {
        let mut offer = TaskOffer::new(
            task.id,
            candidate.worker.id,
            Utc::now(),
            self.config.offer_ttl(),
        );
        offer.base_earning = candidate.earning.guaranteed();
        offer.bonus_earning = candidate.earning.bonus_earning;
        offer.estimated_minutes = candidate.eta_minutes;
        offer.distance_km = candidate.distance_km;

        self.offers.create_offer(&offer).await?;
        self.stats.record_offer_created();

        debug!(
            task_id = %task.id,
            worker_id = %candidate.worker.id,
            offer_id = %offer.id,
            score = candidate.score,
            distance_km = candidate.distance_km,
            "Offer created"
        );

        if let Err(e) = self
            .notifier
            .push_offer(candidate.worker.id, &offer, task)
            .await
        {
            warn!(offer_id = %offer.id, error = %e, "Failed to notify worker of offer");
        }

        Ok(offer)
    }

    async fn mark_offered(&self, task: &Task) {
        match self
            .tasks
            .update_task_status(task.id, TaskStatus::Offered)
            .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict(reason)) => {
                debug!(task_id = %task.id, reason = %reason, "Task moved on before it was marked offered");
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Failed to mark task offered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for strategy in [
            AllocationStrategy::Nearest,
            AllocationStrategy::Broadcast,
            AllocationStrategy::AiOptimized,
        ] {
            let parsed: AllocationStrategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
        assert!("best_rated".parse::<AllocationStrategy>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AllocationStrategy::AiOptimized).unwrap();
        assert_eq!(json, "\"ai_optimized\"");
    }

    #[test]
    fn nearest_plans_a_single_offer() {
        let config = AllocationConfig::default();
        let plan = AllocationStrategy::Nearest.plan(&config);
        assert_eq!(plan.max_offers, 1);
        assert_eq!(plan.dispatch, Dispatch::Single);
        assert_eq!(plan.weights, ScoringWeights::NEAREST);
    }

    #[test]
    fn broadcast_uses_configured_weights_and_fanout() {
        let config = AllocationConfig {
            max_concurrent_offers: 7,
            ..AllocationConfig::default()
        };
        let plan = AllocationStrategy::Broadcast.plan(&config);
        assert_eq!(plan.max_offers, 7);
        assert_eq!(plan.dispatch, Dispatch::FanOut);
        assert_eq!(plan.weights, config.weights);
    }

    #[test]
    fn ai_optimized_falls_back_to_nearest() {
        for enabled in [false, true] {
            let config = AllocationConfig {
                enable_ai_optimization: enabled,
                ..AllocationConfig::default()
            };
            let plan = AllocationStrategy::AiOptimized.plan(&config);
            assert_eq!(plan.executed, AllocationStrategy::Nearest);
            assert_eq!(plan.max_offers, 1);
        }
    }

    #[test]
    fn partial_only_when_successful() {
        let mut result =
            AllocationResult::unsuccessful(Uuid::new_v4(), AllocationStrategy::Broadcast, "none");
        result.offers_attempted = 3;
        assert!(!result.is_partial());

        result.success = true;
        result.offers_created = 2;
        assert!(result.is_partial());

        result.offers_created = 3;
        assert!(!result.is_partial());
    }
}

//! Multi-factor candidate scoring and ranking.
//!
//! Each factor is normalized to [0, 100] and the total is a weighted sum.
//! Ranking is by total score descending, ties broken by ascending worker ID so
//! that the order is reproducible.

use serde::Serialize;

use crate::config::{AllocationConfig, ScoringWeights};
use crate::domain::GigWorker;

use super::discovery::Candidate;

/// Normalized sub-scores of one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub distance: f64,
    pub rating: f64,
    pub experience: f64,
    pub acceptance: f64,
    pub on_time: f64,
    pub load_balance: f64,
}

impl ScoreBreakdown {
    pub fn compute(
        worker: &GigWorker,
        distance_km: f64,
        active_task_count: u32,
        config: &AllocationConfig,
    ) -> Self {
        let distance = 100.0 * (1.0 - (distance_km / config.max_worker_distance_km).min(1.0));
        let rating = worker.rating * 20.0;
        let experience = ((worker.completed_tasks as f64 + 1.0).ln() * 20.0).min(100.0);
        let acceptance = worker.acceptance_rate * 100.0;
        let on_time = worker.on_time_rate * 100.0;
        let load_balance =
            100.0 * (1.0 - active_task_count as f64 / config.max_tasks_per_worker as f64);

        Self {
            distance: clamp(distance),
            rating: clamp(rating),
            experience: clamp(experience),
            acceptance: clamp(acceptance),
            on_time: clamp(on_time),
            load_balance: clamp(load_balance),
        }
    }

    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        self.distance * weights.distance
            + self.rating * weights.rating
            + self.experience * weights.experience
            + self.acceptance * weights.acceptance
            + self.on_time * weights.on_time
            + self.load_balance * weights.load_balance
    }
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Score every candidate with `weights` and sort best first.
pub fn rank(candidates: &mut [Candidate], weights: &ScoringWeights, config: &AllocationConfig) {
    for candidate in candidates.iter_mut() {
        candidate.breakdown = ScoreBreakdown::compute(
            &candidate.worker,
            candidate.distance_km,
            candidate.active_task_count,
            config,
        );
        candidate.score = candidate.breakdown.weighted(weights);
    }

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.worker.id.cmp(&b.worker.id))
    });
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::domain::WorkerType;
    use crate::services::EarningBreakdown;

    fn worker(rating: f64, completed: u32, acceptance: f64, on_time: f64) -> GigWorker {
        let mut w = GigWorker::new("w", WorkerType::Rider);
        w.rating = rating;
        w.completed_tasks = completed;
        w.acceptance_rate = acceptance;
        w.on_time_rate = on_time;
        w
    }

    fn candidate(worker: GigWorker, distance_km: f64, active: u32) -> Candidate {
        Candidate {
            worker,
            distance_km,
            eta_minutes: 0,
            earning: EarningBreakdown {
                base_earning: Decimal::ZERO,
                distance_earning: Decimal::ZERO,
                weight_earning: Decimal::ZERO,
                surge_multiplier: Decimal::ONE,
                bonus_earning: Decimal::ZERO,
                total_earning: Decimal::ZERO,
            },
            active_task_count: active,
            breakdown: ScoreBreakdown::default(),
            score: 0.0,
        }
    }

    #[test]
    fn sub_scores_are_normalized() {
        let config = AllocationConfig::default();
        let b = ScoreBreakdown::compute(&worker(5.0, 10_000, 1.0, 1.0), 0.0, 0, &config);
        assert_eq!(b.distance, 100.0);
        assert_eq!(b.rating, 100.0);
        assert_eq!(b.experience, 100.0);
        assert_eq!(b.load_balance, 100.0);

        let b = ScoreBreakdown::compute(&worker(0.0, 0, 0.0, 0.0), 25.0, 9, &config);
        assert_eq!(b.distance, 0.0);
        assert_eq!(b.experience, 0.0);
        assert_eq!(b.load_balance, 0.0);
    }

    #[test]
    fn experience_is_logarithmic() {
        let config = AllocationConfig::default();
        let b = ScoreBreakdown::compute(&worker(4.0, 9, 0.5, 0.5), 0.0, 0, &config);
        assert!((b.experience - 10f64.ln() * 20.0).abs() < 1e-9);
    }

    #[test]
    fn nearest_weighting_prefers_strong_worker_slightly_further_away() {
        let config = AllocationConfig::default();
        let a = candidate(worker(4.8, 200, 0.9, 0.95), 2.0, 0);
        let b = candidate(worker(3.0, 5, 0.5, 0.5), 1.0, 3);
        let a_id = a.worker.id;

        let mut ranked = vec![b, a];
        rank(&mut ranked, &ScoringWeights::NEAREST, &config);

        // A: 80*.5 + 96*.2 + 90*.15 + 95*.15 = 86.95
        // B: 90*.5 + 60*.2 + 50*.15 + 50*.15 = 72.0
        assert!((ranked[0].score - 86.95).abs() < 1e-9);
        assert!((ranked[1].score - 72.0).abs() < 1e-9);
        assert_eq!(ranked[0].worker.id, a_id);
    }

    #[test]
    fn score_strictly_decreases_with_distance() {
        let config = AllocationConfig::default();
        let w = worker(4.2, 40, 0.8, 0.85);
        for weights in [ScoringWeights::NEAREST, config.weights] {
            let mut previous = f64::INFINITY;
            for step in 0..10 {
                let d = step as f64;
                let score = ScoreBreakdown::compute(&w, d, 1, &config).weighted(&weights);
                assert!(score < previous, "score did not drop at {d} km");
                previous = score;
            }
        }
    }

    #[test]
    fn ties_break_on_worker_id() {
        let config = AllocationConfig::default();
        let template = worker(4.0, 10, 0.8, 0.8);

        let mut ranked: Vec<Candidate> = (0..5)
            .map(|_| {
                let mut w = template.clone();
                w.id = Uuid::new_v4();
                candidate(w, 3.0, 0)
            })
            .collect();
        rank(&mut ranked, &config.weights, &config);

        let ids: Vec<Uuid> = ranked.iter().map(|c| c.worker.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}

//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Weights applied to the normalized sub-scores of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub distance: f64,
    pub rating: f64,
    pub experience: f64,
    pub acceptance: f64,
    pub on_time: f64,
    pub load_balance: f64,
}

impl ScoringWeights {
    /// Fixed distance-first profile used by the nearest strategy.
    pub const NEAREST: ScoringWeights = ScoringWeights {
        distance: 0.5,
        rating: 0.2,
        experience: 0.0,
        acceptance: 0.15,
        on_time: 0.15,
        load_balance: 0.0,
    };

    pub fn total(&self) -> f64 {
        self.distance
            + self.rating
            + self.experience
            + self.acceptance
            + self.on_time
            + self.load_balance
    }

    fn as_pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("distance", self.distance),
            ("rating", self.rating),
            ("experience", self.experience),
            ("acceptance", self.acceptance),
            ("on_time", self.on_time),
            ("load_balance", self.load_balance),
        ]
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 0.30,
            rating: 0.25,
            experience: 0.10,
            acceptance: 0.15,
            on_time: 0.10,
            load_balance: 0.10,
        }
    }
}

/// Allocation engine configuration.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    /// How long a worker has to respond to an offer.
    pub offer_timeout: Duration,
    /// Upper bound on simultaneously pending offers per task under broadcast.
    pub max_concurrent_offers: usize,
    /// Weights for the default (configured) scoring profile.
    pub weights: ScoringWeights,
    /// Search radius and distance cut-off, in km.
    pub max_worker_distance_km: f64,
    /// Workers rated below this are never offered work.
    pub min_worker_rating: f64,
    /// Active task count at which the load-balance score reaches zero.
    pub max_tasks_per_worker: u32,
    /// Gate for the AI-optimized strategy. Falls back to nearest either way for now.
    pub enable_ai_optimization: bool,
    /// Re-allocate tasks whose last offers were expired by the sweeper.
    pub reallocate_on_expiry: bool,
    /// Period of the background expiry sweep.
    pub expiry_sweep_interval: Duration,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            offer_timeout: Duration::from_secs(30),
            max_concurrent_offers: 5,
            weights: ScoringWeights::default(),
            max_worker_distance_km: 10.0,
            min_worker_rating: 3.5,
            max_tasks_per_worker: 3,
            enable_ai_optimization: false,
            reallocate_on_expiry: true,
            expiry_sweep_interval: Duration::from_secs(15),
        }
    }
}

impl AllocationConfig {
    /// Build config from `GIG_*` environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let weights = ScoringWeights {
            distance: env_or("GIG_WEIGHT_DISTANCE", defaults.weights.distance),
            rating: env_or("GIG_WEIGHT_RATING", defaults.weights.rating),
            experience: env_or("GIG_WEIGHT_EXPERIENCE", defaults.weights.experience),
            acceptance: env_or("GIG_WEIGHT_ACCEPTANCE", defaults.weights.acceptance),
            on_time: env_or("GIG_WEIGHT_ON_TIME", defaults.weights.on_time),
            load_balance: env_or("GIG_WEIGHT_LOAD_BALANCE", defaults.weights.load_balance),
        };

        Self {
            offer_timeout: Duration::from_secs(env_or(
                "GIG_OFFER_TIMEOUT_SECS",
                defaults.offer_timeout.as_secs(),
            )),
            max_concurrent_offers: env_or(
                "GIG_MAX_CONCURRENT_OFFERS",
                defaults.max_concurrent_offers,
            ),
            weights,
            max_worker_distance_km: env_or(
                "GIG_MAX_WORKER_DISTANCE_KM",
                defaults.max_worker_distance_km,
            ),
            min_worker_rating: env_or("GIG_MIN_WORKER_RATING", defaults.min_worker_rating),
            max_tasks_per_worker: env_or(
                "GIG_MAX_TASKS_PER_WORKER",
                defaults.max_tasks_per_worker,
            ),
            enable_ai_optimization: env_or(
                "GIG_ENABLE_AI_OPTIMIZATION",
                defaults.enable_ai_optimization,
            ),
            reallocate_on_expiry: env_or(
                "GIG_REALLOCATE_ON_EXPIRY",
                defaults.reallocate_on_expiry,
            ),
            expiry_sweep_interval: Duration::from_secs(env_or(
                "GIG_EXPIRY_SWEEP_SECS",
                defaults.expiry_sweep_interval.as_secs(),
            )),
        }
    }

    /// Offer lifetime as a wall-clock delta.
    pub fn offer_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(
            i64::try_from(self.offer_timeout.as_millis()).unwrap_or(i64::MAX),
        )
    }

    /// Reject configurations the scoring maths cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.offer_timeout.is_zero() {
            return Err(invalid("offer_timeout", "must be non-zero"));
        }
        if self.expiry_sweep_interval.is_zero() {
            return Err(invalid("expiry_sweep_interval", "must be non-zero"));
        }
        if self.max_concurrent_offers == 0 {
            return Err(invalid("max_concurrent_offers", "must be at least 1"));
        }
        if self.max_tasks_per_worker == 0 {
            return Err(invalid("max_tasks_per_worker", "must be at least 1"));
        }
        if !(self.max_worker_distance_km.is_finite() && self.max_worker_distance_km > 0.0) {
            return Err(invalid("max_worker_distance_km", "must be a positive number"));
        }
        if !(0.0..=5.0).contains(&self.min_worker_rating) {
            return Err(invalid("min_worker_rating", "must be within [0, 5]"));
        }
        for (name, value) in self.weights.as_pairs() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(
                    &format!("weights.{name}"),
                    "must be a non-negative number",
                ));
            }
        }
        if self.weights.total() <= 0.0 {
            return Err(invalid("weights", "must not all be zero"));
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AllocationConfig::default().validate().is_ok());
    }

    #[test]
    fn nearest_profile_sums_to_one() {
        assert!((ScoringWeights::NEAREST.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_offer_fanout() {
        let config = AllocationConfig {
            max_concurrent_offers: 0,
            ..AllocationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_offers"));
    }

    #[test]
    fn rejects_zero_sweep_interval() {
        let config = AllocationConfig {
            expiry_sweep_interval: Duration::ZERO,
            ..AllocationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("expiry_sweep_interval"));
    }

    #[test]
    fn rejects_negative_weight() {
        let config = AllocationConfig {
            weights: ScoringWeights {
                rating: -0.1,
                ..ScoringWeights::default()
            },
            ..AllocationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("weights.rating"));
    }

    #[test]
    fn rejects_all_zero_weights() {
        let config = AllocationConfig {
            weights: ScoringWeights {
                distance: 0.0,
                rating: 0.0,
                experience: 0.0,
                acceptance: 0.0,
                on_time: 0.0,
                load_balance: 0.0,
            },
            ..AllocationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_rating_floor() {
        let config = AllocationConfig {
            min_worker_rating: 5.5,
            ..AllocationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn offer_ttl_matches_timeout() {
        let config = AllocationConfig {
            offer_timeout: Duration::from_millis(1500),
            ..AllocationConfig::default()
        };
        assert_eq!(config.offer_ttl(), chrono::Duration::milliseconds(1500));
    }
}

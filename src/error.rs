//! Error types for the dispatch core.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Geo error: {0}")]
    Geo(#[from] GeoError),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors surfaced by the allocation engine's public operations.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} {id} is {state}: {reason}")]
    InvalidState {
        entity: &'static str,
        id: Uuid,
        state: String,
        reason: String,
    },

    #[error("Offer {offer_id} does not belong to worker {worker_id}")]
    Unauthorized { offer_id: Uuid, worker_id: Uuid },

    #[error("Offer {offer_id} expired at {expired_at}")]
    Expired {
        offer_id: Uuid,
        expired_at: DateTime<Utc>,
    },

    #[error("No eligible workers for task {task_id}")]
    NoEligibleWorkers { task_id: Uuid },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AllocationError {
    pub(crate) fn invalid_state(
        entity: &'static str,
        id: Uuid,
        state: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            entity,
            id,
            state: state.to_string(),
            reason: reason.into(),
        }
    }
}

/// Repository errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Geo collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("Invalid coordinates: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("No speed profile for vehicle type {0}")]
    UnsupportedVehicle(String),

    #[error("Routing failed: {0}")]
    Routing(String),
}

/// Earning calculator errors.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Cannot price task {task_id}: {reason}")]
    InvalidInput { task_id: Uuid, reason: String },

    #[error("Pricing backend unavailable: {0}")]
    Unavailable(String),
}

/// Worker notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to deliver to worker {worker_id}: {reason}")]
    Delivery { worker_id: Uuid, reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

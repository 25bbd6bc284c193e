//! Domain model: workers, tasks, offers, and geographic value types.
//!
//! Workers and tasks are owned by upstream services; the dispatch core only
//! reads them, except for the task states it drives (`pending → offered →
//! accepted`). Offers are created and resolved exclusively by the engine.

pub mod geo;
pub mod offer;
pub mod task;
pub mod worker;

pub use geo::{Address, GeoPoint};
pub use offer::{OfferStatus, TaskOffer};
pub use task::{Task, TaskStatus, TaskType};
pub use worker::{
    GigWorker, TaskPreferences, Vehicle, VerificationStatus, WorkerAvailability, WorkerStatus,
    WorkerType,
};

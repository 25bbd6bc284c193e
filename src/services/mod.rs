//! External collaborators consumed by the engine, with default implementations.

pub mod geo;
pub mod notifier;
pub mod pricing;

pub use geo::{GeoService, HaversineGeo, Route};
pub use notifier::{BroadcastNotifier, WorkerEvent, WorkerNotifier};
pub use pricing::{EarningBreakdown, EarningCalculator, RateCardPricing};

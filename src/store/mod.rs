//! Persistence layer: repository traits and in-memory backends.

pub mod offers;
pub mod tasks;
pub mod traits;
pub mod workers;

pub use offers::InMemoryOfferRepository;
pub use tasks::InMemoryTaskRepository;
pub use traits::{OfferRepository, TaskRepository, WorkerPositions, WorkerRepository};
pub use workers::InMemoryWorkerRepository;

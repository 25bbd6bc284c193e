//! Gig dispatch: task-to-worker allocation core.

pub mod allocation;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod store;

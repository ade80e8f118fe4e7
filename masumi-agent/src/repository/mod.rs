//! Repository Module
//!
//! Data access layer for the agent.
//! Jobs live in memory only; the store is injected behind a trait so the
//! orchestrator never touches shared state directly.

pub mod job;

// Re-export for convenience
pub use job::{InMemoryJobRepository, JobRepository, StoreError};

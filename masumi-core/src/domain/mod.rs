//! Core domain types
//!
//! These types represent the business entities of the agent service and are
//! shared between the job store, the orchestrator and the HTTP layer.

pub mod job;
pub mod payment;

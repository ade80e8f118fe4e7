//! Service Module
//!
//! Business logic layer for the agent.
//! Services orchestrate between the job store, the payment gateway and the
//! task executor.

pub mod job;
pub mod registration;

pub use job::{JobError, JobService, JobSettings};

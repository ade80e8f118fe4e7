//! Scheduler layer for the agent
//!
//! Watches outstanding payments and reports confirmations back to the job
//! orchestrator as messages on a channel.

pub mod monitor;

pub use monitor::{PaymentEvent, PaymentMonitor};

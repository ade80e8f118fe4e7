//! Data Transfer Objects for the agent HTTP API
//!
//! Field names follow the public agent API contract, which mixes snake_case
//! and camelCase keys.

pub mod agent;
pub mod job;

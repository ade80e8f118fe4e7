//! Masumi Agent
//!
//! HTTP service selling text jobs for on-chain payments.
//!
//! Architecture:
//! - API: axum handlers for job submission, status and agent metadata
//! - Service: job orchestration and startup registration
//! - Repository: job storage behind the `JobRepository` trait
//! - Scheduler: per-job payment monitors feeding payment events
//! - Executor: backends producing a job's result (webhook or stub)

pub mod api;
pub mod config;
pub mod executor;
pub mod repository;
pub mod scheduler;
pub mod service;

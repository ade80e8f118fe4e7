//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::payment::PaymentStatus;

/// Purchaser-submitted work tracked from payment to result
///
/// A job is only ever created once its payment request exists, so
/// `payment_id` is always set and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: String,
    pub identifier_from_purchaser: String,
    pub input_data: BTreeMap<String, String>,
    pub input_hash: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    AwaitingPayment,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::AwaitingPayment => write!(f, "awaiting_payment"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A requested change to a job record
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    /// Payment confirmed, task execution begins
    StartRunning,
    /// Task produced a result
    Complete { result: serde_json::Value },
    /// Task or payment failed
    Fail { error: String },
    /// Latest payment status observed on the payment service
    RecordPaymentStatus(PaymentStatus),
}

/// Rejected transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move job from {from} via {transition}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub transition: &'static str,
}

impl JobTransition {
    fn name(&self) -> &'static str {
        match self {
            JobTransition::StartRunning => "start_running",
            JobTransition::Complete { .. } => "complete",
            JobTransition::Fail { .. } => "fail",
            JobTransition::RecordPaymentStatus(_) => "record_payment_status",
        }
    }
}

impl Job {
    /// Creates a job awaiting payment for an already issued payment request
    pub fn new(
        identifier_from_purchaser: String,
        input_data: BTreeMap<String, String>,
        payment_id: String,
        input_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::AwaitingPayment,
            payment_status: PaymentStatus::Pending,
            payment_id,
            identifier_from_purchaser,
            input_data,
            input_hash,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Applies a transition, enforcing forward-only status changes.
    ///
    /// Recording a payment status on a terminal job leaves it untouched.
    pub fn apply(&mut self, transition: JobTransition) -> Result<(), TransitionError> {
        let rejected = TransitionError {
            from: self.status,
            transition: transition.name(),
        };

        match (self.status, transition) {
            (JobStatus::AwaitingPayment, JobTransition::StartRunning) => {
                self.status = JobStatus::Running;
                self.started_at = Some(Utc::now());
            }
            (JobStatus::Running, JobTransition::Complete { result }) => {
                self.status = JobStatus::Completed;
                self.payment_status = PaymentStatus::Completed;
                self.result = Some(result);
                self.completed_at = Some(Utc::now());
            }
            (JobStatus::AwaitingPayment | JobStatus::Running, JobTransition::Fail { error }) => {
                self.status = JobStatus::Failed;
                self.error = Some(error);
                self.completed_at = Some(Utc::now());
            }
            (status, JobTransition::RecordPaymentStatus(payment_status)) => {
                if !status.is_terminal() {
                    self.payment_status = payment_status;
                }
            }
            _ => return Err(rejected),
        }

        Ok(())
    }
}

//! Payment gateway
//!
//! The operations the agent needs from a payment backend. `MasumiGateway`
//! talks to a real payment service; `StubPaymentGateway` keeps payments in
//! memory and confirms them after a fixed number of status checks.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use masumi_core::domain::payment::{Amount, PaymentStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::PaymentClient;
use crate::error::{ClientError, Result};
use crate::payments::CreatePayment;

/// Parameters of a new payment request
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub agent_identifier: String,
    pub identifier_from_purchaser: String,
    pub input_hash: String,
    pub amounts: Vec<Amount>,
}

/// Payment request as issued by the payment backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequestInfo {
    pub blockchain_identifier: String,
    pub pay_by_time: i64,
    pub submit_result_time: i64,
    pub unlock_time: i64,
    pub external_dispute_unlock_time: i64,
}

/// Observed state of a payment on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentState {
    pub on_chain_state: Option<String>,
}

impl PaymentState {
    pub fn new(on_chain_state: Option<String>) -> Self {
        Self { on_chain_state }
    }

    /// Payment status as reported to purchasers
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_on_chain_state(self.on_chain_state.as_deref())
    }

    /// Funds are locked (or already settled), so the job may run
    pub fn is_confirmed(&self) -> bool {
        self.status() == PaymentStatus::Completed
    }
}

/// Payment backend used by the job orchestrator
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment request for a job
    async fn create_payment_request(&self, req: &PaymentRequest) -> Result<PaymentRequestInfo>;

    /// Reports the current state of a payment
    async fn check_payment_status(&self, blockchain_identifier: &str) -> Result<PaymentState>;

    /// Finalizes a payment by submitting the hash of the delivered result
    async fn complete_payment(&self, blockchain_identifier: &str, result_hash: &str) -> Result<()>;
}

// =============================================================================
// Masumi payment service
// =============================================================================

/// Gateway backed by the Masumi payment service
#[derive(Debug, Clone)]
pub struct MasumiGateway {
    client: PaymentClient,
    /// How long the purchaser has to pay
    pay_by_window: Duration,
    /// How long the agent has to submit a result once paid
    submit_result_window: Duration,
    /// How many recent payments to scan when looking up a payment
    lookup_limit: u32,
}

impl MasumiGateway {
    pub fn new(client: PaymentClient) -> Self {
        Self {
            client,
            pay_by_window: Duration::hours(1),
            submit_result_window: Duration::hours(12),
            lookup_limit: 100,
        }
    }

    /// Overrides the payment and result submission windows
    pub fn with_windows(mut self, pay_by: Duration, submit_result: Duration) -> Self {
        self.pay_by_window = pay_by;
        self.submit_result_window = submit_result;
        self
    }
}

#[async_trait]
impl PaymentGateway for MasumiGateway {
    async fn create_payment_request(&self, req: &PaymentRequest) -> Result<PaymentRequestInfo> {
        let now = Utc::now();
        let pay_by_time = (now + self.pay_by_window).timestamp_millis();
        let submit_result_time = (now + self.submit_result_window).timestamp_millis();

        let body = CreatePayment::new(
            req.agent_identifier.clone(),
            self.client.network().to_string(),
            req.input_hash.clone(),
            req.identifier_from_purchaser.clone(),
            req.amounts.clone(),
            pay_by_time,
            submit_result_time,
        );

        let data = self.client.create_payment(&body).await?;
        info!("Created payment request {}", data.blockchain_identifier);

        Ok(PaymentRequestInfo {
            blockchain_identifier: data.blockchain_identifier,
            pay_by_time,
            submit_result_time: data.submit_result_time,
            unlock_time: data.unlock_time,
            external_dispute_unlock_time: data.external_dispute_unlock_time,
        })
    }

    async fn check_payment_status(&self, blockchain_identifier: &str) -> Result<PaymentState> {
        let payment = self
            .client
            .find_payment(blockchain_identifier, self.lookup_limit)
            .await?
            .ok_or_else(|| ClientError::NotFound(blockchain_identifier.to_string()))?;

        debug!(
            "Payment {} on-chain state: {:?}",
            blockchain_identifier, payment.on_chain_state
        );

        Ok(PaymentState::new(payment.on_chain_state))
    }

    async fn complete_payment(&self, blockchain_identifier: &str, result_hash: &str) -> Result<()> {
        self.client
            .submit_result(blockchain_identifier, result_hash)
            .await
    }
}

// =============================================================================
// In-memory stub
// =============================================================================

#[derive(Debug, Default)]
struct StubPayment {
    checks: u32,
    result_hash: Option<String>,
}

/// In-memory gateway for local development and tests
///
/// Every payment is reported as `FundsLocked` once it has been checked
/// `confirm_after` times, and as `ResultSubmitted` after completion.
#[derive(Debug, Default)]
pub struct StubPaymentGateway {
    confirm_after: u32,
    payments: Mutex<HashMap<String, StubPayment>>,
    fail_requests: AtomicBool,
    fail_status_checks: AtomicBool,
}

impl StubPaymentGateway {
    pub fn new(confirm_after: u32) -> Self {
        Self {
            confirm_after,
            ..Default::default()
        }
    }

    /// Makes subsequent payment requests fail
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent status checks fail
    pub fn set_fail_status_checks(&self, fail: bool) {
        self.fail_status_checks.store(fail, Ordering::SeqCst);
    }

    /// Result hash submitted for a payment, if it was completed
    pub async fn submitted_result(&self, blockchain_identifier: &str) -> Option<String> {
        let payments = self.payments.lock().await;
        payments
            .get(blockchain_identifier)
            .and_then(|payment| payment.result_hash.clone())
    }

    /// Number of payment requests issued so far
    pub async fn payment_count(&self) -> usize {
        self.payments.lock().await.len()
    }
}

#[async_trait]
impl PaymentGateway for StubPaymentGateway {
    async fn create_payment_request(&self, req: &PaymentRequest) -> Result<PaymentRequestInfo> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(503, "payment service unavailable"));
        }

        let now = Utc::now();
        let blockchain_identifier = format!("stub-{}", Uuid::new_v4());

        self.payments
            .lock()
            .await
            .insert(blockchain_identifier.clone(), StubPayment::default());

        debug!(
            "Stub payment {} created for purchaser {}",
            blockchain_identifier, req.identifier_from_purchaser
        );

        Ok(PaymentRequestInfo {
            blockchain_identifier,
            pay_by_time: (now + Duration::hours(1)).timestamp_millis(),
            submit_result_time: (now + Duration::hours(12)).timestamp_millis(),
            unlock_time: (now + Duration::hours(18)).timestamp_millis(),
            external_dispute_unlock_time: (now + Duration::hours(24)).timestamp_millis(),
        })
    }

    async fn check_payment_status(&self, blockchain_identifier: &str) -> Result<PaymentState> {
        if self.fail_status_checks.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(503, "payment service unavailable"));
        }

        let mut payments = self.payments.lock().await;
        let payment = payments
            .get_mut(blockchain_identifier)
            .ok_or_else(|| ClientError::NotFound(blockchain_identifier.to_string()))?;

        payment.checks += 1;

        let state = if payment.result_hash.is_some() {
            Some("ResultSubmitted".to_string())
        } else if payment.checks >= self.confirm_after {
            Some("FundsLocked".to_string())
        } else {
            None
        };

        Ok(PaymentState::new(state))
    }

    async fn complete_payment(&self, blockchain_identifier: &str, result_hash: &str) -> Result<()> {
        let mut payments = self.payments.lock().await;
        let payment = payments
            .get_mut(blockchain_identifier)
            .ok_or_else(|| ClientError::NotFound(blockchain_identifier.to_string()))?;

        payment.result_hash = Some(result_hash.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            agent_identifier: "agent".to_string(),
            identifier_from_purchaser: "p1".to_string(),
            input_hash: "hash".to_string(),
            amounts: vec![Amount::new(10, "lovelace")],
        }
    }

    #[test]
    fn test_payment_state_confirmation() {
        assert!(!PaymentState::default().is_confirmed());
        assert!(PaymentState::new(Some("FundsLocked".to_string())).is_confirmed());
        assert!(!PaymentState::new(Some("RefundRequested".to_string())).is_confirmed());
    }

    #[tokio::test]
    async fn test_stub_confirms_after_checks() {
        let gateway = StubPaymentGateway::new(2);
        let info = gateway.create_payment_request(&request()).await.unwrap();

        let first = gateway
            .check_payment_status(&info.blockchain_identifier)
            .await
            .unwrap();
        assert!(!first.is_confirmed());

        let second = gateway
            .check_payment_status(&info.blockchain_identifier)
            .await
            .unwrap();
        assert!(second.is_confirmed());
    }

    #[tokio::test]
    async fn test_stub_records_completion() {
        let gateway = StubPaymentGateway::new(0);
        let info = gateway.create_payment_request(&request()).await.unwrap();

        gateway
            .complete_payment(&info.blockchain_identifier, "abc")
            .await
            .unwrap();

        assert_eq!(
            gateway.submitted_result(&info.blockchain_identifier).await,
            Some("abc".to_string())
        );
        let state = gateway
            .check_payment_status(&info.blockchain_identifier)
            .await
            .unwrap();
        assert_eq!(state.on_chain_state.as_deref(), Some("ResultSubmitted"));
    }

    #[tokio::test]
    async fn test_stub_failure_switches() {
        let gateway = StubPaymentGateway::new(0);
        gateway.set_fail_requests(true);
        assert!(gateway.create_payment_request(&request()).await.is_err());
        assert_eq!(gateway.payment_count().await, 0);

        gateway.set_fail_requests(false);
        let info = gateway.create_payment_request(&request()).await.unwrap();

        gateway.set_fail_status_checks(true);
        assert!(
            gateway
                .check_payment_status(&info.blockchain_identifier)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_stub_unknown_payment() {
        let gateway = StubPaymentGateway::new(0);
        let err = gateway.check_payment_status("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

//! Payment monitor
//!
//! One monitor task runs per job. It polls the payment gateway on a fixed
//! interval and sends exactly one `PaymentEvent` before terminating: either
//! the payment was confirmed, or the payment window elapsed first.

use masumi_payment::PaymentGateway;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of watching a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// Funds are locked, the job may run
    Confirmed { job_id: Uuid, payment_id: String },
    /// No confirmation arrived within the payment window
    Expired { job_id: Uuid, payment_id: String },
}

impl PaymentEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            PaymentEvent::Confirmed { job_id, .. } | PaymentEvent::Expired { job_id, .. } => {
                *job_id
            }
        }
    }
}

/// Spawns payment polling tasks
#[derive(Clone)]
pub struct PaymentMonitor {
    gateway: Arc<dyn PaymentGateway>,
    events: mpsc::Sender<PaymentEvent>,
    interval: Duration,
    timeout: Option<Duration>,
}

impl PaymentMonitor {
    /// Creates a monitor reporting to `events`
    ///
    /// # Arguments
    /// * `interval` - Delay between two status checks of the same payment
    /// * `timeout` - How long to wait for a confirmation, `None` waits forever
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        events: mpsc::Sender<PaymentEvent>,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            gateway,
            events,
            interval,
            timeout,
        }
    }

    /// Starts watching the payment of a job
    pub fn spawn(&self, job_id: Uuid, payment_id: String) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();

        tokio::spawn(async move {
            monitor.watch(job_id, payment_id).await;
        })
    }

    async fn watch(&self, job_id: Uuid, payment_id: String) {
        info!(
            "Starting payment status monitoring for job {} (interval: {:?})",
            job_id, self.interval
        );

        let started = Instant::now();
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if self.events.is_closed() {
                debug!("Event channel closed, stopping monitor for job {}", job_id);
                return;
            }

            match self.gateway.check_payment_status(&payment_id).await {
                Ok(state) if state.is_confirmed() => {
                    info!("Payment {} confirmed for job {}", payment_id, job_id);
                    self.send(PaymentEvent::Confirmed { job_id, payment_id })
                        .await;
                    return;
                }
                Ok(state) => {
                    debug!(
                        "Payment {} for job {} not confirmed yet ({})",
                        payment_id,
                        job_id,
                        state.status()
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to check payment {} for job {}: {}",
                        payment_id, job_id, e
                    );
                }
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    warn!(
                        "Payment {} for job {} not confirmed within {:?}",
                        payment_id, job_id, timeout
                    );
                    self.send(PaymentEvent::Expired { job_id, payment_id })
                        .await;
                    return;
                }
            }
        }
    }

    async fn send(&self, event: PaymentEvent) {
        let job_id = event.job_id();
        if self.events.send(event).await.is_err() {
            warn!("Dropping payment event for job {}: orchestrator stopped", job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use masumi_core::domain::payment::Amount;
    use masumi_payment::{PaymentRequest, StubPaymentGateway};

    async fn create_payment(gateway: &StubPaymentGateway) -> String {
        gateway
            .create_payment_request(&PaymentRequest {
                agent_identifier: "agent".to_string(),
                identifier_from_purchaser: "p1".to_string(),
                input_hash: "hash".to_string(),
                amounts: vec![Amount::new(1, "lovelace")],
            })
            .await
            .unwrap()
            .blockchain_identifier
    }

    #[tokio::test]
    async fn test_monitor_fires_once_then_stops() {
        let gateway = Arc::new(StubPaymentGateway::new(3));
        let payment_id = create_payment(&gateway).await;
        let (tx, mut rx) = mpsc::channel(8);
        let monitor = PaymentMonitor::new(gateway.clone(), tx, Duration::from_millis(5), None);

        let job_id = Uuid::new_v4();
        let handle = monitor.spawn(job_id, payment_id.clone());

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            PaymentEvent::Confirmed {
                job_id,
                payment_id
            }
        );

        // the task terminates after firing
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
        drop(monitor);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_monitor_keeps_polling_through_errors() {
        let gateway = Arc::new(StubPaymentGateway::new(1));
        let payment_id = create_payment(&gateway).await;
        gateway.set_fail_status_checks(true);

        let (tx, mut rx) = mpsc::channel(8);
        let monitor = PaymentMonitor::new(gateway.clone(), tx, Duration::from_millis(5), None);
        monitor.spawn(Uuid::new_v4(), payment_id);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());

        gateway.set_fail_status_checks(false);
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, PaymentEvent::Confirmed { .. }));
    }

    #[tokio::test]
    async fn test_monitor_expires() {
        let gateway = Arc::new(StubPaymentGateway::new(u32::MAX));
        let payment_id = create_payment(&gateway).await;
        let (tx, mut rx) = mpsc::channel(8);
        let monitor = PaymentMonitor::new(
            gateway,
            tx,
            Duration::from_millis(5),
            Some(Duration::from_millis(20)),
        );

        let job_id = Uuid::new_v4();
        monitor.spawn(job_id, payment_id.clone());

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, PaymentEvent::Expired { job_id, payment_id });
    }
}

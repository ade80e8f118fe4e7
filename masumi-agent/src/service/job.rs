//! Job Service
//!
//! Business logic for the job lifecycle: payment request creation, payment
//! confirmation handling, task execution and status queries.

use masumi_core::domain::job::{Job, JobTransition};
use masumi_core::domain::payment::{Amount, PaymentStatus};
use masumi_core::dto::agent::{AgentAvailability, AvailabilityStatus};
use masumi_core::dto::job::{JobStatusResponse, StartJobRequest, StartJobResponse};
use masumi_core::hash;
use masumi_payment::{AgentIdentity, ClientError, PaymentGateway, PaymentRequest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::executor::{TaskExecutor, preview};
use crate::repository::{JobRepository, StoreError};
use crate::scheduler::{PaymentEvent, PaymentMonitor};

/// Agent identifier reported before registration provides one
pub const DEFAULT_AGENT_IDENTIFIER: &str = "demo-agent";

/// Capacity of the payment event channel
const EVENT_BUFFER: usize = 256;

/// Service error type
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("job {0} not found")]
    NotFound(String),

    #[error("payment request failed: {0}")]
    PaymentRequest(#[source] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables of the job service
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Price charged for every job
    pub amounts: Vec<Amount>,
    /// Delay between two payment status checks
    pub poll_interval: Duration,
    /// Payment window, `None` waits for payment indefinitely
    pub payment_timeout: Option<Duration>,
    /// Maximum number of jobs awaiting payment or running at once
    pub max_active_jobs: Option<usize>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            amounts: vec![Amount::new(10_000_000, "lovelace")],
            poll_interval: Duration::from_secs(10),
            payment_timeout: None,
            max_active_jobs: None,
        }
    }
}

/// Agent identity as exposed in API responses
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    agent_identifier: String,
    seller_vkey: String,
}

/// Job slots bounded by `max_active_jobs`
///
/// A slot is taken before the payment request is issued and held until the
/// job reaches a terminal state.
struct Capacity {
    limit: usize,
    slots: Arc<Semaphore>,
    held: Mutex<HashMap<Uuid, OwnedSemaphorePermit>>,
}

impl Capacity {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            slots: Arc::new(Semaphore::new(limit)),
            held: Mutex::new(HashMap::new()),
        }
    }

    fn try_reserve(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.slots).try_acquire_owned().ok()
    }

    fn in_use(&self) -> usize {
        self.limit - self.slots.available_permits()
    }

    async fn hold(&self, job_id: Uuid, permit: OwnedSemaphorePermit) {
        self.held.lock().await.insert(job_id, permit);
    }

    async fn release(&self, job_id: Uuid) {
        if self.held.lock().await.remove(&job_id).is_some() {
            debug!("Released job slot of {}", job_id);
        }
    }
}

/// Job orchestrator
pub struct JobService {
    repository: Arc<dyn JobRepository>,
    gateway: Arc<dyn PaymentGateway>,
    executor: Arc<dyn TaskExecutor>,
    monitor: PaymentMonitor,
    capacity: Option<Capacity>,
    settings: JobSettings,
    identity: RwLock<Identity>,
}

impl JobService {
    /// Creates the service and the receiving end of its payment events
    ///
    /// The caller is responsible for driving the events, see [`JobService::run`].
    pub fn new(
        repository: Arc<dyn JobRepository>,
        gateway: Arc<dyn PaymentGateway>,
        executor: Arc<dyn TaskExecutor>,
        settings: JobSettings,
        identity: AgentIdentity,
    ) -> (Self, mpsc::Receiver<PaymentEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let monitor = PaymentMonitor::new(
            Arc::clone(&gateway),
            tx,
            settings.poll_interval,
            settings.payment_timeout,
        );

        let service = Self {
            repository,
            gateway,
            executor,
            monitor,
            capacity: settings.max_active_jobs.map(Capacity::new),
            settings,
            identity: RwLock::new(Identity::from(identity)),
        };

        (service, rx)
    }

    /// Creates the service and spawns its event loop
    pub fn spawn(
        repository: Arc<dyn JobRepository>,
        gateway: Arc<dyn PaymentGateway>,
        executor: Arc<dyn TaskExecutor>,
        settings: JobSettings,
        identity: AgentIdentity,
    ) -> Arc<Self> {
        let (service, events) = Self::new(repository, gateway, executor, settings, identity);
        let service = Arc::new(service);

        tokio::spawn(Arc::clone(&service).run(events));

        service
    }

    /// Consumes payment events, handling each job in its own task so a slow
    /// executor does not hold up other jobs
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<PaymentEvent>) {
        info!("Job event loop started");

        while let Some(event) = events.recv().await {
            let service = Arc::clone(&self);
            tokio::spawn(async move {
                service.handle_event(event).await;
            });
        }

        info!("Job event loop stopped");
    }

    /// Replaces the agent identity, e.g. after registration
    pub async fn update_identity(&self, identity: AgentIdentity) {
        let mut current = self.identity.write().await;
        let updated = Identity::from(identity);
        info!("Agent identifier set to {}", updated.agent_identifier);
        *current = updated;
    }

    /// Identifier the agent is registered under
    pub async fn agent_identifier(&self) -> String {
        self.identity.read().await.agent_identifier.clone()
    }

    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Validates a start request, creates its payment request and stores a
    /// job awaiting payment
    ///
    /// The job is only stored after the payment request succeeded, so a
    /// payment failure never leaves a job behind.
    pub async fn start_job(&self, req: StartJobRequest) -> Result<StartJobResponse, JobError> {
        validate_start_request(&req)?;

        // Dropping the slot on any early return frees it again
        let slot = match &self.capacity {
            Some(capacity) => Some(
                capacity
                    .try_reserve()
                    .ok_or_else(|| JobError::Validation("Agent is at capacity".to_string()))?,
            ),
            None => None,
        };

        if let Some(text) = req.input_data.get("text") {
            info!("Received job request with input: '{}'", preview(text, 100));
        }

        let identity = self.identity.read().await.clone();
        let input_hash = hash::input_hash(&req.identifier_from_purchaser, &req.input_data);

        let payment = self
            .gateway
            .create_payment_request(&PaymentRequest {
                agent_identifier: identity.agent_identifier.clone(),
                identifier_from_purchaser: req.identifier_from_purchaser.clone(),
                input_hash: input_hash.clone(),
                amounts: self.settings.amounts.clone(),
            })
            .await
            .map_err(|e| {
                error!("Failed to create payment request: {}", e);
                JobError::PaymentRequest(e)
            })?;

        let job = self
            .repository
            .create(Job::new(
                req.identifier_from_purchaser,
                req.input_data,
                payment.blockchain_identifier.clone(),
                input_hash,
            ))
            .await?;

        info!(
            "Job {} created, awaiting payment {}",
            job.id, job.payment_id
        );

        if let (Some(capacity), Some(slot)) = (&self.capacity, slot) {
            capacity.hold(job.id, slot).await;
        }

        self.monitor.spawn(job.id, job.payment_id.clone());

        Ok(StartJobResponse {
            status: "success".to_string(),
            job_id: job.id,
            blockchain_identifier: payment.blockchain_identifier,
            submit_result_time: payment.submit_result_time,
            unlock_time: payment.unlock_time,
            external_dispute_unlock_time: payment.external_dispute_unlock_time,
            agent_identifier: identity.agent_identifier,
            seller_vkey: identity.seller_vkey,
            identifier_from_purchaser: job.identifier_from_purchaser,
            amounts: self.settings.amounts.clone(),
            input_hash: job.input_hash,
        })
    }

    /// Returns the state of a job, refreshing its payment status on the way
    ///
    /// The refresh is best effort: when the payment service cannot be
    /// reached the payment status becomes `error` and the job is still
    /// returned. Completed and failed jobs are not refreshed.
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatusResponse, JobError> {
        let id = Uuid::parse_str(job_id).map_err(|_| JobError::NotFound(job_id.to_string()))?;

        let job = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            return Ok(job.into());
        }

        let payment_status = match self.gateway.check_payment_status(&job.payment_id).await {
            Ok(state) => state.status(),
            Err(e) => {
                warn!("Error checking payment status for job {}: {}", id, e);
                PaymentStatus::Error
            }
        };

        debug!("Payment status for job {}: {}", id, payment_status);

        let job = self
            .repository
            .transition(id, JobTransition::RecordPaymentStatus(payment_status))
            .await?;

        Ok(job.into())
    }

    /// Reports whether the agent accepts new jobs
    pub async fn availability(&self) -> Result<AgentAvailability, JobError> {
        let agent_identifier = self.agent_identifier().await;

        if let Some(capacity) = &self.capacity {
            if capacity.in_use() >= capacity.limit {
                let active = self.repository.count_active().await?;
                return Ok(AgentAvailability {
                    status: AvailabilityStatus::Unavailable,
                    agent_identifier,
                    message: format!("The agent is busy with {} active jobs.", active),
                });
            }
        }

        Ok(AgentAvailability {
            status: AvailabilityStatus::Available,
            agent_identifier,
            message: "The server is running smoothly.".to_string(),
        })
    }

    // =============================================================================
    // Payment Events
    // =============================================================================

    /// Applies a payment event to its job
    ///
    /// Events for jobs that already left `awaiting_payment` are ignored, so a
    /// repeated confirmation never runs a task twice.
    pub async fn handle_event(&self, event: PaymentEvent) {
        match event {
            PaymentEvent::Confirmed { job_id, payment_id } => {
                self.process_payment(job_id, &payment_id).await
            }
            PaymentEvent::Expired { job_id, payment_id } => {
                self.expire_payment(job_id, &payment_id).await
            }
        }
    }

    async fn process_payment(&self, job_id: Uuid, payment_id: &str) {
        let job = match self
            .repository
            .transition(job_id, JobTransition::StartRunning)
            .await
        {
            Ok(job) => job,
            Err(StoreError::InvalidTransition(e)) => {
                debug!("Ignoring payment confirmation for job {}: {}", job_id, e);
                return;
            }
            Err(e) => {
                error!("Cannot start job {}: {}", job_id, e);
                return;
            }
        };

        info!(
            "Payment {} completed for job {}, executing task...",
            payment_id, job_id
        );

        match self.executor.execute(job_id, &job.input_data).await {
            Ok(result) => {
                let result_hash = hash::result_hash(&result);

                if let Err(e) = self
                    .repository
                    .transition(job_id, JobTransition::Complete { result })
                    .await
                {
                    error!("Cannot complete job {}: {}", job_id, e);
                    return;
                }

                info!("Task completed for job {}", job_id);
                self.release_slot(job_id).await;

                match self.gateway.complete_payment(payment_id, &result_hash).await {
                    Ok(()) => info!("Payment {} completed for job {}", payment_id, job_id),
                    Err(e) => error!(
                        "Failed to submit result for payment {} of job {}: {}",
                        payment_id, job_id, e
                    ),
                }
            }
            Err(e) => {
                error!("Error processing task for job {}: {}", job_id, e);
                self.fail_job(job_id, e.to_string()).await;
            }
        }
    }

    async fn expire_payment(&self, job_id: Uuid, payment_id: &str) {
        info!("Payment {} for job {} expired", payment_id, job_id);
        self.fail_job(job_id, "payment not received before deadline".to_string())
            .await;
    }

    async fn fail_job(&self, job_id: Uuid, error: String) {
        match self
            .repository
            .transition(job_id, JobTransition::Fail { error })
            .await
        {
            Ok(_) => {
                info!("Job {} failed", job_id);
                self.release_slot(job_id).await;
            }
            Err(StoreError::InvalidTransition(e)) => {
                debug!("Not failing job {}: {}", job_id, e)
            }
            Err(e) => error!("Cannot fail job {}: {}", job_id, e),
        }
    }

    async fn release_slot(&self, job_id: Uuid) {
        if let Some(capacity) = &self.capacity {
            capacity.release(job_id).await;
        }
    }
}

impl From<AgentIdentity> for Identity {
    fn from(identity: AgentIdentity) -> Self {
        Self {
            agent_identifier: identity
                .agent_identifier
                .unwrap_or_else(|| DEFAULT_AGENT_IDENTIFIER.to_string()),
            seller_vkey: identity.seller_vkey.unwrap_or_default(),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_start_request(req: &StartJobRequest) -> Result<(), JobError> {
    if req.identifier_from_purchaser.trim().is_empty() {
        return Err(JobError::Validation(
            "identifier_from_purchaser must not be empty".to_string(),
        ));
    }

    match req.input_data.get("text") {
        Some(text) if !text.trim().is_empty() => Ok(()),
        Some(_) => Err(JobError::Validation(
            "input_data.text must not be empty".to_string(),
        )),
        None => Err(JobError::Validation(
            "Missing required field in request schema: input_data.text".to_string(),
        )),
    }
}

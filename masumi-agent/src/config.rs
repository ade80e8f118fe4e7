//! Agent configuration
//!
//! Every setting can be given as a command-line flag or an environment
//! variable. A `.env` file in the working directory is loaded before parsing,
//! and the identity assigned by the registry is written back to it.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use masumi_core::domain::payment::Amount;
use masumi_payment::{
    AgentIdentity, AgentProfile, AgentRegistry, MasumiGateway, PaymentClient, PaymentGateway,
    RegistryClient, StubPaymentGateway, StubRegistry,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::executor::{StubExecutor, TaskExecutor, WebhookExecutor};
use crate::service::JobSettings;

/// Environment file read at startup
pub const ENV_FILE: &str = ".env";

/// Payment backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PaymentMode {
    /// Masumi payment service
    Masumi,
    /// In-memory payments confirmed after a few checks
    Stub,
}

/// Task backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutorMode {
    /// Forward jobs to a webhook
    Webhook,
    /// Answer with canned responses
    Stub,
}

/// Agent configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "masumi-agent", version, about = "Pay-per-job text agent")]
pub struct Config {
    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "PORT", default_value_t = 6666)]
    pub port: u16,

    /// Public host name, used for the registry API base URL
    #[arg(long, env = "SERVER_NAME", default_value = "localhost")]
    pub server_name: String,

    /// Identifier of the agent on the registry
    #[arg(long, env = "AGENT_IDENTIFIER")]
    pub agent_identifier: Option<String>,

    /// Verification key of the selling wallet
    #[arg(long, env = "SELLER_VKEY")]
    pub seller_vkey: Option<String>,

    /// Base URL of the Masumi payment service
    #[arg(long, env = "MASUMI_PAYMENT_BASE_URL")]
    pub payment_base_url: Option<String>,

    /// API key of the Masumi payment service
    #[arg(long, env = "MASUMI_PAYMENT_TOKEN", hide_env_values = true)]
    pub payment_token: Option<String>,

    /// API key used for registry calls, defaults to the payment token
    #[arg(long, env = "MASUMI_REGISTRY_TOKEN", hide_env_values = true)]
    pub registry_token: Option<String>,

    /// Seconds before a payment or registry request is abandoned
    #[arg(long, env = "MASUMI_REQUEST_TIMEOUT", default_value_t = 30)]
    pub payment_request_timeout_secs: u64,

    /// Cardano network
    #[arg(long, env = "MASUMI_NETWORK", default_value = "Preprod")]
    pub network: String,

    /// Price of one job
    #[arg(long, env = "PAYMENT_AMOUNT", default_value_t = 10_000_000)]
    pub payment_amount: u64,

    /// Unit of the job price
    #[arg(long, env = "PAYMENT_UNIT", default_value = "lovelace")]
    pub payment_unit: String,

    /// Payment backend
    #[arg(long, env = "PAYMENT_MODE", value_enum, default_value_t = PaymentMode::Masumi)]
    pub payment_mode: PaymentMode,

    /// Number of status checks before a stub payment is confirmed
    #[arg(long, env = "STUB_CONFIRM_AFTER", default_value_t = 1)]
    pub stub_confirm_after: u32,

    /// Task backend
    #[arg(long, env = "EXECUTOR_MODE", value_enum, default_value_t = ExecutorMode::Webhook)]
    pub executor_mode: ExecutorMode,

    /// Webhook receiving paid jobs
    #[arg(long, env = "N8N_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds
    #[arg(long, env = "WEBHOOK_TIMEOUT", default_value_t = 300)]
    pub webhook_timeout_secs: u64,

    /// Seconds between two payment status checks
    #[arg(long, env = "PAYMENT_POLL_INTERVAL", default_value_t = 10)]
    pub payment_poll_interval_secs: u64,

    /// Seconds to wait for a payment before failing the job
    #[arg(long, env = "PAYMENT_TIMEOUT")]
    pub payment_timeout_secs: Option<u64>,

    /// Maximum number of jobs awaiting payment or running at once
    #[arg(long, env = "MAX_ACTIVE_JOBS")]
    pub max_active_jobs: Option<usize>,

    /// Skip the registry check at startup
    #[arg(long, env = "SKIP_REGISTRATION")]
    pub skip_registration: bool,
}

impl Config {
    /// Loads `.env` and parses flags and environment variables
    pub fn load() -> Self {
        dotenvy::from_path(ENV_FILE).ok();
        Self::parse()
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.payment_poll_interval_secs == 0 {
            anyhow::bail!("payment poll interval must be greater than 0");
        }

        if self.payment_request_timeout_secs == 0 {
            anyhow::bail!("payment request timeout must be greater than 0");
        }

        if self.payment_timeout_secs == Some(0) {
            anyhow::bail!("payment timeout must be greater than 0");
        }

        if self.max_active_jobs == Some(0) {
            anyhow::bail!("max active jobs must be greater than 0");
        }

        if self.payment_unit.is_empty() {
            anyhow::bail!("payment unit cannot be empty");
        }

        if self.payment_mode == PaymentMode::Masumi {
            let url = self
                .payment_base_url
                .as_deref()
                .context("MASUMI_PAYMENT_BASE_URL is required in masumi payment mode")?;
            validate_url("payment base URL", url)?;

            if self.payment_token.as_deref().unwrap_or_default().is_empty() {
                anyhow::bail!("MASUMI_PAYMENT_TOKEN is required in masumi payment mode");
            }
        }

        if self.executor_mode == ExecutorMode::Webhook {
            let url = self
                .webhook_url
                .as_deref()
                .context("N8N_WEBHOOK_URL is required in webhook executor mode")?;
            validate_url("webhook URL", url)?;
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public URL under which purchasers reach the agent
    pub fn api_base_url(&self) -> String {
        format!("https://{}", self.server_name)
    }

    /// Identity configured before registration
    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            agent_identifier: self.agent_identifier.clone(),
            seller_vkey: self.seller_vkey.clone(),
        }
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            amounts: vec![Amount::new(self.payment_amount, self.payment_unit.clone())],
            poll_interval: Duration::from_secs(self.payment_poll_interval_secs),
            payment_timeout: self.payment_timeout_secs.map(Duration::from_secs),
            max_active_jobs: self.max_active_jobs,
        }
    }

    fn payment_client(&self, token: Option<&str>) -> Result<PaymentClient> {
        let url = self
            .payment_base_url
            .as_deref()
            .context("MASUMI_PAYMENT_BASE_URL is not set")?;
        PaymentClient::with_timeout(
            url,
            token.unwrap_or_default(),
            self.network.clone(),
            Duration::from_secs(self.payment_request_timeout_secs),
        )
        .context("Failed to build payment service client")
    }

    /// Builds the configured payment gateway
    pub fn payment_gateway(&self) -> Result<Arc<dyn PaymentGateway>> {
        match self.payment_mode {
            PaymentMode::Masumi => {
                let client = self.payment_client(self.payment_token.as_deref())?;
                Ok(Arc::new(MasumiGateway::new(client)))
            }
            PaymentMode::Stub => Ok(Arc::new(StubPaymentGateway::new(self.stub_confirm_after))),
        }
    }

    /// Builds the configured task executor
    pub fn task_executor(&self) -> Result<Arc<dyn TaskExecutor>> {
        match self.executor_mode {
            ExecutorMode::Webhook => {
                let url = self
                    .webhook_url
                    .as_deref()
                    .context("N8N_WEBHOOK_URL is not set")?;
                let executor =
                    WebhookExecutor::new(url, Duration::from_secs(self.webhook_timeout_secs))
                        .context("Failed to build webhook client")?;
                Ok(Arc::new(executor))
            }
            ExecutorMode::Stub => Ok(Arc::new(StubExecutor::new(Duration::from_secs(2)))),
        }
    }

    /// Builds the registry matching the payment backend
    pub fn agent_registry(&self) -> Result<Arc<dyn AgentRegistry>> {
        match self.payment_mode {
            PaymentMode::Masumi => {
                let token = self
                    .registry_token
                    .as_deref()
                    .or(self.payment_token.as_deref());
                let client = self.payment_client(token)?;
                let profile = AgentProfile::text_agent(
                    self.api_base_url(),
                    self.payment_amount,
                    &self.payment_unit,
                );
                Ok(Arc::new(RegistryClient::new(client, profile, self.identity())))
            }
            PaymentMode::Stub => Ok(Arc::new(StubRegistry::new(self.identity()))),
        }
    }
}

/// Writes the registered identity into an env file
///
/// Existing `AGENT_IDENTIFIER` and `SELLER_VKEY` lines are replaced, missing
/// ones appended, every other line is kept. Unset values are skipped.
pub fn persist_identity(path: &Path, identity: &AgentIdentity) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let updates = [
        ("AGENT_IDENTIFIER", identity.agent_identifier.as_deref()),
        ("SELLER_VKEY", identity.seller_vkey.as_deref()),
    ];

    for (key, value) in updates {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };

        let entry = format!("{}={}", key, value);
        let prefix = format!("{}=", key);
        match lines.iter_mut().find(|line| line.trim_start().starts_with(&prefix)) {
            Some(line) => *line = entry,
            None => lines.push(entry),
        }
    }

    let mut updated = lines.join("\n");
    updated.push('\n');

    std::fs::write(path, updated).with_context(|| format!("Failed to write {}", path.display()))
}

fn validate_url(name: &str, url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(())
}

//! Webhook executor
//!
//! Posts the job text to a remote workflow endpoint and returns the response
//! body as the job result.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{ExecutionError, TaskExecutor, input_text, preview};

/// Executor backed by a remote webhook
#[derive(Debug, Clone)]
pub struct WebhookExecutor {
    client: Client,
    webhook_url: String,
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    text: &'a str,
    job_id: Uuid,
}

impl WebhookExecutor {
    /// Creates a webhook executor with a per-request timeout
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, ExecutionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(webhook_url, client))
    }

    /// Creates a webhook executor with a custom HTTP client
    pub fn with_client(webhook_url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl TaskExecutor for WebhookExecutor {
    async fn execute(
        &self,
        job_id: Uuid,
        input_data: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, ExecutionError> {
        let text = input_text(input_data)?;
        info!("Forwarding job {} to webhook: {}", job_id, preview(text, 100));

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookRequest { text, job_id })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExecutionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::Value::String(body))
    }
}

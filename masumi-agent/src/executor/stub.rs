//! Canned-response executor

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{ExecutionError, TaskExecutor, input_text, preview};

/// Executor that simulates processing and returns a canned answer
#[derive(Debug, Clone, Default)]
pub struct StubExecutor {
    delay: Duration,
}

impl StubExecutor {
    /// Creates a stub executor that waits `delay` before answering
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    fn respond(text: &str) -> String {
        let lower = text.to_lowercase();
        let subject = text.split_whitespace().last().unwrap_or_default();

        if lower.contains("story") {
            format!(
                "Once upon a time, there was a {}. \
                 They lived in a world of wonder and amazement. \
                 Every day brought new adventures and discoveries. \
                 And they lived happily ever after.",
                subject
            )
        } else if lower.contains("summary") {
            format!(
                "This is a summary about {}. \
                 It contains the most important points in a concise format.",
                subject
            )
        } else {
            format!("Processed result for: {}", text)
        }
    }
}

#[async_trait]
impl TaskExecutor for StubExecutor {
    async fn execute(
        &self,
        job_id: Uuid,
        input_data: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, ExecutionError> {
        let text = input_text(input_data)?;
        info!("Executing stub task for job {}: {}", job_id, preview(text, 100));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(json!({ "raw": Self::respond(text) }))
    }
}

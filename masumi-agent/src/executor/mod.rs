//! Task execution layer
//!
//! Executors turn a paid job's input into its result. The webhook executor
//! forwards the text to a remote workflow; the stub executor answers with a
//! canned response for local development.
//!
//! All executors are trait-based so the orchestrator can be tested without a
//! remote backend.

mod stub;
mod webhook;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

pub use stub::StubExecutor;
pub use webhook::WebhookExecutor;

/// Errors produced while executing a task
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("input field '{0}' is missing")]
    MissingInput(&'static str),

    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Backend producing a job's result from its input
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executes the task for a job
    ///
    /// # Arguments
    /// * `job_id` - The job being executed
    /// * `input_data` - The purchaser's input, containing at least `text`
    async fn execute(
        &self,
        job_id: Uuid,
        input_data: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, ExecutionError>;
}

/// Extracts the `text` field every executor requires
pub(crate) fn input_text(input_data: &BTreeMap<String, String>) -> Result<&str, ExecutionError> {
    input_data
        .get("text")
        .map(String::as_str)
        .ok_or(ExecutionError::MissingInput("text"))
}

/// Shortens text for log output without splitting a character
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn test_input_text_missing() {
        let input = BTreeMap::new();
        assert!(matches!(
            input_text(&input),
            Err(ExecutionError::MissingInput("text"))
        ));
    }
}

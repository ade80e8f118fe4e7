//! Agent metadata DTOs
//!
//! Static descriptions of the agent served to purchasers and monitors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One accepted input field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDataField {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
}

/// Description of the input a job accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSchema {
    pub input_data: Vec<InputDataField>,
}

impl InputSchema {
    /// Schema of the text-processing agent: a single free-text field
    pub fn text_task() -> Self {
        let mut data = BTreeMap::new();
        data.insert(
            "description".to_string(),
            "The text you want the agent to process".to_string(),
        );
        data.insert(
            "placeholder".to_string(),
            "Write a story about a robot learning to paint".to_string(),
        );

        Self {
            input_data: vec![InputDataField {
                id: "text".to_string(),
                field_type: "string".to_string(),
                name: "Task Description".to_string(),
                data,
            }],
        }
    }
}

/// Agent availability report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAvailability {
    pub status: AvailabilityStatus,
    #[serde(rename = "agentIdentifier")]
    pub agent_identifier: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
}

/// Health check body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
}

impl HealthCheck {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

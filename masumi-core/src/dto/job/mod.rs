//! Job DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};
use crate::domain::payment::{Amount, PaymentStatus};

/// Request to start a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub identifier_from_purchaser: String,
    pub input_data: BTreeMap<String, String>,
}

/// Payment details returned when a job is started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub status: String,
    pub job_id: Uuid,
    #[serde(rename = "blockchainIdentifier")]
    pub blockchain_identifier: String,
    #[serde(rename = "submitResultTime")]
    pub submit_result_time: i64,
    #[serde(rename = "unlockTime")]
    pub unlock_time: i64,
    #[serde(rename = "externalDisputeUnlockTime")]
    pub external_dispute_unlock_time: i64,
    #[serde(rename = "agentIdentifier")]
    pub agent_identifier: String,
    #[serde(rename = "sellerVkey")]
    pub seller_vkey: String,
    #[serde(rename = "identifierFromPurchaser")]
    pub identifier_from_purchaser: String,
    pub amounts: Vec<Amount>,
    pub input_hash: String,
}

/// Query string of the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusQuery {
    pub job_id: String,
}

/// Current state of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub payment_status: PaymentStatus,
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            payment_status: job.payment_status,
            result: job.result,
            error: job.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobTransition;

    #[test]
    fn test_start_job_response_uses_api_field_names() {
        let response = StartJobResponse {
            status: "success".to_string(),
            job_id: Uuid::nil(),
            blockchain_identifier: "bc".to_string(),
            submit_result_time: 1,
            unlock_time: 2,
            external_dispute_unlock_time: 3,
            agent_identifier: "agent".to_string(),
            seller_vkey: "vkey".to_string(),
            identifier_from_purchaser: "p1".to_string(),
            amounts: vec![Amount::new(5, "lovelace")],
            input_hash: "h".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["blockchainIdentifier"], "bc");
        assert_eq!(json["externalDisputeUnlockTime"], 3);
        assert_eq!(json["identifierFromPurchaser"], "p1");
        assert_eq!(json["input_hash"], "h");
        assert_eq!(json["amounts"][0]["amount"], "5");
    }

    #[test]
    fn test_status_response_from_failed_job() {
        let mut job = Job::new(
            "p1".to_string(),
            BTreeMap::new(),
            "bc".to_string(),
            "h".to_string(),
        );
        job.apply(JobTransition::Fail {
            error: "webhook down".to_string(),
        })
        .unwrap();

        let json = serde_json::to_value(JobStatusResponse::from(job)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["payment_status"], "pending");
        assert_eq!(json["result"], serde_json::Value::Null);
        assert_eq!(json["error"], "webhook down");
    }

    #[test]
    fn test_status_response_omits_error_when_absent() {
        let job = Job::new(
            "p1".to_string(),
            BTreeMap::new(),
            "bc".to_string(),
            "h".to_string(),
        );
        let json = serde_json::to_value(JobStatusResponse::from(job)).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("result").is_some());
    }
}

//! Payment endpoints

use masumi_core::domain::payment::Amount;
use serde::{Deserialize, Deserializer, Serialize};

use crate::PaymentClient;
use crate::error::Result;

/// Payment type understood by the payment service for Cardano payments
const PAYMENT_TYPE: &str = "Web3CardanoV1";

/// Body of `POST /payment/`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub agent_identifier: String,
    pub network: String,
    pub input_hash: String,
    pub identifier_from_purchaser: String,
    pub payment_type: String,
    pub pay_by_time: String,
    pub submit_result_time: String,
    pub amounts: Vec<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Payment request issued by the payment service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentData {
    pub blockchain_identifier: String,
    #[serde(deserialize_with = "timestamp")]
    pub submit_result_time: i64,
    #[serde(deserialize_with = "timestamp")]
    pub unlock_time: i64,
    #[serde(deserialize_with = "timestamp")]
    pub external_dispute_unlock_time: i64,
}

/// Entry of the payment listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub blockchain_identifier: String,
    #[serde(default)]
    pub on_chain_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentList {
    #[serde(rename = "Payments", default)]
    payments: Vec<PaymentRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResult<'a> {
    network: &'a str,
    blockchain_identifier: &'a str,
    submit_result_hash: &'a str,
}

/// The payment service reports times either as numbers or numeric strings
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

impl CreatePayment {
    /// Builds the request body with the payment type this agent uses
    pub fn new(
        agent_identifier: String,
        network: String,
        input_hash: String,
        identifier_from_purchaser: String,
        amounts: Vec<Amount>,
        pay_by_time: i64,
        submit_result_time: i64,
    ) -> Self {
        Self {
            agent_identifier,
            network,
            input_hash,
            identifier_from_purchaser,
            payment_type: PAYMENT_TYPE.to_string(),
            pay_by_time: pay_by_time.to_string(),
            submit_result_time: submit_result_time.to_string(),
            amounts,
            metadata: None,
        }
    }
}

impl PaymentClient {
    /// Create a payment request that a purchaser can pay on-chain
    pub async fn create_payment(&self, req: &CreatePayment) -> Result<CreatePaymentData> {
        let response = self.post("/payment/").json(req).send().await?;

        self.handle_response(response).await
    }

    /// List the most recent payments of this agent's network
    pub async fn list_payments(&self, limit: u32) -> Result<Vec<PaymentRecord>> {
        let limit = limit.to_string();
        let response = self
            .get("/payment/")
            .query(&[("network", self.network.as_str()), ("limit", limit.as_str())])
            .send()
            .await?;

        let list: PaymentList = self.handle_response(response).await?;
        Ok(list.payments)
    }

    /// Find a payment by its blockchain identifier among the recent payments
    pub async fn find_payment(
        &self,
        blockchain_identifier: &str,
        limit: u32,
    ) -> Result<Option<PaymentRecord>> {
        let payments = self.list_payments(limit).await?;

        Ok(payments
            .into_iter()
            .find(|payment| payment.blockchain_identifier == blockchain_identifier))
    }

    /// Submit the hash of a job result, finalizing the payment
    pub async fn submit_result(&self, blockchain_identifier: &str, result_hash: &str) -> Result<()> {
        let response = self
            .post("/payment/submit-result")
            .json(&SubmitResult {
                network: &self.network,
                blockchain_identifier,
                submit_result_hash: result_hash,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_payment_body() {
        let req = CreatePayment::new(
            "agent".to_string(),
            "Preprod".to_string(),
            "hash".to_string(),
            "p1".to_string(),
            vec![Amount::new(10, "lovelace")],
            1000,
            2000,
        );

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["agentIdentifier"], "agent");
        assert_eq!(json["paymentType"], "Web3CardanoV1");
        assert_eq!(json["payByTime"], "1000");
        assert_eq!(json["submitResultTime"], "2000");
        assert_eq!(json["identifierFromPurchaser"], "p1");
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_create_payment_data_accepts_string_times() {
        let data: CreatePaymentData = serde_json::from_value(serde_json::json!({
            "blockchainIdentifier": "bc-1",
            "submitResultTime": "1700000000000",
            "unlockTime": 1700000100000i64,
            "externalDisputeUnlockTime": "1700000200000",
            "payByTime": "1699999000000"
        }))
        .unwrap();

        assert_eq!(data.blockchain_identifier, "bc-1");
        assert_eq!(data.submit_result_time, 1_700_000_000_000);
        assert_eq!(data.unlock_time, 1_700_000_100_000);
        assert_eq!(data.external_dispute_unlock_time, 1_700_000_200_000);
    }

    #[test]
    fn test_create_payment_data_rejects_garbage_time() {
        let result = serde_json::from_value::<CreatePaymentData>(serde_json::json!({
            "blockchainIdentifier": "bc-1",
            "submitResultTime": "soon",
            "unlockTime": 1,
            "externalDisputeUnlockTime": 2
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_payment_list_without_state() {
        let list: PaymentList = serde_json::from_value(serde_json::json!({
            "Payments": [
                { "blockchainIdentifier": "a", "onChainState": null },
                { "blockchainIdentifier": "b", "onChainState": "FundsLocked" }
            ]
        }))
        .unwrap();

        assert_eq!(list.payments.len(), 2);
        assert!(list.payments[0].on_chain_state.is_none());
        assert_eq!(list.payments[1].on_chain_state.as_deref(), Some("FundsLocked"));
    }
}

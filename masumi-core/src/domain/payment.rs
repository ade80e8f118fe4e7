//! Payment domain types

use serde::{Deserialize, Serialize};

/// Price component of a payment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub amount: String,
    pub unit: String,
}

impl Amount {
    pub fn new(amount: u64, unit: impl Into<String>) -> Self {
        Self {
            amount: amount.to_string(),
            unit: unit.into(),
        }
    }
}

/// Payment status as reported to purchasers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Error,
    Unknown,
}

impl PaymentStatus {
    /// Maps an on-chain payment state reported by the payment service.
    ///
    /// A payment without an on-chain state has not been picked up by the
    /// ledger yet and is still pending.
    pub fn from_on_chain_state(state: Option<&str>) -> Self {
        match state {
            None | Some("") | Some("PaymentRequested") => PaymentStatus::Pending,
            Some("FundsLocked") | Some("ResultSubmitted") | Some("Withdrawn") => {
                PaymentStatus::Completed
            }
            Some("RefundRequested")
            | Some("Disputed")
            | Some("RefundWithdrawn")
            | Some("DisputedWithdrawn")
            | Some("FundsOrDatumInvalid") => PaymentStatus::Error,
            Some(_) => PaymentStatus::Unknown,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Error => write!(f, "error"),
            PaymentStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_chain_state_mapping() {
        assert_eq!(PaymentStatus::from_on_chain_state(None), PaymentStatus::Pending);
        assert_eq!(
            PaymentStatus::from_on_chain_state(Some("FundsLocked")),
            PaymentStatus::Completed
        );
        assert_eq!(
            PaymentStatus::from_on_chain_state(Some("Disputed")),
            PaymentStatus::Error
        );
        assert_eq!(
            PaymentStatus::from_on_chain_state(Some("SomethingNew")),
            PaymentStatus::Unknown
        );
    }

    #[test]
    fn test_amount_serializes_as_string() {
        let amount = Amount::new(10_000_000, "lovelace");
        let json = serde_json::to_value(&amount).unwrap();
        assert_eq!(json, serde_json::json!({ "amount": "10000000", "unit": "lovelace" }));
    }
}

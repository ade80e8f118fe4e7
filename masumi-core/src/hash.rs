//! Digests exchanged with the payment service
//!
//! Both hashes are lowercase hex SHA-256.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hash binding a purchaser to the exact input they paid for.
///
/// The input map is serialized as JSON with sorted keys, so the hash does not
/// depend on the order the purchaser sent the fields in.
pub fn input_hash(identifier_from_purchaser: &str, input_data: &BTreeMap<String, String>) -> String {
    let canonical = serde_json::json!(input_data).to_string();
    sha256_hex(format!("{};{}", identifier_from_purchaser, canonical).as_bytes())
}

/// Hash of a job result submitted when finalizing the payment
pub fn result_hash(result: &serde_json::Value) -> String {
    match result {
        serde_json::Value::String(text) => sha256_hex(text.as_bytes()),
        other => sha256_hex(other.to_string().as_bytes()),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

//! Masumi Payment Client
//!
//! HTTP client for the Masumi payment and registry service, plus the
//! collaborator traits the agent service is written against.
//!
//! The crate is organized in three layers:
//! - `PaymentClient`: typed access to the payment service endpoints
//!   (payment requests, payment listing, result submission, registry)
//! - `PaymentGateway`: the operations the agent needs from a payment
//!   backend, implemented by `MasumiGateway` and `StubPaymentGateway`
//! - `AgentRegistry`: startup registration check, implemented by
//!   `RegistryClient` and `StubRegistry`
//!
//! # Example
//!
//! ```no_run
//! use masumi_payment::PaymentClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), masumi_payment::ClientError> {
//!     let client = PaymentClient::new("http://localhost:3001/api/v1", "token", "Preprod")?;
//!     let payments = client.list_payments(10).await?;
//!     println!("{} payments", payments.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod gateway;
mod payments;
pub mod registry;

pub use error::{ClientError, Result};
pub use gateway::{
    MasumiGateway, PaymentGateway, PaymentRequest, PaymentRequestInfo, PaymentState,
    StubPaymentGateway,
};
pub use payments::{CreatePaymentData, PaymentRecord};
pub use registry::{AgentIdentity, AgentProfile, AgentRegistry, RegistryClient, StubRegistry};

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Header carrying the payment service API key
const TOKEN_HEADER: &str = "token";

/// Request timeout used by [`PaymentClient::new`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Masumi payment service
#[derive(Debug, Clone)]
pub struct PaymentClient {
    /// Base URL of the payment service (e.g., "http://localhost:3001/api/v1")
    base_url: String,
    /// API key sent with every request
    token: String,
    /// Cardano network the agent operates on ("Preprod" or "Mainnet")
    network: String,
    /// HTTP client instance
    client: Client,
}

/// Envelope wrapping every payment service response
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

impl PaymentClient {
    /// Create a new payment client with the default request timeout
    ///
    /// # Example
    /// ```
    /// use masumi_payment::PaymentClient;
    ///
    /// let client = PaymentClient::new("http://localhost:3001/api/v1/", "token", "Preprod")?;
    /// assert_eq!(client.base_url(), "http://localhost:3001/api/v1");
    /// # Ok::<(), masumi_payment::ClientError>(())
    /// ```
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        network: impl Into<String>,
    ) -> Result<Self> {
        Self::with_timeout(base_url, token, network, DEFAULT_TIMEOUT)
    }

    /// Create a new payment client whose requests fail after `timeout`
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        network: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, token, network, client))
    }

    /// Create a new payment client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        network: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            network: network.into(),
            client,
        }
    }

    /// Get the base URL of the payment service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the network this client targets
    pub fn network(&self) -> &str {
        &self.network
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, &self.token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, &self.token)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and unwrap the `data` envelope of a response
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json::<Envelope<T>>()
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = PaymentClient::new("http://localhost:3001/api/v1", "t", "Preprod").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3001/api/v1");
        assert_eq!(client.network(), "Preprod");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PaymentClient::with_timeout(
            "http://localhost:3001/api/v1/",
            "t",
            "Preprod",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3001/api/v1");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = PaymentClient::with_client("http://localhost:3001", "t", "Mainnet", http_client);
        assert_eq!(client.base_url(), "http://localhost:3001");
        assert_eq!(client.network(), "Mainnet");
    }
}

//! Payment service errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure talking to the payment or registry service
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection or transport failure
    #[error("payment service unreachable: {0}")]
    RequestFailed(#[source] reqwest::Error),

    /// The service accepted the request but did not answer in time
    #[error("payment service timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Non-2xx answer, `message` is the raw response body
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("unexpected response: {0}")]
    ParseError(String),

    /// No payment with this blockchain identifier in the recent listing
    #[error("payment {0} not found")]
    NotFound(String),

    /// The registry answered without assigning an identity
    #[error("registration incomplete: {0}")]
    Registration(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::RequestFailed(err)
        }
    }
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// The payment is unknown, either locally or to the service
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ApiError { status: 404, .. })
    }

    /// Worth retrying: timeouts, transport failures and 5xx answers
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::Timeout(_) => true,
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ClientError::api_error(404, "gone").is_not_found());
        assert!(ClientError::NotFound("bc-1".to_string()).is_not_found());
        assert!(ClientError::api_error(502, "bad gateway").is_transient());
        assert!(!ClientError::api_error(400, "bad").is_transient());
        assert!(!ClientError::Registration("no id".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::api_error(401, "invalid token");
        assert_eq!(err.to_string(), "API error (status 401): invalid token");

        let err = ClientError::NotFound("bc-9".to_string());
        assert_eq!(err.to_string(), "payment bc-9 not found");
    }
}

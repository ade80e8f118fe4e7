//! Registration Service
//!
//! Startup registration with the Masumi registry. The registry may not be
//! reachable yet when the agent boots, so the check is retried with
//! exponential backoff. Rejections such as a bad token are not retried.
//! Giving up is not fatal: the agent keeps serving with its configured
//! identity.

use masumi_payment::{AgentIdentity, AgentRegistry};
use std::time::Duration;
use tracing::{error, info, warn};

/// Retry policy for the registration check
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Ensures the agent is registered, returning its identity on success
pub async fn register_with_retry(
    registry: &dyn AgentRegistry,
    policy: RetryPolicy,
) -> Option<AgentIdentity> {
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        match registry.ensure_registered().await {
            Ok(identity) => {
                if attempt > 1 {
                    info!("Agent registered after {} attempt(s)", attempt);
                }
                return Some(identity);
            }
            Err(e) if !e.is_transient() => {
                error!("Agent registration rejected: {}", e);
                return None;
            }
            Err(e) => {
                if attempt >= policy.max_attempts {
                    error!(
                        "Agent registration failed after {} attempts: {}",
                        attempt, e
                    );
                    return None;
                }

                warn!(
                    "Agent registration failed (attempt {}/{}): {}",
                    attempt, policy.max_attempts, e
                );
                warn!("Retrying in {:?}...", delay);

                tokio::time::sleep(delay).await;

                // Exponential backoff with cap
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use masumi_payment::{ClientError, StubRegistry};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Registry that fails a fixed number of times before succeeding
    struct FlakyRegistry {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AgentRegistry for FlakyRegistry {
        async fn ensure_registered(&self) -> masumi_payment::Result<AgentIdentity> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ClientError::api_error(503, "registry starting"));
            }
            Ok(AgentIdentity {
                agent_identifier: Some("agent-9".to_string()),
                seller_vkey: None,
            })
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_retries() {
        let registry = FlakyRegistry {
            failures: 2,
            calls: AtomicU32::new(0),
        };

        let identity = register_with_retry(&registry, fast_policy(5)).await.unwrap();
        assert_eq!(identity.agent_identifier.as_deref(), Some("agent-9"));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let registry = FlakyRegistry {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };

        assert!(register_with_retry(&registry, fast_policy(3)).await.is_none());
        assert_eq!(registry.calls.load(Ordering::SeqCst), 3);
    }

    /// Registry that always rejects the API key
    struct RejectingRegistry {
        calls: AtomicU32,
    }

    #[async_trait]
    impl AgentRegistry for RejectingRegistry {
        async fn ensure_registered(&self) -> masumi_payment::Result<AgentIdentity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::api_error(401, "invalid token"))
        }
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let registry = RejectingRegistry {
            calls: AtomicU32::new(0),
        };

        assert!(register_with_retry(&registry, fast_policy(5)).await.is_none());
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stub_registry_registers_immediately() {
        let registry = StubRegistry::default();
        let identity = register_with_retry(&registry, fast_policy(1)).await;
        assert_eq!(identity, Some(AgentIdentity::default()));
    }
}

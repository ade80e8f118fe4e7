//! Agent registry
//!
//! Checks that the agent is listed in the Masumi registry and registers it
//! when it is not. Registration happens once at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::PaymentClient;
use crate::error::{ClientError, Result};

/// Public identity of the agent on the registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_identifier: Option<String>,
    pub seller_vkey: Option<String>,
}

/// Metadata published when registering the agent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub api_base_url: String,
    pub capability: Capability,
    pub author: Author,
    pub tags: Vec<String>,
    pub requests_per_hour: String,
    pub pricing: Vec<Pricing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capability {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub name: String,
    pub contact: String,
    pub organization: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pricing {
    pub unit: String,
    pub quantity: String,
}

impl AgentProfile {
    /// Profile of the text-processing agent served at `api_base_url`
    pub fn text_agent(api_base_url: String, amount: u64, unit: &str) -> Self {
        Self {
            name: "Truefact AI Agent".to_string(),
            description: "AI agent that generates factual responses".to_string(),
            api_base_url,
            capability: Capability {
                name: "factual_analysis".to_string(),
                version: "1.0.0".to_string(),
            },
            author: Author {
                name: "TrueFact".to_string(),
                contact: "contact@truefact.ai".to_string(),
                organization: "TrueFact AI".to_string(),
            },
            tags: vec![
                "AI".to_string(),
                "Factual".to_string(),
                "Truefact".to_string(),
            ],
            requests_per_hour: "100".to_string(),
            pricing: vec![Pricing {
                unit: unit.to_string(),
                quantity: amount.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterAgent<'a> {
    network: &'a str,
    #[serde(flatten)]
    profile: &'a AgentProfile,
}

#[derive(Debug, Deserialize)]
struct AssetList {
    #[serde(rename = "Assets", default)]
    assets: Vec<RegisteredAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredAsset {
    agent_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registration {
    agent_identifier: Option<String>,
    selling_wallet: Option<Wallet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Wallet {
    wallet_vkey: Option<String>,
}

impl PaymentClient {
    /// List the agent identifiers registered for a selling wallet
    pub async fn registered_agents(&self, wallet_vkey: &str) -> Result<Vec<String>> {
        let response = self
            .get("/registry/")
            .query(&[("network", self.network.as_str()), ("walletVkey", wallet_vkey)])
            .send()
            .await?;

        let list: AssetList = self.handle_response(response).await?;
        Ok(list
            .assets
            .into_iter()
            .filter_map(|asset| asset.agent_identifier)
            .collect())
    }

    /// Register an agent, returning the identity assigned by the registry
    pub async fn register_agent(&self, profile: &AgentProfile) -> Result<AgentIdentity> {
        let response = self
            .post("/registry/")
            .json(&RegisterAgent {
                network: &self.network,
                profile,
            })
            .send()
            .await?;

        let registration: Registration = self.handle_response(response).await?;
        Ok(AgentIdentity {
            agent_identifier: registration.agent_identifier,
            seller_vkey: registration.selling_wallet.and_then(|w| w.wallet_vkey),
        })
    }
}

/// Registration check performed at startup
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Makes sure the agent is registered and returns its identity
    async fn ensure_registered(&self) -> Result<AgentIdentity>;
}

/// Registry backed by the Masumi payment service
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: PaymentClient,
    profile: AgentProfile,
    configured: AgentIdentity,
}

impl RegistryClient {
    pub fn new(client: PaymentClient, profile: AgentProfile, configured: AgentIdentity) -> Self {
        Self {
            client,
            profile,
            configured,
        }
    }
}

#[async_trait]
impl AgentRegistry for RegistryClient {
    async fn ensure_registered(&self) -> Result<AgentIdentity> {
        info!("Verifying agent registration");

        if let (Some(agent_identifier), Some(vkey)) = (
            &self.configured.agent_identifier,
            &self.configured.seller_vkey,
        ) {
            let registered = self.client.registered_agents(vkey).await?;
            if registered.iter().any(|id| id == agent_identifier) {
                info!("Agent already registered");
                return Ok(self.configured.clone());
            }
            info!("Agent not registered, registering now...");
        }

        let assigned = self.client.register_agent(&self.profile).await?;
        let identity = AgentIdentity {
            agent_identifier: assigned
                .agent_identifier
                .or_else(|| self.configured.agent_identifier.clone()),
            seller_vkey: assigned
                .seller_vkey
                .or_else(|| self.configured.seller_vkey.clone()),
        };

        if identity.agent_identifier.is_none() {
            return Err(ClientError::Registration(
                "registry did not assign an agent identifier".to_string(),
            ));
        }

        info!("Agent registration successful");
        Ok(identity)
    }
}

/// Registry that accepts the configured identity as is
#[derive(Debug, Clone, Default)]
pub struct StubRegistry {
    identity: AgentIdentity,
}

impl StubRegistry {
    pub fn new(identity: AgentIdentity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl AgentRegistry for StubRegistry {
    async fn ensure_registered(&self) -> Result<AgentIdentity> {
        Ok(self.identity.clone())
    }
}

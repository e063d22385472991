//! Startup configuration
//!
//! Everything the core depends on is constructed once from this object:
//! the immutable region registry, the cost model, feed timing, and the
//! per-context cluster clients. Contexts without a configured endpoint get a
//! simulated client, logged explicitly so offline mode is always observable.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cluster::{ClusterResourceClient, HttpClusterClient, SimulatedClusterClient};
use crate::dryrun::CostModel;
use crate::error::Result;
use crate::migrate::{ACTIVE_REPLICAS, DEFAULT_NAMESPACE};
use crate::region::{default_mappings, RegionMapping, RegionRegistry};

/// Price feed timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Seconds between sampling passes
    #[serde(rename = "sampleIntervalSecs")]
    pub sample_interval_secs: u64,

    /// Observation TTL in seconds; keep strictly greater than the interval
    #[serde(rename = "observationTtlSecs")]
    pub observation_ttl_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            sample_interval_secs: 3,
            observation_ttl_secs: 10,
        }
    }
}

impl FeedSettings {
    /// Sampling interval as a [`Duration`]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    /// Observation TTL as a [`Duration`]
    pub fn observation_ttl(&self) -> Duration {
        Duration::from_secs(self.observation_ttl_secs)
    }
}

/// Migration orchestrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Namespace deployable units live in
    pub namespace: String,

    /// Settle delay between scale-up and scale-down, in milliseconds
    #[serde(rename = "settleDelayMs")]
    pub settle_delay_ms: u64,

    /// Replica count a target is scaled up to
    #[serde(rename = "activeReplicas")]
    pub active_replicas: i32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            settle_delay_ms: 1000,
            active_replicas: ACTIVE_REPLICAS,
        }
    }
}

impl OrchestratorSettings {
    /// Settle delay as a [`Duration`]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Live endpoint for one cluster context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    /// Cluster context this endpoint serves
    #[serde(rename = "contextId")]
    pub context_id: String,

    /// Base URL of the cluster API
    #[serde(rename = "baseUrl")]
    pub base_url: String,

    /// Optional bearer token
    #[serde(rename = "bearerToken", default)]
    pub bearer_token: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region to cluster-context mappings
    pub regions: Vec<RegionMapping>,

    /// Dry-run cost model parameters
    #[serde(rename = "costModel")]
    pub cost_model: CostModel,

    /// Price feed timing
    pub feed: FeedSettings,

    /// Migration orchestrator settings
    pub orchestrator: OrchestratorSettings,

    /// Live cluster endpoints; contexts without one run simulated
    pub clusters: Vec<ClusterEndpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: default_mappings(),
            cost_model: CostModel::default(),
            feed: FeedSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            clusters: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Build the immutable region registry
    pub fn registry(&self) -> RegionRegistry {
        RegionRegistry::new(self.regions.clone())
    }

    /// Build one resource client per configured context
    ///
    /// Contexts with a live endpoint get an [`HttpClusterClient`]; the rest
    /// fall back to [`SimulatedClusterClient`] with an explicit warning.
    pub fn build_clients(&self) -> HashMap<String, Arc<dyn ClusterResourceClient>> {
        let mut clients: HashMap<String, Arc<dyn ClusterResourceClient>> = HashMap::new();

        for mapping in &self.regions {
            let endpoint = self
                .clusters
                .iter()
                .find(|c| c.context_id == mapping.context_id);

            let client: Arc<dyn ClusterResourceClient> = match endpoint {
                Some(endpoint) => {
                    let mut client =
                        HttpClusterClient::new(&endpoint.context_id, &endpoint.base_url);
                    if let Some(token) = &endpoint.bearer_token {
                        client = client.with_token(token);
                    }
                    Arc::new(client)
                }
                None => {
                    warn!(
                        context = %mapping.context_id,
                        "No cluster endpoint configured; using simulated client"
                    );
                    Arc::new(SimulatedClusterClient::new(&mapping.context_id))
                }
            };

            clients.insert(mapping.context_id.clone(), client);
        }

        clients
    }
}

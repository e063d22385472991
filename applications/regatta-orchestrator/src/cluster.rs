//! Per-context cluster resource clients
//!
//! Each cluster context is addressed through its own
//! [`ClusterResourceClient`]. Two implementations exist and are selected at
//! construction time:
//!
//! - [`HttpClusterClient`]: live calls against the apps/v1 deployments scale
//!   subresource of a cluster API endpoint, with a bounded per-call timeout.
//! - [`SimulatedClusterClient`]: an in-memory replica map that always
//!   succeeds, for exercising the decision layer without live
//!   infrastructure. Every call is logged with an explicit `simulated`
//!   marker so the mode is never mistaken for a real execution.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};

/// Per-call timeout for live cluster requests
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Scales a named deployable unit within one cluster context
///
/// Calls must be bounded: an implementation returns an error rather than
/// blocking past its timeout. Retries are a caller policy, never performed
/// here.
#[async_trait]
pub trait ClusterResourceClient: Send + Sync {
    /// The cluster context this client addresses
    fn context_id(&self) -> &str;

    /// Set the replica count of a deployable unit
    async fn set_replicas(&self, namespace: &str, name: &str, replicas: i32) -> Result<()>;

    /// Current replica count of a deployable unit, used for idempotent
    /// no-op checks
    async fn get_replicas(&self, namespace: &str, name: &str) -> Result<i32>;
}

/// Live cluster client speaking to the deployments scale subresource
pub struct HttpClusterClient {
    context_id: String,
    base_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl HttpClusterClient {
    /// Create a client for one cluster context
    pub fn new(context_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            base_url: base_url.into(),
            bearer_token: None,
            client: reqwest::Client::builder()
                .timeout(CALL_TIMEOUT)
                .build()
                .unwrap(),
        }
    }

    /// Attach a bearer token for authenticated endpoints
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn scale_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/apis/apps/v1/namespaces/{}/deployments/{}/scale",
            self.base_url.trim_end_matches('/'),
            namespace,
            name
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ClusterResourceClient for HttpClusterClient {
    fn context_id(&self) -> &str {
        &self.context_id
    }

    async fn set_replicas(&self, namespace: &str, name: &str, replicas: i32) -> Result<()> {
        let url = self.scale_url(namespace, name);
        debug!(context = %self.context_id, %name, replicas, "Patching scale subresource");

        let body = serde_json::json!({ "spec": { "replicas": replicas } });
        let request = self
            .client
            .patch(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
            .body(serde_json::to_vec(&body)?);

        self.authorize(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn get_replicas(&self, namespace: &str, name: &str) -> Result<i32> {
        let url = self.scale_url(namespace, name);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?;

        let scale: serde_json::Value = response.json().await?;

        scale
            .pointer("/spec/replicas")
            .and_then(|v| v.as_i64())
            .map(|n| n as i32)
            .ok_or_else(|| {
                OrchestratorError::Cluster(format!(
                    "scale response for {name} in {} is missing spec.replicas",
                    self.context_id
                ))
            })
    }
}

/// Offline cluster client that records replica counts in memory
///
/// Reports success deterministically so the decision layer can be exercised
/// without live connectivity. This mode is selected explicitly at
/// construction and logged on every call; it is never a silent substitute
/// for a real failure.
pub struct SimulatedClusterClient {
    context_id: String,
    replicas: tokio::sync::RwLock<HashMap<String, i32>>,
}

impl SimulatedClusterClient {
    /// Create a simulated client for one cluster context
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            replicas: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    fn unit_key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }
}

#[async_trait]
impl ClusterResourceClient for SimulatedClusterClient {
    fn context_id(&self) -> &str {
        &self.context_id
    }

    async fn set_replicas(&self, namespace: &str, name: &str, replicas: i32) -> Result<()> {
        let mut units = self.replicas.write().await;
        units.insert(Self::unit_key(namespace, name), replicas);

        info!(
            context = %self.context_id,
            %namespace,
            %name,
            replicas,
            simulated = true,
            "Replica scaling applied (no live cluster connectivity)"
        );
        Ok(())
    }

    async fn get_replicas(&self, namespace: &str, name: &str) -> Result<i32> {
        let units = self.replicas.read().await;
        Ok(units
            .get(&Self::unit_key(namespace, name))
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_set_then_get() {
        let client = SimulatedClusterClient::new("ctx-us-east");

        client
            .set_replicas("default", "regatta-us-east", 3)
            .await
            .unwrap();

        let count = client
            .get_replicas("default", "regatta-us-east")
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_simulated_unknown_unit_reports_zero() {
        let client = SimulatedClusterClient::new("ctx-us-east");
        let count = client.get_replicas("default", "regatta-us-east").await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_simulated_scale_down_is_idempotent() {
        let client = SimulatedClusterClient::new("ctx-us-east");

        client.set_replicas("default", "regatta-us-east", 0).await.unwrap();
        client.set_replicas("default", "regatta-us-east", 0).await.unwrap();

        assert_eq!(
            client.get_replicas("default", "regatta-us-east").await.unwrap(),
            0
        );
    }

    #[test]
    fn test_scale_url_shape() {
        let client = HttpClusterClient::new("ctx-eu-west", "https://cluster.example:6443/");
        assert_eq!(
            client.scale_url("default", "regatta-eu-west"),
            "https://cluster.example:6443/apis/apps/v1/namespaces/default/deployments/regatta-eu-west/scale"
        );
    }

    #[test]
    fn test_context_id_reported() {
        let client = SimulatedClusterClient::new("ctx-ap-south");
        assert_eq!(client.context_id(), "ctx-ap-south");
    }
}

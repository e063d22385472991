//! Region to cluster-context mapping
//!
//! A logical region (what users see, e.g. `US-East`) is backed by exactly one
//! cluster context (the API endpoint a workload is currently served from,
//! e.g. `ctx-us-east`). The mapping is loaded at startup and never mutated
//! afterwards; both the price feed and the migration orchestrator consume the
//! same immutable registry.

use serde::{Deserialize, Serialize};

/// Prefix shared by all cluster-context identifiers
pub const CONTEXT_PREFIX: &str = "ctx-";

/// Prefix of every deployable unit managed by this system
pub const DEPLOYABLE_PREFIX: &str = "regatta";

/// One region and the cluster context currently backing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMapping {
    /// Logical region identifier, unique among configured regions
    pub region: String,

    /// Cluster-context identifier backing the region
    #[serde(rename = "contextId")]
    pub context_id: String,
}

impl RegionMapping {
    /// Create a new mapping
    pub fn new(region: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            context_id: context_id.into(),
        }
    }
}

/// The default set of regions served by the system
pub fn default_mappings() -> Vec<RegionMapping> {
    vec![
        RegionMapping::new("US-East", "ctx-us-east"),
        RegionMapping::new("US-West", "ctx-us-west"),
        RegionMapping::new("EU-West", "ctx-eu-west"),
        RegionMapping::new("AP-South", "ctx-ap-south"),
        RegionMapping::new("AP-Northeast", "ctx-ap-northeast"),
    ]
}

/// Immutable region registry, constructed once at startup
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    mappings: Vec<RegionMapping>,
}

impl RegionRegistry {
    /// Build a registry from an explicit list of mappings
    pub fn new(mappings: Vec<RegionMapping>) -> Self {
        Self { mappings }
    }

    /// The configured mappings, in configuration order
    pub fn mappings(&self) -> &[RegionMapping] {
        &self.mappings
    }

    /// Resolve a region to its cluster context
    pub fn resolve(&self, region: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.region == region)
            .map(|m| m.context_id.as_str())
    }

    /// Whether a cluster context is known to the registry
    pub fn context_known(&self, context_id: &str) -> bool {
        self.mappings.iter().any(|m| m.context_id == context_id)
    }

    /// Deployable unit name for a cluster context
    ///
    /// The name is derived deterministically: strip the `ctx-` prefix,
    /// lowercase the remainder, prepend the deployable prefix. For example
    /// `ctx-us-east` names the unit `regatta-us-east`.
    pub fn deployable_name(context_id: &str) -> String {
        let suffix = context_id
            .strip_prefix(CONTEXT_PREFIX)
            .unwrap_or(context_id);
        format!("{}-{}", DEPLOYABLE_PREFIX, suffix.to_lowercase())
    }
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::new(default_mappings())
    }
}

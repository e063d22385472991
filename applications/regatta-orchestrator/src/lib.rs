//! # Regatta Orchestrator
//!
//! Region price arbitrage and workload relocation across cluster contexts.
//!
//! ## Architecture
//!
//! ```text
//! PriceFeed ──writes──▶ ObservationStore ◀──reads── PriceFeed::observations
//!     │                                                  │
//!     └── synthetic per-region samples                   ▼
//!                                              DryRunEvaluator (pure)
//!                                                  │ admitted?
//!                                                  ▼
//!                                        MigrationOrchestrator
//!                                          ├── ScaleUpTarget
//!                                          ├── Settle (cancellable)
//!                                          └── ScaleDownSource
//!                                                  │
//!                                    ClusterResourceClient per context
//!                                      (live HTTP or simulated)
//! ```
//!
//! Each region is backed by exactly one cluster context. The feed keeps a
//! TTL-bounded price/latency observation per region; the dry-run evaluator
//! gates a relocation on projected savings strictly exceeding the one-time
//! egress cost; the orchestrator then executes the two-phase scale
//! transition with explicit partial-failure semantics: a scale-up failure
//! leaves the system unchanged (retriable), a scale-down failure leaves both
//! contexts active (operator attention), and cancellation during the settle
//! delay skips the scale-down entirely.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod config;
pub mod dryrun;
pub mod error;
pub mod feed;
pub mod migrate;
pub mod notify;
pub mod region;
pub mod store;

// Error handling
pub use error::{OrchestratorError, Result};

// Region registry
pub use region::{default_mappings, RegionMapping, RegionRegistry};

// Observation storage and feed
pub use feed::{Observation, PriceFeed, DEFAULT_LATENCY_MS, DEFAULT_PRICE};
pub use store::{MemoryStore, ObservationStore};

// Dry-run evaluation
pub use dryrun::{evaluate, CostModel, DryRunVerdict};

// Cluster resource clients
pub use cluster::{ClusterResourceClient, HttpClusterClient, SimulatedClusterClient};

// Migration orchestration
pub use migrate::{
    MigrationOrchestrator, MigrationReport, MigrationRequest, ACTIVE_REPLICAS,
    DEFAULT_SETTLE_DELAY,
};

// Phase notifications
pub use notify::{BroadcastObserver, LogObserver, MigrationPhase, PhaseEvent, PhaseObserver};

// Configuration
pub use config::{ClusterEndpoint, Config, FeedSettings, OrchestratorSettings};

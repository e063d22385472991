//! Migration orchestration across two cluster contexts
//!
//! Executes a vetted migration as an ordered two-phase resource transition:
//!
//! ```text
//! Migrate(source, target)
//!     │
//!     ├── 1. ScaleUpTarget    target unit → active replica count
//!     │        failure here leaves the system unchanged (safe retry)
//!     │
//!     ├── 2. Settle           fixed grace delay, cancellable
//!     │        cancellation here skips the scale-down entirely
//!     │
//!     └── 3. ScaleDownSource  source unit → 0 replicas
//!              failure here leaves BOTH contexts active (operator attention)
//! ```
//!
//! Two concurrent migrations sharing a context are serialized: both involved
//! context locks are taken in sorted order and held for the whole operation,
//! so phase calls never interleave. Disjoint pairs run concurrently.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cluster::ClusterResourceClient;
use crate::error::{OrchestratorError, Result};
use crate::notify::{MigrationPhase, PhaseEvent, PhaseObserver};
use crate::region::RegionRegistry;

/// Replica count a deployable unit is scaled to when its context becomes
/// active
pub const ACTIVE_REPLICAS: i32 = 3;

/// Default settle delay between scale-up and scale-down
///
/// Stands in for a rollout readiness check against the target context; see
/// the module docs for the extension point.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Default namespace deployable units live in
pub const DEFAULT_NAMESPACE: &str = "default";

/// A vetted source/target context pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    /// Context the workload is relocated away from
    #[serde(rename = "sourceContext")]
    pub source_context: String,

    /// Context the workload is relocated to
    #[serde(rename = "targetContext")]
    pub target_context: String,
}

impl MigrationRequest {
    /// Create a request
    pub fn new(source_context: impl Into<String>, target_context: impl Into<String>) -> Self {
        Self {
            source_context: source_context.into(),
            target_context: target_context.into(),
        }
    }

    /// Validate the request invariants (distinct, non-empty contexts)
    pub fn validate(&self) -> Result<()> {
        if self.source_context.is_empty() || self.target_context.is_empty() {
            return Err(OrchestratorError::config(
                "source and target contexts must be non-empty",
            ));
        }
        if self.source_context == self.target_context {
            return Err(OrchestratorError::config(format!(
                "source and target contexts must differ (both are {})",
                self.source_context
            )));
        }
        Ok(())
    }
}

/// Outcome report of a completed migration
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Migration id, threaded through every phase event
    #[serde(rename = "migrationId")]
    pub migration_id: Uuid,

    /// Deployable unit scaled down in the source context
    #[serde(rename = "sourceUnit")]
    pub source_unit: String,

    /// Deployable unit scaled up in the target context
    #[serde(rename = "targetUnit")]
    pub target_unit: String,

    /// Whether the scale-up was skipped because the target was already at
    /// the active replica count
    #[serde(rename = "scaleUpSkipped")]
    pub scale_up_skipped: bool,

    /// Total wall-clock time of the migration (seconds)
    #[serde(rename = "totalTimeSecs")]
    pub total_time_secs: f64,
}

/// Executes vetted migrations against per-context resource clients
pub struct MigrationOrchestrator {
    clients: HashMap<String, Arc<dyn ClusterResourceClient>>,
    namespace: String,
    settle_delay: Duration,
    active_replicas: i32,
    observers: Vec<Arc<dyn PhaseObserver>>,
    locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MigrationOrchestrator {
    /// Create an orchestrator over a construction-time client map
    ///
    /// The map is the only way a context becomes addressable; a request
    /// naming an absent context fails with a configuration error before any
    /// resource call.
    pub fn new(clients: HashMap<String, Arc<dyn ClusterResourceClient>>) -> Self {
        Self {
            clients,
            namespace: DEFAULT_NAMESPACE.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            active_replicas: ACTIVE_REPLICAS,
            observers: Vec::new(),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Set the namespace deployable units live in
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the settle delay between the two phases
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Set the active replica count targets are scaled up to
    pub fn with_active_replicas(mut self, active_replicas: i32) -> Self {
        self.active_replicas = active_replicas;
        self
    }

    /// Register a phase observer
    pub fn with_observer(mut self, observer: Arc<dyn PhaseObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    fn context_lock(&self, context_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(context_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn notify(&self, migration_id: Uuid, request: &MigrationRequest, phase: MigrationPhase, detail: &str) {
        let event = PhaseEvent {
            migration_id,
            phase,
            source_context: request.source_context.clone(),
            target_context: request.target_context.clone(),
            detail: detail.to_string(),
            at: Utc::now(),
        };

        for observer in &self.observers {
            // A failing subscriber must never abort the orchestration
            if std::panic::catch_unwind(AssertUnwindSafe(|| observer.on_phase(&event))).is_err() {
                warn!(phase = %phase, "Phase observer panicked; continuing");
            }
        }
    }

    fn resolve_client(&self, context_id: &str) -> Result<&Arc<dyn ClusterResourceClient>> {
        self.clients.get(context_id).ok_or_else(|| {
            OrchestratorError::config(format!(
                "no cluster client registered for context {context_id}"
            ))
        })
    }

    /// Execute a migration
    ///
    /// `cancel` is observed before the first mutation and during the settle
    /// delay; once the source scale-down has been issued the operation runs
    /// to completion. Returns a [`MigrationReport`] on success.
    pub async fn migrate(
        &self,
        mut cancel: watch::Receiver<bool>,
        request: &MigrationRequest,
    ) -> Result<MigrationReport> {
        request.validate()?;

        let source_client = self.resolve_client(&request.source_context)?;
        let target_client = self.resolve_client(&request.target_context)?;

        // Serialize against any other migration touching either context.
        // Sorted acquisition order rules out lock-order deadlocks.
        let (first_id, second_id) = if request.source_context <= request.target_context {
            (&request.source_context, &request.target_context)
        } else {
            (&request.target_context, &request.source_context)
        };
        let first_lock = self.context_lock(first_id);
        let second_lock = self.context_lock(second_id);
        let _first_guard = first_lock.lock().await;
        let _second_guard = second_lock.lock().await;

        let migration_id = Uuid::new_v4();
        let started = Instant::now();

        let source_unit = RegionRegistry::deployable_name(&request.source_context);
        let target_unit = RegionRegistry::deployable_name(&request.target_context);

        info!(
            %migration_id,
            source = %request.source_context,
            target = %request.target_context,
            %source_unit,
            %target_unit,
            "Starting migration"
        );

        // Cancellation before the first mutation leaves no side effect
        if *cancel.borrow() {
            return Err(OrchestratorError::Cancelled {
                phase: MigrationPhase::ScaleUpStarted,
                target_scaled: false,
            });
        }

        // Phase 1: scale up the target
        self.notify(migration_id, request, MigrationPhase::ScaleUpStarted, "");

        let scale_up_skipped = match target_client
            .get_replicas(&self.namespace, &target_unit)
            .await
        {
            Ok(count) if count == self.active_replicas => {
                info!(
                    %migration_id,
                    unit = %target_unit,
                    replicas = count,
                    "Target already at active replica count, skipping scale-up"
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                // The probe is an optimization only; re-setting the replica
                // count is idempotent at the resource layer
                debug!(error = %e, "Replica probe failed, issuing scale-up unconditionally");
                false
            }
        };

        if !scale_up_skipped {
            if let Err(e) = target_client
                .set_replicas(&self.namespace, &target_unit, self.active_replicas)
                .await
            {
                let err = OrchestratorError::ScaleUpFailed {
                    context: request.target_context.clone(),
                    unit: target_unit.clone(),
                    cause: e.to_string(),
                };
                self.notify(migration_id, request, MigrationPhase::Failed, &err.to_string());
                return Err(err);
            }
        }

        self.notify(migration_id, request, MigrationPhase::ScaleUpDone, "");

        // Phase 2: settle before touching the source, watching for
        // cancellation so an unwanted scale-down is never pushed through
        self.notify(migration_id, request, MigrationPhase::SettleStarted, "");

        tokio::select! {
            _ = tokio::time::sleep(self.settle_delay) => {}
            _ = cancelled(&mut cancel) => {
                let err = OrchestratorError::Cancelled {
                    phase: MigrationPhase::SettleStarted,
                    target_scaled: true,
                };
                self.notify(migration_id, request, MigrationPhase::Failed, &err.to_string());
                return Err(err);
            }
        }

        // Phase 3: scale down the source
        self.notify(migration_id, request, MigrationPhase::ScaleDownStarted, "");

        if let Err(e) = source_client
            .set_replicas(&self.namespace, &source_unit, 0)
            .await
        {
            let err = OrchestratorError::ScaleDownFailed {
                context: request.source_context.clone(),
                unit: source_unit.clone(),
                target_context: request.target_context.clone(),
                cause: e.to_string(),
            };
            self.notify(migration_id, request, MigrationPhase::Failed, &err.to_string());
            return Err(err);
        }

        let total_time_secs = started.elapsed().as_secs_f64();
        self.notify(migration_id, request, MigrationPhase::Completed, "");

        info!(
            %migration_id,
            total_time_secs,
            scale_up_skipped,
            "Migration completed"
        );

        Ok(MigrationReport {
            migration_id,
            source_unit,
            target_unit,
            scale_up_skipped,
            total_time_secs,
        })
    }
}

/// Resolve once the cancel signal turns true; never resolves otherwise
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender dropped: cancellation can no longer be signalled
            std::future::pending::<()>().await;
        }
    }
}

//! Migration phase notifications
//!
//! The orchestrator emits a [`PhaseEvent`] at every phase boundary. Observers
//! are invoked synchronously, but a failing observer never aborts the
//! orchestration: panics are caught at the call site and send failures on
//! the broadcast path are ignored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

/// Phase boundaries of a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationPhase {
    /// Target scale-up is about to be issued
    ScaleUpStarted,
    /// Target scale-up succeeded (or was skipped as a no-op)
    ScaleUpDone,
    /// Settle delay entered
    SettleStarted,
    /// Source scale-down is about to be issued
    ScaleDownStarted,
    /// Migration finished successfully
    Completed,
    /// Migration failed or was cancelled
    Failed,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ScaleUpStarted => "scale-up-started",
            Self::ScaleUpDone => "scale-up-done",
            Self::SettleStarted => "settle-started",
            Self::ScaleDownStarted => "scale-down-started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One phase-boundary notification
#[derive(Debug, Clone, Serialize)]
pub struct PhaseEvent {
    /// Migration this event belongs to
    #[serde(rename = "migrationId")]
    pub migration_id: Uuid,

    /// Phase boundary reached
    pub phase: MigrationPhase,

    /// Source cluster context of the migration
    #[serde(rename = "sourceContext")]
    pub source_context: String,

    /// Target cluster context of the migration
    #[serde(rename = "targetContext")]
    pub target_context: String,

    /// Free-form detail (failure cause, skip reason, ...)
    pub detail: String,

    /// When the boundary was crossed
    pub at: DateTime<Utc>,
}

/// Synchronous sink for phase events
///
/// Implementations must not block; long-running work belongs behind a
/// channel (see [`BroadcastObserver`]).
pub trait PhaseObserver: Send + Sync {
    /// Called at each phase boundary
    fn on_phase(&self, event: &PhaseEvent);
}

/// Observer that logs each phase transition
pub struct LogObserver;

impl PhaseObserver for LogObserver {
    fn on_phase(&self, event: &PhaseEvent) {
        info!(
            migration_id = %event.migration_id,
            phase = %event.phase,
            source = %event.source_context,
            target = %event.target_context,
            detail = %event.detail,
            "Migration phase transition"
        );
    }
}

/// Observer that fans events out over a broadcast channel
///
/// This is the hook an out-of-process notification layer subscribes to. A
/// lagged or disconnected subscriber is not a failure.
pub struct BroadcastObserver {
    sender: broadcast::Sender<PhaseEvent>,
}

impl BroadcastObserver {
    /// Create an observer with the given channel capacity, returning the
    /// first subscription alongside it
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<PhaseEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Open an additional subscription
    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.sender.subscribe()
    }
}

impl PhaseObserver for BroadcastObserver {
    fn on_phase(&self, event: &PhaseEvent) {
        // No receivers (or all lagged) is fine; the orchestration must not care
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(phase: MigrationPhase) -> PhaseEvent {
        PhaseEvent {
            migration_id: Uuid::new_v4(),
            phase,
            source_context: "ctx-us-east".to_string(),
            target_context: "ctx-eu-west".to_string(),
            detail: String::new(),
            at: Utc::now(),
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(MigrationPhase::ScaleUpStarted.to_string(), "scale-up-started");
        assert_eq!(MigrationPhase::Completed.to_string(), "completed");
    }

    #[tokio::test]
    async fn test_broadcast_observer_delivers_events() {
        let (observer, mut receiver) = BroadcastObserver::new(8);

        observer.on_phase(&event(MigrationPhase::ScaleUpStarted));
        observer.on_phase(&event(MigrationPhase::Completed));

        assert_eq!(
            receiver.recv().await.unwrap().phase,
            MigrationPhase::ScaleUpStarted
        );
        assert_eq!(
            receiver.recv().await.unwrap().phase,
            MigrationPhase::Completed
        );
    }

    #[test]
    fn test_broadcast_without_subscribers_does_not_fail() {
        let (observer, receiver) = BroadcastObserver::new(8);
        drop(receiver);

        // Must not panic or error with every subscriber gone
        observer.on_phase(&event(MigrationPhase::Failed));
    }
}

//! Error types for the orchestrator

use thiserror::Error;

use crate::notify::MigrationPhase;

/// Orchestrator result type
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur in the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Configuration error: unresolved region/context mapping or invalid request.
    /// Always raised before any resource mutation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Observation store infrastructure failure (a per-key miss is not an
    /// error; it falls back to defaults)
    #[error("observation store unavailable: {0}")]
    Store(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cluster resource protocol error (malformed scale response, etc.)
    #[error("cluster resource error: {0}")]
    Cluster(String),

    /// Scale-up of the target failed. The source was never touched, so the
    /// system is left in its pre-migration state and the operation is safe
    /// to retry.
    #[error("scale-up of {unit} in {context} failed: {cause}")]
    ScaleUpFailed {
        /// Target cluster context the scale-up was issued against
        context: String,
        /// Deployable unit name
        unit: String,
        /// Underlying failure, as reported by the resource client
        cause: String,
    },

    /// Scale-down of the source failed after the target was already scaled
    /// up, leaving both contexts active. Requires operator attention; a
    /// blind retry will not undo the dual-active state.
    #[error(
        "scale-down of {unit} in {context} failed with target {target_context} already active: {cause}"
    )]
    ScaleDownFailed {
        /// Source cluster context the scale-down was issued against
        context: String,
        /// Deployable unit name
        unit: String,
        /// Target context that is already serving
        target_context: String,
        /// Underlying failure, as reported by the resource client
        cause: String,
    },

    /// Migration cancelled by the caller before completion
    #[error("migration cancelled during {phase} (target already scaled up: {target_scaled})")]
    Cancelled {
        /// Last phase reached before the cancellation was observed
        phase: MigrationPhase,
        /// Whether the target had already been scaled up when the
        /// cancellation took effect
        target_scaled: bool,
    },
}

impl OrchestratorError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a store infrastructure error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether retrying the whole operation is safe (no partial mutation
    /// was left behind)
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ScaleUpFailed { .. })
    }

    /// Whether the failure left both source and target scaled up
    pub fn leaves_dual_active(&self) -> bool {
        match self {
            Self::ScaleDownFailed { .. } => true,
            Self::Cancelled { target_scaled, .. } => *target_scaled,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_up_failure_is_retriable() {
        let err = OrchestratorError::ScaleUpFailed {
            context: "ctx-eu-west".to_string(),
            unit: "regatta-eu-west".to_string(),
            cause: "connection refused".to_string(),
        };
        assert!(err.is_retriable());
        assert!(!err.leaves_dual_active());
    }

    #[test]
    fn test_scale_down_failure_is_dual_active() {
        let err = OrchestratorError::ScaleDownFailed {
            context: "ctx-us-east".to_string(),
            unit: "regatta-us-east".to_string(),
            target_context: "ctx-eu-west".to_string(),
            cause: "timeout".to_string(),
        };
        assert!(!err.is_retriable());
        assert!(err.leaves_dual_active());
    }

    #[test]
    fn test_cancellation_reports_target_state() {
        let before = OrchestratorError::Cancelled {
            phase: MigrationPhase::ScaleUpStarted,
            target_scaled: false,
        };
        let during_settle = OrchestratorError::Cancelled {
            phase: MigrationPhase::SettleStarted,
            target_scaled: true,
        };
        assert!(!before.leaves_dual_active());
        assert!(during_settle.leaves_dual_active());
    }
}

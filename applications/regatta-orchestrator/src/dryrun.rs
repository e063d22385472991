//! Dry-run cost/benefit gate for migrations
//!
//! Compares the one-time egress cost of moving workload state against the
//! projected savings over a fixed horizon:
//!
//! ```text
//! egress_cost       = transfer_volume_gb × egress_cost_per_gb
//! projected_savings = (source.price − target.price) × replica_count × horizon_hours
//! admitted          = projected_savings > egress_cost   (strict; ties veto)
//! ```
//!
//! A break-even migration carries execution risk with no benefit, so ties
//! veto. Evaluating a region against itself is caller misuse and is not
//! guarded here; the coordination layer validates distinct regions first.

use serde::{Deserialize, Serialize};

use crate::feed::Observation;

/// Fixed parameters of the migration cost model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Data moved per migration (GB)
    #[serde(rename = "transferVolumeGb")]
    pub transfer_volume_gb: f64,

    /// Egress bandwidth pricing ($/GB)
    #[serde(rename = "egressCostPerGb")]
    pub egress_cost_per_gb: f64,

    /// Workload scale assumed for the savings projection
    #[serde(rename = "replicaCount")]
    pub replica_count: f64,

    /// Savings projection horizon (hours)
    #[serde(rename = "horizonHours")]
    pub horizon_hours: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            transfer_volume_gb: 500.0,
            egress_cost_per_gb: 0.09,
            replica_count: 50.0,
            horizon_hours: 24.0,
        }
    }
}

/// Outcome of a dry-run evaluation
///
/// A veto (`admitted == false`) is a negative decision, not an error; the
/// computed quantities are carried so the decision is auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRunVerdict {
    /// Whether the migration is economically justified
    pub admitted: bool,

    /// One-time egress cost ($)
    #[serde(rename = "egressCost")]
    pub egress_cost: f64,

    /// Projected savings over the horizon ($)
    #[serde(rename = "projectedSavings")]
    pub projected_savings: f64,

    /// Human-readable justification stating both computed quantities
    pub reason: String,
}

/// Evaluate whether relocating from `source` to `target` pays for itself
///
/// Pure and deterministic: no I/O, no shared state, identical inputs always
/// yield an identical verdict.
pub fn evaluate(source: &Observation, target: &Observation, model: &CostModel) -> DryRunVerdict {
    let egress_cost = model.transfer_volume_gb * model.egress_cost_per_gb;
    let projected_savings =
        (source.price - target.price) * model.replica_count * model.horizon_hours;

    let admitted = projected_savings > egress_cost;

    let reason = if admitted {
        format!(
            "projected {:.0}h savings (${:.2}) exceed one-time egress cost (${:.2})",
            model.horizon_hours, projected_savings, egress_cost
        )
    } else {
        format!(
            "egress cost (${:.2}) meets or exceeds projected {:.0}h savings (${:.2})",
            egress_cost, model.horizon_hours, projected_savings
        )
    };

    DryRunVerdict {
        admitted,
        egress_cost,
        projected_savings,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn observation(region: &str, price: f64) -> Observation {
        Observation {
            region: region.to_string(),
            context_id: format!("ctx-{}", region.to_lowercase()),
            price,
            latency_ms: 40,
            sampled_at: Utc::now(),
        }
    }

    #[test]
    fn test_unprofitable_migration_is_vetoed() {
        // egress = 500 × 0.09 = 45.0; savings = (0.05 − 0.02) × 50 × 24 = 36.0
        let verdict = evaluate(
            &observation("US-East", 0.05),
            &observation("EU-West", 0.02),
            &CostModel::default(),
        );

        assert!(!verdict.admitted);
        assert!((verdict.egress_cost - 45.0).abs() < 1e-9);
        assert!((verdict.projected_savings - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_profitable_migration_is_admitted() {
        // savings = (0.05 − 0.01) × 50 × 24 = 48.0 > 45.0
        let verdict = evaluate(
            &observation("US-East", 0.05),
            &observation("EU-West", 0.01),
            &CostModel::default(),
        );

        assert!(verdict.admitted);
        assert!((verdict.projected_savings - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_tie_is_vetoed() {
        // All values exactly representable: savings = 1.0 × 25 × 2 = 50.0,
        // egress = 100 × 0.5 = 50.0, so the comparison is a true tie.
        let model = CostModel {
            transfer_volume_gb: 100.0,
            egress_cost_per_gb: 0.5,
            replica_count: 25.0,
            horizon_hours: 2.0,
        };
        let verdict = evaluate(
            &observation("US-East", 1.0),
            &observation("EU-West", 0.0),
            &model,
        );

        assert!(!verdict.admitted);
        assert_eq!(verdict.projected_savings, verdict.egress_cost);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let source = observation("US-East", 0.05);
        let target = observation("EU-West", 0.01);
        let model = CostModel::default();

        let first = evaluate(&source, &target, &model);
        let second = evaluate(&source, &target, &model);

        assert_eq!(first, second);
    }

    #[test]
    fn test_veto_reason_states_both_quantities() {
        let verdict = evaluate(
            &observation("US-East", 0.05),
            &observation("EU-West", 0.02),
            &CostModel::default(),
        );

        assert!(verdict.reason.contains("$45.00"));
        assert!(verdict.reason.contains("$36.00"));
    }

    #[test]
    fn test_negative_savings_are_vetoed() {
        // Target is more expensive than the source
        let verdict = evaluate(
            &observation("US-East", 0.02),
            &observation("EU-West", 0.05),
            &CostModel::default(),
        );

        assert!(!verdict.admitted);
        assert!(verdict.projected_savings < 0.0);
    }
}

//! Alternative capacity sizing scenarios.
//!
//! Alongside the single recommendation, the analysis offers four sizing
//! options so an operator can trade headroom against cost.

use serde::{Deserialize, Serialize};

/// Headroom multiplier for the conservative scenario.
const CONSERVATIVE_HEADROOM: f64 = 1.2;

/// Headroom multiplier for the balanced scenario.
const BALANCED_HEADROOM: f64 = 1.1;

/// Relative cost of provisioning a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostImpact {
    Low,
    Medium,
    High,
}

/// One sizing option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingScenario {
    pub capacity: f64,
    pub description: String,
    pub cost_impact: CostImpact,
}

/// The four sizing options offered with every analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingScenarios {
    pub conservative: ScalingScenario,
    pub balanced: ScalingScenario,
    pub aggressive: ScalingScenario,
    pub average_based: ScalingScenario,
}

pub(super) fn build(max_load: f64, avg_load: f64, scaling_threshold: f64) -> ScalingScenarios {
    ScalingScenarios {
        conservative: ScalingScenario {
            capacity: (max_load * CONSERVATIVE_HEADROOM).ceil(),
            description: "Peak load with 20% headroom".to_string(),
            cost_impact: CostImpact::High,
        },
        balanced: ScalingScenario {
            capacity: (max_load * BALANCED_HEADROOM).ceil(),
            description: "Peak load with 10% headroom".to_string(),
            cost_impact: CostImpact::Medium,
        },
        aggressive: ScalingScenario {
            capacity: max_load.ceil(),
            description: "Exact peak load, no headroom".to_string(),
            cost_impact: CostImpact::Low,
        },
        average_based: ScalingScenario {
            capacity: (avg_load / scaling_threshold).ceil(),
            description: "Average load at the scaling threshold".to_string(),
            cost_impact: CostImpact::Low,
        },
    }
}

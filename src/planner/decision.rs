//! Scaling decision rules.
//!
//! The decision is a pure mapping from trajectory utilization statistics
//! to an action and urgency. Scale-up triggers on the peak hour,
//! scale-down only on the trajectory average.

use serde::{Deserialize, Serialize};

use crate::models::{ForecastPoint, ScalingAction, Urgency};

use super::{OVER_CAPACITY_UTILIZATION, UNDER_UTILIZATION_FLOOR};

/// Scaling recommendation for one forecast trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityRecommendation {
    pub action: ScalingAction,
    pub urgency: Urgency,
    pub current_capacity: f64,
    pub recommended_capacity: f64,
    pub capacity_change: f64,
    pub capacity_change_percent: f64,
    pub metrics: RecommendationMetrics,
    /// Hours at or above the scaling threshold, highest load first.
    pub peak_hours: Vec<ForecastPoint>,
    pub message: String,
}

/// Trajectory statistics the recommendation was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationMetrics {
    pub max_predicted_load: f64,
    pub avg_predicted_load: f64,
    pub min_predicted_load: f64,
    pub max_utilization: f64,
    pub avg_utilization: f64,
}

/// Map utilization statistics to an action and its urgency.
pub(super) fn decide(
    max_utilization: f64,
    avg_utilization: f64,
    scaling_threshold: f64,
) -> (ScalingAction, Urgency) {
    if max_utilization >= scaling_threshold {
        let urgency = if max_utilization >= OVER_CAPACITY_UTILIZATION {
            Urgency::High
        } else {
            Urgency::Medium
        };
        (ScalingAction::ScaleUp, urgency)
    } else if avg_utilization < UNDER_UTILIZATION_FLOOR {
        (ScalingAction::ScaleDown, Urgency::Low)
    } else {
        (ScalingAction::Maintain, Urgency::Low)
    }
}

/// Capacity that would bring the driving statistic back to the threshold.
/// Scale-up sizes for the peak, scale-down for the average, maintain keeps
/// the current capacity.
pub(super) fn recommended_capacity(
    action: ScalingAction,
    max_load: f64,
    avg_load: f64,
    scaling_threshold: f64,
    current_capacity: f64,
) -> f64 {
    match action {
        ScalingAction::ScaleUp => (max_load / scaling_threshold).ceil(),
        ScalingAction::ScaleDown => (avg_load / scaling_threshold).ceil(),
        ScalingAction::Maintain => current_capacity,
    }
}

/// Operator-facing one-liner summarizing the recommendation.
pub(super) fn build_message(
    action: ScalingAction,
    max_utilization: f64,
    avg_utilization: f64,
    current_capacity: f64,
    recommended_capacity: f64,
    capacity_change_percent: f64,
) -> String {
    match action {
        ScalingAction::ScaleUp => format!(
            "Scale up required: peak utilization reaches {:.1}% of capacity; \
             increase capacity from {:.0} to {:.0} ({:+.1}%).",
            max_utilization * 100.0,
            current_capacity,
            recommended_capacity,
            capacity_change_percent
        ),
        ScalingAction::ScaleDown => format!(
            "Scale down possible: average utilization is only {:.1}%; \
             capacity can drop from {:.0} to {:.0} ({:+.1}%).",
            avg_utilization * 100.0,
            current_capacity,
            recommended_capacity,
            capacity_change_percent
        ),
        ScalingAction::Maintain => format!(
            "Current capacity of {:.0} is adequate: peak utilization stays at {:.1}%.",
            current_capacity,
            max_utilization * 100.0
        ),
    }
}

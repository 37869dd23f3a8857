//! Capacity planning over forecast trajectories.
//!
//! The planner is pure: it consumes a trajectory from the forecast engine
//! together with the provisioned capacity and scaling threshold, and
//! produces either a single recommendation or a full analysis report. It
//! never touches the model, so the same trajectory always yields the same
//! plan.

mod decision;
mod risk;
mod scenarios;

pub use decision::{CapacityRecommendation, RecommendationMetrics};
pub use risk::{HourlyPatterns, RiskAssessment};
pub use scenarios::{CostImpact, ScalingScenario, ScalingScenarios};

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};
use crate::models::ForecastPoint;

/// Utilization at or above which an hour counts as over capacity.
pub(crate) const OVER_CAPACITY_UTILIZATION: f64 = 1.0;

/// Average utilization below which capacity is considered wasted.
pub(crate) const UNDER_UTILIZATION_FLOOR: f64 = 0.3;

/// Most peak hours listed in one recommendation.
const MAX_PEAK_HOURS: usize = 5;

/// Check that a capacity can serve as a utilization denominator.
pub fn validate_capacity(current_capacity: f64) -> ForecastResult<()> {
    if current_capacity.is_nan() || current_capacity <= 0.0 {
        return Err(ForecastError::InvalidCapacity {
            capacity: current_capacity,
        });
    }
    Ok(())
}

/// Check that a scaling threshold is a usable utilization fraction.
pub fn validate_threshold(scaling_threshold: f64) -> ForecastResult<()> {
    if scaling_threshold.is_nan() || scaling_threshold <= 0.0 || scaling_threshold > 1.0 {
        return Err(ForecastError::InvalidThreshold {
            threshold: scaling_threshold,
        });
    }
    Ok(())
}

/// Header of an analysis report: what was analyzed, against what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub forecast_period_hours: usize,
    pub current_capacity: f64,
    pub scaling_threshold: f64,
}

/// Aggregate load statistics over a trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadStatistics {
    pub max_load: f64,
    pub min_load: f64,
    pub avg_load: f64,
    pub std_load: f64,
}

/// Aggregate utilization statistics over a trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationStatistics {
    pub max_utilization: f64,
    pub min_utilization: f64,
    pub avg_utilization: f64,
}

/// Full capacity analysis for one forecast trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: AnalysisSummary,
    pub load_statistics: LoadStatistics,
    pub utilization_statistics: UtilizationStatistics,
    pub risk_assessment: RiskAssessment,
    pub hourly_patterns: HourlyPatterns,
    pub recommendations: CapacityRecommendation,
    pub scaling_scenarios: ScalingScenarios,
}

struct TrajectoryStats {
    max_load: f64,
    min_load: f64,
    avg_load: f64,
    std_load: f64,
    max_utilization: f64,
    min_utilization: f64,
    avg_utilization: f64,
}

impl TrajectoryStats {
    fn compute(trajectory: &[ForecastPoint], capacity: f64) -> Option<Self> {
        if trajectory.is_empty() {
            return None;
        }
        let n = trajectory.len() as f64;
        let mut max_load = f64::NEG_INFINITY;
        let mut min_load = f64::INFINITY;
        let mut sum = 0.0;
        for point in trajectory {
            max_load = max_load.max(point.predicted_load);
            min_load = min_load.min(point.predicted_load);
            sum += point.predicted_load;
        }
        let avg_load = sum / n;
        let variance = trajectory
            .iter()
            .map(|p| (p.predicted_load - avg_load).powi(2))
            .sum::<f64>()
            / n;
        Some(Self {
            max_load,
            min_load,
            avg_load,
            std_load: variance.sqrt(),
            max_utilization: max_load / capacity,
            min_utilization: min_load / capacity,
            avg_utilization: avg_load / capacity,
        })
    }
}

/// Derives scaling recommendations and capacity analyses from forecast
/// trajectories.
#[derive(Debug, Clone, Default)]
pub struct CapacityPlanner;

impl CapacityPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Produce a scaling recommendation for a trajectory judged against
    /// `current_capacity` and `scaling_threshold`.
    pub fn recommend(
        &self,
        trajectory: &[ForecastPoint],
        current_capacity: f64,
        scaling_threshold: f64,
    ) -> ForecastResult<CapacityRecommendation> {
        validate_capacity(current_capacity)?;
        validate_threshold(scaling_threshold)?;
        let stats = TrajectoryStats::compute(trajectory, current_capacity)
            .ok_or(ForecastError::InvalidHorizon { hours: 0 })?;

        let (action, urgency) =
            decision::decide(stats.max_utilization, stats.avg_utilization, scaling_threshold);
        let recommended_capacity = decision::recommended_capacity(
            action,
            stats.max_load,
            stats.avg_load,
            scaling_threshold,
            current_capacity,
        );
        let capacity_change = recommended_capacity - current_capacity;
        let capacity_change_percent = 100.0 * capacity_change / current_capacity;
        let message = decision::build_message(
            action,
            stats.max_utilization,
            stats.avg_utilization,
            current_capacity,
            recommended_capacity,
            capacity_change_percent,
        );

        Ok(CapacityRecommendation {
            action,
            urgency,
            current_capacity,
            recommended_capacity,
            capacity_change,
            capacity_change_percent,
            metrics: RecommendationMetrics {
                max_predicted_load: stats.max_load,
                avg_predicted_load: stats.avg_load,
                min_predicted_load: stats.min_load,
                max_utilization: stats.max_utilization,
                avg_utilization: stats.avg_utilization,
            },
            peak_hours: peak_hours(trajectory, current_capacity, scaling_threshold),
            message,
        })
    }

    /// Produce a full analysis report: statistics, risk bands, hourly
    /// patterns, the recommendation and the sizing scenarios.
    pub fn analyze(
        &self,
        trajectory: &[ForecastPoint],
        current_capacity: f64,
        scaling_threshold: f64,
    ) -> ForecastResult<AnalysisReport> {
        validate_capacity(current_capacity)?;
        validate_threshold(scaling_threshold)?;
        let stats = TrajectoryStats::compute(trajectory, current_capacity)
            .ok_or(ForecastError::InvalidHorizon { hours: 0 })?;

        let utilizations: Vec<f64> = trajectory
            .iter()
            .map(|p| p.predicted_load / current_capacity)
            .collect();

        let recommendations = self.recommend(trajectory, current_capacity, scaling_threshold)?;

        Ok(AnalysisReport {
            summary: AnalysisSummary {
                forecast_period_hours: trajectory.len(),
                current_capacity,
                scaling_threshold,
            },
            load_statistics: LoadStatistics {
                max_load: stats.max_load,
                min_load: stats.min_load,
                avg_load: stats.avg_load,
                std_load: stats.std_load,
            },
            utilization_statistics: UtilizationStatistics {
                max_utilization: stats.max_utilization,
                min_utilization: stats.min_utilization,
                avg_utilization: stats.avg_utilization,
            },
            risk_assessment: risk::assess(&utilizations),
            hourly_patterns: risk::hourly_patterns(trajectory),
            recommendations,
            scaling_scenarios: scenarios::build(
                stats.max_load,
                stats.avg_load,
                scaling_threshold,
            ),
        })
    }
}

/// Hours at or above the scaling threshold, highest load first, capped at
/// [`MAX_PEAK_HOURS`].
fn peak_hours(
    trajectory: &[ForecastPoint],
    capacity: f64,
    scaling_threshold: f64,
) -> Vec<ForecastPoint> {
    let mut peaks: Vec<ForecastPoint> = trajectory
        .iter()
        .filter(|p| p.predicted_load / capacity >= scaling_threshold)
        .copied()
        .collect();
    peaks.sort_by(|a, b| {
        b.predicted_load
            .partial_cmp(&a.predicted_load)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    peaks.truncate(MAX_PEAK_HOURS);
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScalingAction, Urgency};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()
    }

    fn trajectory(loads: &[f64]) -> Vec<ForecastPoint> {
        loads
            .iter()
            .enumerate()
            .map(|(i, &load)| ForecastPoint {
                timestamp: start() + Duration::hours(i as i64 + 1),
                predicted_load: load,
            })
            .collect()
    }

    #[test]
    fn test_flat_comfortable_load_maintains() {
        let planner = CapacityPlanner::new();
        let rec = planner
            .recommend(&trajectory(&vec![500.0; 24]), 1000.0, 0.8)
            .unwrap();
        assert_eq!(rec.action, ScalingAction::Maintain);
        assert_eq!(rec.urgency, Urgency::Low);
        assert_eq!(rec.recommended_capacity, 1000.0);
        assert_eq!(rec.capacity_change, 0.0);
        assert_eq!(rec.capacity_change_percent, 0.0);
        assert!(rec.peak_hours.is_empty());
    }

    #[test]
    fn test_peak_over_threshold_recommends_scale_up() {
        let planner = CapacityPlanner::new();
        let mut loads = vec![400.0; 23];
        loads.push(950.0);
        let rec = planner.recommend(&trajectory(&loads), 1000.0, 0.8).unwrap();
        assert_eq!(rec.action, ScalingAction::ScaleUp);
        assert_eq!(rec.urgency, Urgency::Medium);
        assert_eq!(rec.recommended_capacity, 1188.0); // ceil(950 / 0.8)
        assert_eq!(rec.metrics.max_predicted_load, 950.0);
        assert!((rec.metrics.max_utilization - 0.95).abs() < 1e-12);
        assert_eq!(rec.peak_hours.len(), 1);
        assert!(rec.message.contains("Scale up"));
    }

    #[test]
    fn test_recommendation_groups_trajectory_metrics() {
        let planner = CapacityPlanner::new();
        let rec = planner
            .recommend(&trajectory(&[100.0, 400.0, 700.0]), 1000.0, 0.8)
            .unwrap();
        assert_eq!(rec.metrics.max_predicted_load, 700.0);
        assert_eq!(rec.metrics.min_predicted_load, 100.0);
        assert_eq!(rec.metrics.avg_predicted_load, 400.0);
        assert!((rec.metrics.max_utilization - 0.7).abs() < 1e-12);
        assert!((rec.metrics.avg_utilization - 0.4).abs() < 1e-12);

        // On the wire the statistics sit under a single metrics object.
        let value = serde_json::to_value(&rec).unwrap();
        assert!(value["metrics"].is_object());
        for key in [
            "max_predicted_load",
            "avg_predicted_load",
            "min_predicted_load",
            "max_utilization",
            "avg_utilization",
        ] {
            assert!(value["metrics"][key].is_number(), "missing metrics key {key}");
        }
        assert!(value.get("max_predicted_load").is_none());
    }

    #[test]
    fn test_load_above_capacity_is_high_urgency() {
        let planner = CapacityPlanner::new();
        let mut loads = vec![400.0; 23];
        loads.push(1100.0);
        let rec = planner.recommend(&trajectory(&loads), 1000.0, 0.8).unwrap();
        assert_eq!(rec.action, ScalingAction::ScaleUp);
        assert_eq!(rec.urgency, Urgency::High);
    }

    #[test]
    fn test_quiet_trajectory_recommends_scale_down() {
        let planner = CapacityPlanner::new();
        let rec = planner
            .recommend(&trajectory(&vec![200.0; 24]), 1000.0, 0.8)
            .unwrap();
        assert_eq!(rec.action, ScalingAction::ScaleDown);
        assert_eq!(rec.urgency, Urgency::Low);
        assert_eq!(rec.recommended_capacity, 250.0); // ceil(200 / 0.8)
        assert_eq!(rec.capacity_change, -750.0);
        assert_eq!(rec.capacity_change_percent, -75.0);
    }

    #[test]
    fn test_peak_hours_are_sorted_and_capped() {
        let planner = CapacityPlanner::new();
        let loads = [900.0, 850.0, 950.0, 820.0, 870.0, 910.0, 890.0, 100.0];
        let rec = planner.recommend(&trajectory(&loads), 1000.0, 0.8).unwrap();
        assert_eq!(rec.peak_hours.len(), 5);
        assert_eq!(rec.peak_hours[0].predicted_load, 950.0);
        assert_eq!(rec.peak_hours[4].predicted_load, 870.0);
        for pair in rec.peak_hours.windows(2) {
            assert!(pair[0].predicted_load >= pair[1].predicted_load);
        }
    }

    #[test]
    fn test_zero_capacity_is_rejected_by_both_operations() {
        let planner = CapacityPlanner::new();
        let points = trajectory(&vec![100.0; 4]);
        let err = planner.recommend(&points, 0.0, 0.8).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidCapacity { .. }));
        let err = planner.analyze(&points, -5.0, 0.8).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidCapacity { .. }));
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let planner = CapacityPlanner::new();
        let points = trajectory(&vec![100.0; 4]);
        for threshold in [0.0, -0.5, 1.5] {
            let err = planner.recommend(&points, 1000.0, threshold).unwrap_err();
            assert!(matches!(err, ForecastError::InvalidThreshold { .. }));
        }
        // A threshold of exactly 1.0 is allowed.
        assert!(planner.recommend(&points, 1000.0, 1.0).is_ok());
    }

    #[test]
    fn test_empty_trajectory_is_rejected() {
        let planner = CapacityPlanner::new();
        assert!(planner.recommend(&[], 1000.0, 0.8).is_err());
        assert!(planner.analyze(&[], 1000.0, 0.8).is_err());
    }

    #[test]
    fn test_analysis_statistics_match_hand_computation() {
        let planner = CapacityPlanner::new();
        let report = planner
            .analyze(&trajectory(&[100.0, 200.0, 300.0, 400.0]), 1000.0, 0.8)
            .unwrap();

        assert_eq!(report.summary.forecast_period_hours, 4);
        assert_eq!(report.summary.current_capacity, 1000.0);
        assert_eq!(report.summary.scaling_threshold, 0.8);

        assert_eq!(report.load_statistics.max_load, 400.0);
        assert_eq!(report.load_statistics.min_load, 100.0);
        assert_eq!(report.load_statistics.avg_load, 250.0);
        // Population standard deviation of 100, 200, 300, 400.
        assert!((report.load_statistics.std_load - 111.80339887).abs() < 1e-6);

        assert!((report.utilization_statistics.max_utilization - 0.4).abs() < 1e-12);
        assert!((report.utilization_statistics.min_utilization - 0.1).abs() < 1e-12);
        assert!((report.utilization_statistics.avg_utilization - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_analysis_nests_recommendation_and_scenarios() {
        let planner = CapacityPlanner::new();
        let mut loads = vec![150.0; 23];
        loads.push(1000.0);
        let report = planner.analyze(&trajectory(&loads), 1000.0, 0.8).unwrap();

        assert_eq!(report.recommendations.action, ScalingAction::ScaleUp);
        assert_eq!(report.scaling_scenarios.conservative.capacity, 1200.0);
        assert_eq!(report.scaling_scenarios.aggressive.capacity, 1000.0);
        // Peaky trajectory: the average-based option is the cheapest.
        assert!(
            report.scaling_scenarios.average_based.capacity
                <= report.scaling_scenarios.aggressive.capacity
        );

        assert_eq!(report.risk_assessment.over_capacity_hours, 1);
        assert_eq!(report.risk_assessment.under_utilized_hours, 23);
    }
}

//! Risk assessment and hourly load patterns.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{ForecastPoint, RiskLevel};

use super::{OVER_CAPACITY_UTILIZATION, UNDER_UTILIZATION_FLOOR};

/// Utilization at which an hour is not just over capacity but critically so.
const CRITICAL_UTILIZATION: f64 = 1.2;

/// Fraction of critical hours above which the window is rated critical.
const CRITICAL_HOURS_FRACTION: f64 = 0.10;

/// Fraction of over-capacity hours above which the window is rated high.
const OVER_CAPACITY_HOURS_FRACTION: f64 = 0.20;

/// Fraction of over-capacity hours above which the window is rated medium.
const ELEVATED_HOURS_FRACTION: f64 = 0.05;

/// Hour counts in each risk band plus the overall rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Hours at or above full capacity.
    pub over_capacity_hours: usize,
    /// Hours at or above the critical utilization.
    pub critical_hours: usize,
    /// Hours below the under-utilization floor.
    pub under_utilized_hours: usize,
    pub risk_level: RiskLevel,
}

pub(super) fn assess(utilizations: &[f64]) -> RiskAssessment {
    let total = utilizations.len().max(1) as f64;
    let over_capacity_hours = utilizations
        .iter()
        .filter(|&&u| u >= OVER_CAPACITY_UTILIZATION)
        .count();
    let critical_hours = utilizations
        .iter()
        .filter(|&&u| u >= CRITICAL_UTILIZATION)
        .count();
    let under_utilized_hours = utilizations
        .iter()
        .filter(|&&u| u < UNDER_UTILIZATION_FLOOR)
        .count();

    let critical_fraction = critical_hours as f64 / total;
    let over_fraction = over_capacity_hours as f64 / total;
    let risk_level = if critical_fraction > CRITICAL_HOURS_FRACTION {
        RiskLevel::Critical
    } else if over_fraction > OVER_CAPACITY_HOURS_FRACTION {
        RiskLevel::High
    } else if over_fraction > ELEVATED_HOURS_FRACTION {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        over_capacity_hours,
        critical_hours,
        under_utilized_hours,
        risk_level,
    }
}

/// Average predicted load grouped by hour of day, with the peak and low
/// hours. Ties go to the earliest hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyPatterns {
    pub avg_load_by_hour: BTreeMap<u32, f64>,
    pub peak_hour: u32,
    pub low_hour: u32,
}

pub(super) fn hourly_patterns(trajectory: &[ForecastPoint]) -> HourlyPatterns {
    let mut sums = [0.0_f64; 24];
    let mut counts = [0_usize; 24];
    for point in trajectory {
        let hour = point.timestamp.hour() as usize;
        sums[hour] += point.predicted_load;
        counts[hour] += 1;
    }

    let mut avg_load_by_hour = BTreeMap::new();
    for hour in 0..24 {
        if counts[hour] > 0 {
            avg_load_by_hour.insert(hour as u32, sums[hour] / counts[hour] as f64);
        }
    }

    let mut peak_hour = 0;
    let mut peak_value = f64::NEG_INFINITY;
    let mut low_hour = 0;
    let mut low_value = f64::INFINITY;
    for (&hour, &avg) in &avg_load_by_hour {
        if avg > peak_value {
            peak_hour = hour;
            peak_value = avg;
        }
        if avg < low_value {
            low_hour = hour;
            low_value = avg;
        }
    }

    HourlyPatterns {
        avg_load_by_hour,
        peak_hour,
        low_hour,
    }
}

//! Shared data models for forecasting and capacity planning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of features in one model input vector.
pub const NUM_FEATURES: usize = 5;

/// One hour of model input: the raw load count, two seasonal lags and
/// the calendar position of the hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Transaction count observed (or predicted) for this hour.
    pub count: f64,
    /// Count 24 hours earlier.
    pub lag_24: f64,
    /// Count 168 hours (one week) earlier.
    pub lag_168: f64,
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub dayofweek: u32,
}

impl FeatureVector {
    /// Feature values in model input order.
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.count,
            self.lag_24,
            self.lag_168,
            self.hour as f64,
            self.dayofweek as f64,
        ]
    }
}

/// One predicted hour of load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    /// Predicted transaction count, clamped to be non-negative.
    pub predicted_load: f64,
}

/// Parameters for a plain forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Forecast horizon in hours, 1-168.
    #[serde(default = "default_forecast_hours")]
    pub hours_ahead: u32,
    /// Load observed for the hour of `timestamp`.
    #[serde(default)]
    pub current_load: f64,
    /// Hour the forecast starts from; the caller's current hour when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self {
            hours_ahead: default_forecast_hours(),
            current_load: 0.0,
            timestamp: None,
        }
    }
}

/// Parameters for a scaling recommendation: a forecast plus the capacity
/// the recommendation is judged against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningRequest {
    #[serde(default = "default_forecast_hours")]
    pub hours_ahead: u32,
    #[serde(default)]
    pub current_load: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Provisioned capacity in the same unit as the load counts.
    pub current_capacity: f64,
    /// Utilization fraction above which scale-up is proposed.
    #[serde(default = "default_scaling_threshold")]
    pub scaling_threshold: f64,
}

/// Parameters for a full capacity analysis. Identical to [`PlanningRequest`]
/// except that the horizon defaults to a whole week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default = "default_analysis_hours")]
    pub hours_ahead: u32,
    #[serde(default)]
    pub current_load: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub current_capacity: f64,
    #[serde(default = "default_scaling_threshold")]
    pub scaling_threshold: f64,
}

fn default_forecast_hours() -> u32 {
    24
}

fn default_analysis_hours() -> u32 {
    168
}

fn default_scaling_threshold() -> f64 {
    0.8
}

/// Forecast trajectory returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub forecast: Vec<ForecastPoint>,
    pub hours_ahead: u32,
    /// Hour the trajectory extends from; the first point is one hour later.
    pub start_timestamp: DateTime<Utc>,
}

/// Scaling direction proposed by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    Maintain,
}

impl ScalingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingAction::ScaleUp => "scale_up",
            ScalingAction::ScaleDown => "scale_down",
            ScalingAction::Maintain => "maintain",
        }
    }
}

/// How soon the proposed action should be taken. Ordered from least to
/// most pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

/// Overall risk classification for a forecast window. Ordered from least
/// to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Service liveness as reported by the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

/// Health probe payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    pub model_loaded: bool,
    pub timestamp: DateTime<Utc>,
}

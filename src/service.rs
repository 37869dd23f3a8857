//! Service facade over the forecast engine and capacity planner.
//!
//! [`ForecastService`] owns the loaded model behind an `Arc` and exposes
//! the four operations a transport layer needs: forecast, recommendations,
//! analysis and health. The service is immutable after construction and
//! safe to share across threads; a service started without artifacts stays
//! up in degraded mode and rejects forecasting with a typed error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::artifacts::ModelArtifacts;
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::{validate_horizon, ForecastEngine};
use crate::models::{
    AnalysisRequest, ForecastRequest, ForecastResponse, HealthStatus, PlanningRequest,
    ServiceStatus,
};
use crate::observability::ForecastMetrics;
use crate::planner::{
    validate_capacity, validate_threshold, AnalysisReport, CapacityPlanner,
    CapacityRecommendation,
};

/// Forecast trajectory plus the recommendation derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningResponse {
    #[serde(flatten)]
    pub forecast: ForecastResponse,
    pub recommendations: CapacityRecommendation,
}

/// Forecast trajectory plus the full capacity analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub forecast: ForecastResponse,
    pub analysis: AnalysisReport,
}

/// Thread-safe forecasting and capacity planning service.
pub struct ForecastService {
    engine: Option<ForecastEngine>,
    planner: CapacityPlanner,
    metrics: ForecastMetrics,
}

impl ForecastService {
    /// Build a service around loaded artifacts.
    pub fn new(artifacts: ModelArtifacts) -> Self {
        let metrics = ForecastMetrics::new();
        metrics.set_model_info(&artifacts.fingerprints);
        info!(
            hidden_size = artifacts.network.hidden_size(),
            "Forecast service ready"
        );
        Self {
            engine: Some(ForecastEngine::new(Arc::new(artifacts))),
            planner: CapacityPlanner::new(),
            metrics,
        }
    }

    /// Decode the three artifact blobs and build a service around them.
    pub fn from_artifact_bytes(
        network: &[u8],
        target_scaler: &[u8],
        time_scaler: &[u8],
    ) -> anyhow::Result<Self> {
        Ok(Self::new(ModelArtifacts::load(
            network,
            target_scaler,
            time_scaler,
        )?))
    }

    /// Start without artifacts. The service stays up for health checks and
    /// fails every forecasting operation with [`ForecastError::ModelUnavailable`].
    pub fn without_model() -> Self {
        warn!("No model artifacts loaded, forecasting is unavailable");
        Self {
            engine: None,
            planner: CapacityPlanner::new(),
            metrics: ForecastMetrics::new(),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.engine.is_some()
    }

    /// Health probe payload: degraded when the model never loaded.
    pub fn health(&self) -> HealthStatus {
        let loaded = self.is_model_loaded();
        HealthStatus {
            status: if loaded {
                ServiceStatus::Healthy
            } else {
                ServiceStatus::Degraded
            },
            model_loaded: loaded,
            timestamp: Utc::now(),
        }
    }

    /// Produce a load trajectory.
    pub fn forecast(&self, request: &ForecastRequest) -> ForecastResult<ForecastResponse> {
        self.run_forecast(request.hours_ahead, request.current_load, request.timestamp)
            .map_err(|e| self.reject(e))
    }

    /// Produce a trajectory and the scaling recommendation for it.
    pub fn recommendations(&self, request: &PlanningRequest) -> ForecastResult<PlanningResponse> {
        self.recommendations_inner(request).map_err(|e| self.reject(e))
    }

    /// Produce a trajectory and the full capacity analysis for it.
    pub fn analyze(&self, request: &AnalysisRequest) -> ForecastResult<AnalysisResponse> {
        self.analyze_inner(request).map_err(|e| self.reject(e))
    }

    fn recommendations_inner(
        &self,
        request: &PlanningRequest,
    ) -> ForecastResult<PlanningResponse> {
        validate_horizon(request.hours_ahead)?;
        validate_capacity(request.current_capacity)?;
        validate_threshold(request.scaling_threshold)?;

        let forecast =
            self.run_forecast(request.hours_ahead, request.current_load, request.timestamp)?;
        let recommendations = self.planner.recommend(
            &forecast.forecast,
            request.current_capacity,
            request.scaling_threshold,
        )?;
        self.metrics.inc_recommendations();
        info!(
            action = recommendations.action.as_str(),
            urgency = recommendations.urgency.as_str(),
            recommended_capacity = recommendations.recommended_capacity,
            "Scaling recommendation generated"
        );
        Ok(PlanningResponse {
            forecast,
            recommendations,
        })
    }

    fn analyze_inner(&self, request: &AnalysisRequest) -> ForecastResult<AnalysisResponse> {
        validate_horizon(request.hours_ahead)?;
        validate_capacity(request.current_capacity)?;
        validate_threshold(request.scaling_threshold)?;

        let forecast =
            self.run_forecast(request.hours_ahead, request.current_load, request.timestamp)?;
        let analysis = self.planner.analyze(
            &forecast.forecast,
            request.current_capacity,
            request.scaling_threshold,
        )?;
        self.metrics.inc_analyses();
        info!(
            risk_level = ?analysis.risk_assessment.risk_level,
            action = analysis.recommendations.action.as_str(),
            "Capacity analysis generated"
        );
        Ok(AnalysisResponse { forecast, analysis })
    }

    /// Inputs are validated before the model is consulted, so a degraded
    /// service still reports bad parameters as such.
    fn run_forecast(
        &self,
        hours_ahead: u32,
        current_load: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> ForecastResult<ForecastResponse> {
        validate_horizon(hours_ahead)?;
        let engine = self.engine.as_ref().ok_or(ForecastError::ModelUnavailable)?;
        let start = timestamp.unwrap_or_else(Utc::now);
        let points = engine.forecast(current_load, start, hours_ahead)?;
        Ok(ForecastResponse {
            forecast: points,
            hours_ahead,
            start_timestamp: start,
        })
    }

    fn reject(&self, error: ForecastError) -> ForecastError {
        self.metrics.inc_rejected(error.code());
        warn!(code = error.code(), error = %error, "Request rejected");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_service_is_shareable_across_threads() {
        assert_send_sync::<ForecastService>();
    }

    #[test]
    fn test_degraded_service_reports_unhealthy_model() {
        let service = ForecastService::without_model();
        let health = service.health();
        assert_eq!(health.status, ServiceStatus::Degraded);
        assert!(!health.model_loaded);
        assert!(!service.is_model_loaded());
    }

    #[test]
    fn test_degraded_service_rejects_forecasts() {
        let service = ForecastService::without_model();
        let err = service.forecast(&ForecastRequest::default()).unwrap_err();
        assert!(matches!(err, ForecastError::ModelUnavailable));
    }

    #[test]
    fn test_parameter_validation_precedes_model_check() {
        // Even without a model, a bad horizon is reported as such.
        let service = ForecastService::without_model();
        let err = service
            .forecast(&ForecastRequest {
                hours_ahead: 200,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidHorizon { hours: 200 }));

        // And so is a bad capacity or threshold on the planning paths.
        let err = service
            .recommendations(&PlanningRequest {
                hours_ahead: 24,
                current_load: 100.0,
                timestamp: None,
                current_capacity: 0.0,
                scaling_threshold: 0.8,
            })
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidCapacity { .. }));

        let err = service
            .analyze(&AnalysisRequest {
                hours_ahead: 24,
                current_load: 100.0,
                timestamp: None,
                current_capacity: 500.0,
                scaling_threshold: 1.5,
            })
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidThreshold { .. }));
    }
}

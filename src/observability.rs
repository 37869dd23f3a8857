//! Prometheus metrics for the forecasting service.
//!
//! Metrics register once in the process-wide default registry; the
//! [`ForecastMetrics`] handle is cheap to clone and hand to every
//! component that records observations.

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

use crate::artifacts::ArtifactFingerprints;

static GLOBAL_METRICS: OnceLock<MetricsInner> = OnceLock::new();

/// Buckets sized for autoregressive trajectories, which run the network
/// once per forecast hour.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Label length for artifact fingerprints; full SHA-256 hex is unwieldy
/// in label values.
const FINGERPRINT_LABEL_LEN: usize = 12;

struct MetricsInner {
    forecast_latency_seconds: Histogram,
    forecasts_total: IntCounter,
    recommendations_total: IntCounter,
    analyses_total: IntCounter,
    requests_rejected_total: IntCounterVec,
    model_info: GaugeVec,
}

impl MetricsInner {
    fn new() -> Self {
        Self {
            forecast_latency_seconds: register_histogram!(
                "loadcast_forecast_latency_seconds",
                "Wall time to produce one forecast trajectory",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_latency_seconds"),
            forecasts_total: register_int_counter!(
                "loadcast_forecasts_total",
                "Forecast trajectories produced"
            )
            .expect("Failed to register forecasts_total"),
            recommendations_total: register_int_counter!(
                "loadcast_recommendations_total",
                "Scaling recommendations produced"
            )
            .expect("Failed to register recommendations_total"),
            analyses_total: register_int_counter!(
                "loadcast_analyses_total",
                "Capacity analyses produced"
            )
            .expect("Failed to register analyses_total"),
            requests_rejected_total: register_int_counter_vec!(
                "loadcast_requests_rejected_total",
                "Requests rejected before computation, by error code",
                &["code"]
            )
            .expect("Failed to register requests_rejected_total"),
            model_info: register_gauge_vec!(
                "loadcast_model_info",
                "Fingerprints of the artifacts serving traffic",
                &["network", "target_scaler", "time_scaler"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Handle for recording service metrics.
#[derive(Debug, Clone, Default)]
pub struct ForecastMetrics;

impl ForecastMetrics {
    pub fn new() -> Self {
        Self
    }

    fn inner() -> &'static MetricsInner {
        GLOBAL_METRICS.get_or_init(MetricsInner::new)
    }

    pub fn observe_forecast_latency(&self, seconds: f64) {
        Self::inner().forecast_latency_seconds.observe(seconds);
    }

    pub fn inc_forecasts(&self) {
        Self::inner().forecasts_total.inc();
    }

    pub fn inc_recommendations(&self) {
        Self::inner().recommendations_total.inc();
    }

    pub fn inc_analyses(&self) {
        Self::inner().analyses_total.inc();
    }

    pub fn inc_rejected(&self, code: &str) {
        Self::inner()
            .requests_rejected_total
            .with_label_values(&[code])
            .inc();
    }

    /// Publish the fingerprints of the loaded artifacts. Replaces any
    /// previously published set.
    pub fn set_model_info(&self, fingerprints: &ArtifactFingerprints) {
        let inner = Self::inner();
        inner.model_info.reset();
        inner
            .model_info
            .with_label_values(&[
                short(&fingerprints.network),
                short(&fingerprints.target_scaler),
                short(&fingerprints.time_scaler),
            ])
            .set(1.0);
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..FINGERPRINT_LABEL_LEN).unwrap_or(fingerprint)
}

/// Render every registered metric in the Prometheus text format.
pub fn export_metrics() -> String {
    // Touch the registry so the export is never empty.
    let _ = ForecastMetrics::inner();
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}

//! Autoregressive forecast engine.
//!
//! One model invocation predicts a single hour, so an N hour trajectory is
//! produced by running the model N times and feeding each prediction back
//! into the window. The raw model output is what the window consumes; the
//! non-negative clamp applies only to the reported trajectory, so the
//! feedback loop sees exactly what the network produced.

use chrono::{DateTime, Duration, Utc};
use ndarray::Array2;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::artifacts::ModelArtifacts;
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::window::{WindowBuilder, WINDOW_LEN};
use crate::models::{ForecastPoint, NUM_FEATURES};
use crate::observability::ForecastMetrics;

/// Shortest supported horizon in hours.
pub const MIN_HORIZON_HOURS: u32 = 1;

/// Longest supported horizon in hours (one week).
pub const MAX_HORIZON_HOURS: u32 = 168;

/// Trajectories slower than this are worth a warning.
const SLOW_FORECAST_MS: u128 = 1_000;

/// Check a requested horizon against the supported range.
pub fn validate_horizon(hours_ahead: u32) -> ForecastResult<()> {
    if !(MIN_HORIZON_HOURS..=MAX_HORIZON_HOURS).contains(&hours_ahead) {
        return Err(ForecastError::InvalidHorizon { hours: hours_ahead });
    }
    Ok(())
}

/// Drives the model over a rolling window to produce load trajectories.
pub struct ForecastEngine {
    artifacts: Arc<ModelArtifacts>,
    metrics: ForecastMetrics,
}

impl ForecastEngine {
    pub fn new(artifacts: Arc<ModelArtifacts>) -> Self {
        Self {
            artifacts,
            metrics: ForecastMetrics::new(),
        }
    }

    /// Forecast `hours_ahead` hours starting one hour after `start`,
    /// seeding the window from a single observed load.
    pub fn forecast(
        &self,
        current_load: f64,
        start: DateTime<Utc>,
        hours_ahead: u32,
    ) -> ForecastResult<Vec<ForecastPoint>> {
        validate_horizon(hours_ahead)?;
        self.run(WindowBuilder::seed(current_load, start), start, hours_ahead)
    }

    /// Forecast with the window seeded from real hourly history, oldest
    /// first, ending at `start`.
    pub fn forecast_with_history(
        &self,
        history: &[f64],
        current_load: f64,
        start: DateTime<Utc>,
        hours_ahead: u32,
    ) -> ForecastResult<Vec<ForecastPoint>> {
        validate_horizon(hours_ahead)?;
        self.run(
            WindowBuilder::with_history(history, current_load, start),
            start,
            hours_ahead,
        )
    }

    fn run(
        &self,
        mut window: WindowBuilder,
        start: DateTime<Utc>,
        hours_ahead: u32,
    ) -> ForecastResult<Vec<ForecastPoint>> {
        let began = Instant::now();
        let scaler = &self.artifacts.scaler;
        let network = &self.artifacts.network;

        let mut input = Array2::<f32>::zeros((WINDOW_LEN, NUM_FEATURES));
        let mut points = Vec::with_capacity(hours_ahead as usize);
        for step in 1..=i64::from(hours_ahead) {
            let timestamp = start + Duration::hours(step);
            scaler.scale_window_into(window.ordered(), &mut input);
            let raw = scaler.invert_target(f64::from(network.forward(input.view())));
            points.push(ForecastPoint {
                timestamp,
                predicted_load: raw.max(0.0),
            });
            window.advance(raw, timestamp);
        }

        let elapsed = began.elapsed();
        self.metrics.observe_forecast_latency(elapsed.as_secs_f64());
        self.metrics.inc_forecasts();
        if elapsed.as_millis() > SLOW_FORECAST_MS {
            warn!(
                hours_ahead,
                elapsed_ms = elapsed.as_millis() as u64,
                "Forecast exceeded latency target"
            );
        }
        debug!(
            hours_ahead,
            elapsed_ms = elapsed.as_millis() as u64,
            "Forecast trajectory generated"
        );
        Ok(points)
    }
}

//! Error types for the forecasting service.
//!
//! Request-boundary failures carry a stable machine-readable code so a
//! transport layer can map them to its own status space without matching
//! on display strings.

use thiserror::Error;

/// Errors surfaced to callers of the forecasting service.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Model or scaler artifacts were never loaded; the service is degraded.
    #[error("Model artifacts are not loaded, forecasting is unavailable")]
    ModelUnavailable,

    /// Requested horizon falls outside the supported range.
    #[error("hours_ahead must be within [1, 168], got {hours}")]
    InvalidHorizon { hours: u32 },

    /// Capacity must be strictly positive for utilization to be defined.
    #[error("current_capacity must be positive, got {capacity}")]
    InvalidCapacity { capacity: f64 },

    /// Scaling threshold is a utilization fraction and must sit in (0, 1].
    #[error("scaling_threshold must be within (0, 1], got {threshold}")]
    InvalidThreshold { threshold: f64 },
}

impl ForecastError {
    /// Stable code identifying the rejection class.
    pub fn code(&self) -> &'static str {
        match self {
            ForecastError::ModelUnavailable => "model_unavailable",
            ForecastError::InvalidHorizon { .. } => "invalid_horizon",
            ForecastError::InvalidCapacity { .. } => "invalid_capacity",
            ForecastError::InvalidThreshold { .. } => "invalid_threshold",
        }
    }
}

/// Result type for forecasting operations.
pub type ForecastResult<T> = Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ForecastError::ModelUnavailable.code(), "model_unavailable");
        assert_eq!(
            ForecastError::InvalidHorizon { hours: 200 }.code(),
            "invalid_horizon"
        );
        assert_eq!(
            ForecastError::InvalidCapacity { capacity: 0.0 }.code(),
            "invalid_capacity"
        );
        assert_eq!(
            ForecastError::InvalidThreshold { threshold: 1.5 }.code(),
            "invalid_threshold"
        );
    }

    #[test]
    fn test_error_messages_carry_offending_value() {
        let err = ForecastError::InvalidHorizon { hours: 200 };
        assert!(err.to_string().contains("200"));

        let err = ForecastError::InvalidThreshold { threshold: 1.5 };
        assert!(err.to_string().contains("1.5"));
    }
}

//! Transactional load forecasting and capacity planning.
//!
//! `loadcast` serves hourly load forecasts from a trained attention LSTM
//! and turns them into scaling recommendations and capacity analyses.
//! The crate is transport-agnostic: [`ForecastService`] takes typed
//! requests and returns typed responses, and an HTTP or RPC layer maps
//! them onto its own wire format.
//!
//! # Components
//!
//! - [`artifacts`]: tensor archive decoding and artifact fingerprinting
//! - [`forecast`]: scaling, windowing, the network forward pass and the
//!   autoregressive engine
//! - [`planner`]: scaling decisions, risk assessment and sizing scenarios
//! - [`service`]: the facade tying forecasting and planning together
//! - [`observability`]: Prometheus metrics

pub mod artifacts;
pub mod error;
pub mod forecast;
pub mod models;
pub mod observability;
pub mod planner;
pub mod service;

pub use error::{ForecastError, ForecastResult};
pub use models::*;
pub use service::{AnalysisResponse, ForecastService, PlanningResponse};

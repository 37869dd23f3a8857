//! Load forecasting pipeline.
//!
//! Raw hourly loads are turned into model features by [`WindowBuilder`],
//! normalized by [`SequenceScaler`], run through the trained
//! [`AttentionLstm`] and fed back autoregressively by [`ForecastEngine`]
//! to produce multi-hour trajectories.

mod engine;
mod network;
mod scaler;
mod window;

pub use engine::{validate_horizon, ForecastEngine, MAX_HORIZON_HOURS, MIN_HORIZON_HOURS};
pub use network::{AttentionLstm, NUM_LAYERS};
pub use scaler::SequenceScaler;
pub use window::{WindowBuilder, LAG_DAY_HOURS, LAG_WEEK_HOURS, WINDOW_LEN};

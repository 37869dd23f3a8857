//! Affine feature and target scaling.
//!
//! The network is trained on normalized inputs; this module carries the
//! per-column scale/offset pairs fitted at training time and applies them
//! at serving time. Scaling a value computes `(x - offset) / scale`,
//! inversion computes `x * scale + offset`.

use anyhow::{bail, Result};
use ndarray::Array2;

use crate::models::{FeatureVector, NUM_FEATURES};

/// Affine scaler over the five model features plus the scalar target.
#[derive(Debug, Clone)]
pub struct SequenceScaler {
    feature_scale: [f64; NUM_FEATURES],
    feature_offset: [f64; NUM_FEATURES],
    target_scale: f64,
    target_offset: f64,
}

impl SequenceScaler {
    /// Build a scaler from fitted parameters. Scales of zero would make
    /// the transform non-invertible and are rejected.
    pub fn new(
        feature_scale: [f64; NUM_FEATURES],
        feature_offset: [f64; NUM_FEATURES],
        target_scale: f64,
        target_offset: f64,
    ) -> Result<Self> {
        for (column, &scale) in feature_scale.iter().enumerate() {
            if scale == 0.0 {
                bail!("Feature column {} has zero scale", column);
            }
        }
        if target_scale == 0.0 {
            bail!("Target has zero scale");
        }
        Ok(Self {
            feature_scale,
            feature_offset,
            target_scale,
            target_offset,
        })
    }

    /// Scale one feature vector into model space.
    pub fn scale_features(&self, vec: &FeatureVector) -> [f64; NUM_FEATURES] {
        let raw = vec.to_array();
        let mut scaled = [0.0; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            scaled[i] = (raw[i] - self.feature_offset[i]) / self.feature_scale[i];
        }
        scaled
    }

    /// Scale a whole window into a preallocated `(len, NUM_FEATURES)`
    /// model input matrix.
    pub fn scale_window_into<'a, I>(&self, window: I, out: &mut Array2<f32>)
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        debug_assert_eq!(out.ncols(), NUM_FEATURES);
        let mut rows = 0;
        for (row, vec) in window.into_iter().enumerate() {
            let scaled = self.scale_features(vec);
            for (col, &value) in scaled.iter().enumerate() {
                out[[row, col]] = value as f32;
            }
            rows += 1;
        }
        debug_assert_eq!(rows, out.nrows());
    }

    /// Scale a raw load value into target space.
    pub fn scale_target(&self, value: f64) -> f64 {
        (value - self.target_offset) / self.target_scale
    }

    /// Map a model output back to a raw load value.
    pub fn invert_target(&self, value: f64) -> f64 {
        value * self.target_scale + self.target_offset
    }
}

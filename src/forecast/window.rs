//! Rolling feature window for autoregressive forecasting.
//!
//! The model consumes a fixed window of the most recent [`WINDOW_LEN`]
//! feature vectors. The window lives in a fixed arena indexed by a logical
//! start position, so advancing by one hour overwrites a single slot
//! instead of shifting the whole buffer. A separate ring of raw counts is
//! retained long enough to resolve the daily and weekly lags once the run
//! (or the supplied history) reaches that far back.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::collections::VecDeque;

use crate::models::FeatureVector;

/// Input window length consumed by the model.
pub const WINDOW_LEN: usize = 48;

/// Daily seasonal lag in hours.
pub const LAG_DAY_HOURS: usize = 24;

/// Weekly seasonal lag in hours.
pub const LAG_WEEK_HOURS: usize = 168;

/// Raw counts retained for lag resolution.
const LAG_RETENTION: usize = LAG_WEEK_HOURS + 1;

/// Builds and advances the model input window.
#[derive(Debug, Clone)]
pub struct WindowBuilder {
    slots: [FeatureVector; WINDOW_LEN],
    /// Index of the oldest slot; the window reads oldest to newest from here.
    start: usize,
    /// Raw counts for the represented hours, oldest first.
    counts: VecDeque<f64>,
}

impl WindowBuilder {
    /// Seed a window from a single observed load. Every synthesized hour
    /// carries `current_load` as its count and both lags, so the model
    /// starts from a flat deterministic state.
    pub fn seed(current_load: f64, start_timestamp: DateTime<Utc>) -> Self {
        Self::with_history(&[], current_load, start_timestamp)
    }

    /// Seed a window from real hourly history, oldest first, with the last
    /// value aligned to `start_timestamp`. Hours the history does not cover
    /// are synthesized from `current_load`; lags the history cannot resolve
    /// fall back to the hour's own count.
    pub fn with_history(
        history: &[f64],
        current_load: f64,
        start_timestamp: DateTime<Utc>,
    ) -> Self {
        let span = history.len().clamp(WINDOW_LEN, LAG_RETENTION);

        let resolve = |offset_back: usize| -> Option<f64> {
            if offset_back < history.len() {
                Some(history[history.len() - 1 - offset_back])
            } else if offset_back < span {
                Some(current_load)
            } else {
                None
            }
        };

        let slots = std::array::from_fn(|i| {
            let offset_back = WINDOW_LEN - 1 - i;
            let timestamp = start_timestamp - Duration::hours(offset_back as i64);
            let count = resolve(offset_back).unwrap_or(current_load);
            let lag_24 = resolve(offset_back + LAG_DAY_HOURS).unwrap_or(count);
            let lag_168 = resolve(offset_back + LAG_WEEK_HOURS).unwrap_or(count);
            FeatureVector {
                count,
                lag_24,
                lag_168,
                hour: timestamp.hour(),
                dayofweek: timestamp.weekday().num_days_from_monday(),
            }
        });

        let mut counts = VecDeque::with_capacity(LAG_RETENTION);
        for offset_back in (0..span).rev() {
            if let Some(value) = resolve(offset_back) {
                counts.push_back(value);
            }
        }

        Self {
            slots,
            start: 0,
            counts,
        }
    }

    /// Push the next hour into the window, dropping the oldest. `load` is
    /// the raw (unclamped) value fed back by the autoregressive loop; lags
    /// that reach beyond the retained counts fall back to it.
    pub fn advance(&mut self, load: f64, timestamp: DateTime<Utc>) {
        let lag_24 = self.count_back(LAG_DAY_HOURS).unwrap_or(load);
        let lag_168 = self.count_back(LAG_WEEK_HOURS).unwrap_or(load);

        self.slots[self.start] = FeatureVector {
            count: load,
            lag_24,
            lag_168,
            hour: timestamp.hour(),
            dayofweek: timestamp.weekday().num_days_from_monday(),
        };
        self.start = (self.start + 1) % WINDOW_LEN;

        if self.counts.len() == LAG_RETENTION {
            self.counts.pop_front();
        }
        self.counts.push_back(load);
    }

    /// The window's vectors, oldest to newest.
    pub fn ordered(&self) -> impl Iterator<Item = &FeatureVector> + '_ {
        (0..WINDOW_LEN).map(move |i| &self.slots[(self.start + i) % WINDOW_LEN])
    }

    /// The most recently written vector.
    pub fn newest(&self) -> &FeatureVector {
        &self.slots[(self.start + WINDOW_LEN - 1) % WINDOW_LEN]
    }

    /// Count for the hour `hours_back` before the next hour to be written.
    fn count_back(&self, hours_back: usize) -> Option<f64> {
        let len = self.counts.len();
        if len >= hours_back {
            Some(self.counts[len - hours_back])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Monday, so num_days_from_monday is 0 at the start timestamp.
    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_seed_fills_window_with_current_load() {
        let builder = WindowBuilder::seed(250.0, start());
        let window: Vec<&FeatureVector> = builder.ordered().collect();
        assert_eq!(window.len(), WINDOW_LEN);
        for vec in &window {
            assert_eq!(vec.count, 250.0);
            assert_eq!(vec.lag_24, 250.0);
            assert_eq!(vec.lag_168, 250.0);
        }
    }

    #[test]
    fn test_seed_assigns_descending_calendar_positions() {
        let builder = WindowBuilder::seed(100.0, start());
        let newest = builder.newest();
        assert_eq!(newest.hour, 12);
        assert_eq!(newest.dayofweek, 0);

        let window: Vec<&FeatureVector> = builder.ordered().collect();
        // Oldest slot is 47 hours earlier: Saturday 13:00.
        assert_eq!(window[0].hour, 13);
        assert_eq!(window[0].dayofweek, 5);
        // One hour before the start.
        assert_eq!(window[WINDOW_LEN - 2].hour, 11);
    }

    #[test]
    fn test_with_history_resolves_lags_from_real_values() {
        // 200 hours of history, value = hour index, newest = 199.
        let history: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let builder = WindowBuilder::with_history(&history, 0.0, start());

        let newest = builder.newest();
        assert_eq!(newest.count, 199.0);
        assert_eq!(newest.lag_24, 175.0);
        assert_eq!(newest.lag_168, 31.0);

        let window: Vec<&FeatureVector> = builder.ordered().collect();
        assert_eq!(window[0].count, 152.0);
        assert_eq!(window[0].lag_24, 128.0);
    }

    #[test]
    fn test_with_history_shorter_than_window_pads_with_current_load() {
        let history = vec![10.0, 20.0, 30.0];
        let builder = WindowBuilder::with_history(&history, 5.0, start());

        let window: Vec<&FeatureVector> = builder.ordered().collect();
        assert_eq!(window[WINDOW_LEN - 1].count, 30.0);
        assert_eq!(window[WINDOW_LEN - 2].count, 20.0);
        assert_eq!(window[WINDOW_LEN - 3].count, 10.0);
        assert_eq!(window[0].count, 5.0);
    }

    #[test]
    fn test_advance_rotates_and_resolves_daily_lag() {
        let mut builder = WindowBuilder::seed(100.0, start());
        let second_oldest = *builder.ordered().nth(1).unwrap();

        builder.advance(150.0, start() + Duration::hours(1));

        let window: Vec<&FeatureVector> = builder.ordered().collect();
        assert_eq!(*window[0], second_oldest);
        let newest = builder.newest();
        assert_eq!(newest.count, 150.0);
        // 24 hours back is still inside the seeded window.
        assert_eq!(newest.lag_24, 100.0);
        assert_eq!(newest.hour, 13);
    }

    #[test]
    fn test_advance_weekly_lag_falls_back_to_pushed_load() {
        let mut builder = WindowBuilder::seed(100.0, start());
        builder.advance(-40.0, start() + Duration::hours(1));
        // Only 48 counts retained, so the weekly lag is unresolvable and
        // takes the pushed value, negative and all.
        assert_eq!(builder.newest().lag_168, -40.0);
    }

    #[test]
    fn test_advance_weekly_lag_resolves_with_long_history() {
        let history: Vec<f64> = (0..LAG_RETENTION).map(|i| i as f64).collect();
        let mut builder = WindowBuilder::with_history(&history, 0.0, start());

        builder.advance(500.0, start() + Duration::hours(1));
        // Count 168 hours before the pushed hour is history index 1.
        assert_eq!(builder.newest().lag_168, 1.0);
    }

    #[test]
    fn test_window_length_is_stable_across_advances() {
        let mut builder = WindowBuilder::seed(1.0, start());
        for step in 1..=300 {
            builder.advance(step as f64, start() + Duration::hours(step));
            assert_eq!(builder.ordered().count(), WINDOW_LEN);
        }
        assert_eq!(builder.newest().count, 300.0);
        // Weekly lag resolves once 168 pushed counts are retained.
        assert_eq!(builder.newest().lag_168, 300.0 - 168.0);
    }
}

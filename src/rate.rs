//! Time-weighted rate estimation.
//!
//! [`RateFilter`] turns a monotonically reported counter into a smoothed
//! "units per second" figure. Each recomputation blends the instantaneous rate
//! since the previous sample with the previous estimate, weighting the old estimate
//! by `0.5^(dt / half_life)`. Because the weight depends on the real time between
//! samples, the result behaves like a continuous low-pass filter no matter how
//! irregularly it is polled.
//!
//! # Debounce
//!
//! Recomputation is time-gated: calls arriving less than [`MIN_SAMPLE_INTERVAL`] after
//! the last recomputation return the cached rate untouched. Only calls that pass the
//! gate advance the stored sample.

use std::time::Duration;

use parking_lot::Mutex;
use web_time::Instant;

use crate::error::{Error, Result};

/// Minimum time between two recomputations of the rate.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Default half-life of the smoothing: the previous estimate loses half its weight per second.
pub const DEFAULT_HALF_LIFE: Duration = Duration::from_secs(1);

/// An exponential, time-weighted estimator of a counter's rate of change.
///
/// All state transitions happen under a single per-instance lock, so one thread may
/// feed values while another queries the rate.
#[derive(Debug)]
pub struct RateFilter {
    half_life: Duration,
    state: Mutex<FilterState>,
}

#[derive(Debug, Default)]
struct FilterState {
    last_value: i64,
    last_sample: Option<Instant>,
    rate: f64,
}

impl Default for RateFilter {
    fn default() -> Self {
        Self {
            half_life: DEFAULT_HALF_LIFE,
            state: Mutex::default(),
        }
    }
}

impl RateFilter {
    /// Creates a filter with the [`DEFAULT_HALF_LIFE`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter with a custom smoothing half-life.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHalfLife`] if `half_life` is zero.
    pub fn with_half_life(half_life: Duration) -> Result<Self> {
        if half_life.is_zero() {
            return Err(Error::InvalidHalfLife(half_life));
        }
        Ok(Self {
            half_life,
            state: Mutex::default(),
        })
    }

    /// Returns the configured half-life.
    #[must_use]
    pub const fn half_life(&self) -> Duration {
        self.half_life
    }

    /// Feeds the counter's current value observed at `now` and returns the rate.
    ///
    /// The first call only records a baseline and returns `0.0`. Later calls within
    /// [`MIN_SAMPLE_INTERVAL`] of the last recomputation return the cached rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&self, value: i64, now: Instant) -> f64 {
        let mut state = self.state.lock();

        let Some(last_sample) = state.last_sample else {
            state.last_sample = Some(now);
            state.last_value = value;
            state.rate = 0.0;
            return 0.0;
        };

        let dt = now.saturating_duration_since(last_sample);
        if dt < MIN_SAMPLE_INTERVAL {
            return state.rate;
        }

        let secs = dt.as_secs_f64();
        let instantaneous = value.wrapping_sub(state.last_value) as f64 / secs;
        let weight = 0.5f64.powf(secs / self.half_life.as_secs_f64());

        // lerp(instantaneous, previous, weight)
        state.rate = instantaneous + (state.rate - instantaneous) * weight;
        state.last_value = value;
        state.last_sample = Some(now);
        state.rate
    }

    /// Returns the most recently computed rate without recomputing.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.state.lock().rate
    }

    /// Forgets the baseline and zeroes the rate.
    pub fn reset(&self) {
        *self.state.lock() = FilterState::default();
    }
}

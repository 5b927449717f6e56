//! Fluent interface for constructing [`Progress`] instances.
//!
//! [`Progress::new`] covers the common case. [`ProgressBuilder`] is for everything else:
//!
//! * **Display:** percent mode, magnitude scaling and unit suffix in one place.
//! * **Smoothing:** a custom rate half-life, validated at build time.
//! * **Shared State:** inject existing `Arc<AtomicI64>` counters so several handles (or a
//!   foreign system) read and write the exact same value or total.
//! * **Start Time:** build an already-running progress with a given start instant.

use std::{
    sync::{Arc, atomic::AtomicI64},
    time::Duration,
};

use compact_str::CompactString;
use web_time::Instant;

use crate::{
    error::Result,
    format::DisplayFormat,
    progress::Progress,
    rate::{DEFAULT_HALF_LIFE, RateFilter},
};

/// A builder for [`Progress`] instances that need more than the defaults.
#[derive(Default)]
pub struct ProgressBuilder {
    description: CompactString,
    total: i64,
    value: i64,
    format: DisplayFormat,
    half_life: Option<Duration>,
    start: Option<Instant>,
    // Optional shared atomic references
    atomic_value: Option<Arc<AtomicI64>>,
    atomic_total: Option<Arc<AtomicI64>>,
}

impl ProgressBuilder {
    /// Starts building a progress with a known total (negative for unknown).
    #[must_use]
    pub fn new(description: impl Into<CompactString>, total: i64) -> Self {
        Self {
            description: description.into(),
            total,
            ..Default::default()
        }
    }

    /// Starts building a progress whose total is unknown.
    #[must_use]
    pub fn unbounded(description: impl Into<CompactString>) -> Self {
        Self::new(description, -1)
    }

    /// Sets the starting value.
    #[must_use]
    pub const fn value(mut self, value: i64) -> Self {
        self.value = value;
        self
    }

    /// Replaces the whole display format.
    #[must_use]
    pub fn format(mut self, format: DisplayFormat) -> Self {
        self.format = format;
        self
    }

    /// Shows the counter as a percentage when the total is known.
    #[must_use]
    pub const fn use_percent(mut self, use_percent: bool) -> Self {
        self.format.use_percent = use_percent;
        self
    }

    /// Marks the counter as whole numbers only (the default) or fractional.
    #[must_use]
    pub const fn integral(mut self, is_integral: bool) -> Self {
        self.format.is_integral = is_integral;
        self
    }

    /// Sets the magnitude base and unit suffix, e.g. `(1000.0, "B")`.
    #[must_use]
    pub fn order_scale(mut self, order_scale: f64, suffix: impl Into<CompactString>) -> Self {
        self.format.order_scale = order_scale;
        self.format.suffix = suffix.into();
        self
    }

    /// Sets the rate filter's smoothing half-life.
    #[must_use]
    pub const fn half_life(mut self, half_life: Duration) -> Self {
        self.half_life = Some(half_life);
        self
    }

    /// Sets a pre-existing atomic counter for the value.
    ///
    /// The starting value given to [`value`](Self::value) is ignored in that case.
    #[must_use]
    pub fn with_atomic_value(mut self, atomic_value: Arc<AtomicI64>) -> Self {
        self.atomic_value = Some(atomic_value);
        self
    }

    /// Sets a pre-existing atomic counter for the total.
    #[must_use]
    pub fn with_atomic_total(mut self, atomic_total: Arc<AtomicI64>) -> Self {
        self.atomic_total = Some(atomic_total);
        self
    }

    /// Builds the progress already running since `start`.
    #[must_use]
    pub const fn with_start_time(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }

    /// Builds the progress already running since now.
    #[must_use]
    pub fn with_start_time_now(self) -> Self {
        self.with_start_time(Instant::now())
    }

    /// Consumes the builder and returns the [`Progress`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHalfLife`](crate::Error::InvalidHalfLife) for a zero half-life.
    pub fn build(self) -> Result<Progress> {
        let rate = RateFilter::with_half_life(self.half_life.unwrap_or(DEFAULT_HALF_LIFE))?;

        let progress = Progress::from_parts(
            self.description,
            self.format,
            None,
            self.atomic_value
                .unwrap_or_else(|| Arc::new(AtomicI64::new(self.value))),
            self.atomic_total
                .unwrap_or_else(|| Arc::new(AtomicI64::new(self.total))),
            rate,
        );

        if let Some(start) = self.start {
            progress.run_at(start);
        }
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, atomic::AtomicI64},
        time::Duration,
    };

    use web_time::Instant;

    use super::ProgressBuilder;

    /// Shared State Injection
    /// Two handles built over the same atomic see each other's updates.
    #[test]
    fn test_shared_atomics() {
        let shared = Arc::new(AtomicI64::new(0));

        let p1 = ProgressBuilder::new("worker_1", 100)
            .with_atomic_value(shared.clone())
            .build()
            .unwrap();
        let p2 = ProgressBuilder::new("worker_2", 100)
            .with_atomic_value(shared)
            .build()
            .unwrap();

        p1.inc(10);
        assert_eq!(p2.get_value(), 10, "p2 should see p1's updates via shared atomic");
    }

    /// Display options land in the format.
    #[test]
    fn test_display_options() {
        let p = ProgressBuilder::new("download", 2048)
            .value(512)
            .use_percent(true)
            .order_scale(1024.0, "B")
            .build()
            .unwrap();

        let format = p.get_format();
        assert!(format.use_percent);
        assert!(format.is_integral);
        assert_eq!(format.suffix, "B");
        assert_eq!(p.get_value(), 512);
        assert_eq!(p.get_percent(), Some(25.0));
    }

    /// Start Time
    #[test]
    fn test_start_time() {
        let start = Instant::now() - Duration::from_secs(5);
        let p = ProgressBuilder::unbounded("resumed")
            .with_start_time(start)
            .build()
            .unwrap();

        assert!(p.get_elapsed().unwrap() >= Duration::from_secs(5));
        assert!(ProgressBuilder::unbounded("idle").build().unwrap().get_elapsed().is_none());
    }

    /// A zero half-life is rejected.
    #[test]
    fn test_invalid_half_life() {
        let result = ProgressBuilder::new("bad", 1).half_life(Duration::ZERO).build();
        assert!(result.is_err());
    }
}

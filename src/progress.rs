//! Core progress state.
//!
//! [`Progress`] is the shared, cloneable record of one unit of work: what it is, how far
//! along it is, and how fast it is moving. Like most handles in this crate it is split
//! into "hot" and "cold" halves:
//!
//! * **Hot:** `value`, `total` and the finished flag are atomics. Workers update them in
//!   tight loops without taking a lock.
//! * **Cold:** description, display format and timing live behind an
//!   [`RwLock`](parking_lot::RwLock) and are mostly read by the rendering thread.
//!
//! Negative counts mean "unknown": a negative `total` is an unbounded task, a negative
//! `value` a task whose position is not reported. Values are never clamped to the total.
//!
//! # Rate
//!
//! The rate is owned by a [`RateFilter`] and only recomputed on the read path
//! ([`Progress::update_rate`] and [`Progress::snapshot`]). Writers never touch the filter,
//! so a worker calling [`Progress::inc`] stays wait-free while the renderer polls.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

use compact_str::{CompactString, format_compact};
use parking_lot::RwLock;
use web_time::Instant;

use crate::{format::DisplayFormat, rate::RateFilter, render::LineOptions};

/// A thread-safe, cloneable handle to a unit of work's progress.
///
/// Cloning is cheap (a handful of `Arc` bumps) and every clone observes the same state.
#[derive(Clone)]
pub struct Progress {
    /// Infrequently changed metadata and timers.
    pub(crate) cold: Arc<RwLock<Cold>>,

    /// The item currently being processed (e.g. a file name).
    pub(crate) item: Arc<RwLock<CompactString>>,

    pub(crate) value: Arc<AtomicI64>,
    pub(crate) total: Arc<AtomicI64>,
    pub(crate) finished: Arc<AtomicBool>,

    pub(crate) rate: Arc<RateFilter>,
}

/// "Cold" storage for metadata that changes infrequently.
pub struct Cold {
    pub(crate) description: CompactString,
    pub(crate) format: DisplayFormat,
    pub(crate) started: Option<Instant>,
    pub(crate) stopped: Option<Instant>,
}

impl Progress {
    /// Creates a new `Progress` with default display format and rate smoothing.
    ///
    /// # Parameters
    ///
    /// * `description`: A label for the work.
    /// * `total`: The expected count, or any negative number if unknown.
    /// * `value`: The starting count.
    pub fn new(description: impl Into<CompactString>, total: i64, value: i64) -> Self {
        Self::from_parts(
            description.into(),
            DisplayFormat::default(),
            None,
            Arc::new(AtomicI64::new(value)),
            Arc::new(AtomicI64::new(total)),
            RateFilter::new(),
        )
    }

    /// Creates a progress record whose total is unknown.
    #[must_use]
    pub fn unbounded(description: impl Into<CompactString>) -> Self {
        Self::new(description, -1, 0)
    }

    pub(crate) fn from_parts(
        description: CompactString,
        format: DisplayFormat,
        started: Option<Instant>,
        value: Arc<AtomicI64>,
        total: Arc<AtomicI64>,
        rate: RateFilter,
    ) -> Self {
        Self {
            cold: Arc::new(RwLock::new(Cold {
                description,
                format,
                started,
                stopped: None,
            })),
            item: Arc::new(RwLock::new(CompactString::default())),
            value,
            total,
            finished: Arc::new(AtomicBool::new(false)),
            rate: Arc::new(rate),
        }
    }

    // ========================================================================
    // Metadata Accessors
    // ========================================================================

    /// Gets the description of the work.
    #[must_use]
    pub fn get_description(&self) -> CompactString {
        self.cold.read().description.clone()
    }

    /// Updates the description of the work.
    pub fn set_description(&self, description: impl Into<CompactString>) {
        self.cold.write().description = description.into();
    }

    /// Gets the current item label.
    #[must_use]
    pub fn get_item(&self) -> CompactString {
        self.item.read().clone()
    }

    /// Updates the current item label.
    pub fn set_item(&self, item: impl Into<CompactString>) {
        *self.item.write() = item.into();
    }

    /// Returns a copy of the display format.
    #[must_use]
    pub fn get_format(&self) -> DisplayFormat {
        self.cold.read().format.clone()
    }

    /// Replaces the display format.
    pub fn set_format(&self, format: DisplayFormat) {
        self.cold.write().format = format;
    }

    /// Shows the counter as a percentage when the total is known.
    pub fn set_use_percent(&self, use_percent: bool) {
        self.cold.write().format.use_percent = use_percent;
    }

    /// Marks the counter as holding whole numbers only.
    pub fn set_integral(&self, is_integral: bool) {
        self.cold.write().format.is_integral = is_integral;
    }

    /// Sets the magnitude base and unit suffix, e.g. `(1024.0, "B")`.
    pub fn set_order_scale(&self, order_scale: f64, suffix: impl Into<CompactString>) {
        let mut cold = self.cold.write();
        cold.format.order_scale = order_scale;
        cold.format.suffix = suffix.into();
    }

    // ========================================================================
    // Counters (Hot Path)
    // ========================================================================

    /// Adds `amount` to the current value.
    pub fn inc(&self, amount: i64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Gets the current value.
    #[must_use]
    pub fn get_value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Sets the current value.
    pub fn set_value(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Gets the total; negative means unknown.
    #[must_use]
    pub fn get_total(&self) -> i64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Sets the total; pass a negative number for unknown.
    pub fn set_total(&self, total: i64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Checks if the work is marked as finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Returns the completion percentage, or `None` without a positive total.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn get_percent(&self) -> Option<f64> {
        let total = self.get_total();
        let value = self.get_value();
        (total > 0 && value >= 0).then(|| value as f64 * 100.0 / total as f64)
    }

    // ========================================================================
    // Rate & Timing
    // ========================================================================

    /// Returns the last computed rate without recomputing it.
    #[must_use]
    pub fn get_rate(&self) -> f64 {
        self.rate.rate()
    }

    /// Feeds the current value to the rate filter and returns the (possibly cached) rate.
    pub fn update_rate(&self, now: Instant) -> f64 {
        self.rate.update(self.get_value(), now)
    }

    /// Time since [`run`](Self::run), frozen once finished. `None` if never run.
    #[must_use]
    pub fn get_elapsed(&self) -> Option<Duration> {
        self.elapsed_at(Instant::now())
    }

    fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        let cold = self.cold.read();
        let started = cold.started?;
        Some(cold.stopped.unwrap_or(now).saturating_duration_since(started))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts (or restarts) the work: zeroes the rate, restarts the elapsed timer and
    /// clears the finished flag. Counters are left as they are.
    pub fn run(&self) {
        self.run_at(Instant::now());
    }

    /// Like [`run`](Self::run), with an explicit start instant.
    pub fn run_at(&self, now: Instant) {
        {
            let mut cold = self.cold.write();
            cold.started = Some(now);
            cold.stopped = None;
        }
        self.rate.reset();
        self.rate.update(self.get_value(), now);
        self.finished.store(false, Ordering::Release);
    }

    /// Marks the work as finished and freezes the elapsed timer.
    pub fn finish(&self) {
        {
            let mut cold = self.cold.write();
            if cold.started.is_some() && cold.stopped.is_none() {
                cold.stopped = Some(Instant::now());
            }
        }
        self.finished.store(true, Ordering::Release);
    }

    /// Sets the current item and marks the work as finished.
    pub fn finish_with_item(&self, item: impl Into<CompactString>) {
        self.set_item(item);
        self.finish();
    }

    // ========================================================================
    // Advanced
    // ========================================================================

    /// Returns a shared reference to the atomic value counter.
    #[must_use]
    pub fn atomic_value(&self) -> Arc<AtomicI64> {
        self.value.clone()
    }

    /// Returns a shared reference to the atomic total counter.
    #[must_use]
    pub fn atomic_total(&self) -> Arc<AtomicI64> {
        self.total.clone()
    }

    /// Refreshes the rate and captures a consistent view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Like [`snapshot`](Self::snapshot), treating `now` as the current time.
    #[must_use]
    pub fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let rate = self.update_rate(now);
        let elapsed = self.elapsed_at(now);

        let cold = self.cold.read();
        let description = cold.description.clone();
        let format = cold.format.clone();
        drop(cold);

        ProgressSnapshot {
            description,
            item: self.item.read().clone(),
            format,
            value: self.get_value(),
            total: self.get_total(),
            rate,
            elapsed,
            finished: self.is_finished(),
        }
    }
}

/// A plain-data view of a [`Progress`] at one instant.
///
/// Holds owned data, so rendering from it needs no locks.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressSnapshot {
    description: CompactString,
    item: CompactString,
    format: DisplayFormat,

    value: i64,
    total: i64,
    rate: f64,

    elapsed: Option<Duration>,
    finished: bool,
}

impl ProgressSnapshot {
    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the current item label.
    #[must_use]
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Returns the display format.
    #[must_use]
    pub const fn format(&self) -> &DisplayFormat {
        &self.format
    }

    /// Returns the value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }

    /// Returns the total; negative means unknown.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.total
    }

    /// Returns the smoothed rate in units per second.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Returns the elapsed time, if the work was ever run.
    #[must_use]
    pub const fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Returns whether the work was finished.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Renders `fraction-or-percent [@rate/s][, elapsed s]`.
    #[must_use]
    pub fn status(&self, options: &LineOptions) -> CompactString {
        let mut status = self.format.progress(self.value, self.total);
        if options.show_rate {
            status.push_str(&format_compact!(" @{}/s", self.format.rate(self.rate)));
        }
        if options.show_elapsed {
            if let Some(elapsed) = self.elapsed {
                status.push_str(&format_compact!(", {:.1}s", elapsed.as_secs_f64()));
            }
        }
        status
    }
}

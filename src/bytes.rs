//! Progress with a second, byte-counted dimension.
//!
//! A file copy or download usually has two meaningful counters: how many items are
//! done and how many bytes have moved. [`ByteProgress`] keeps the item counters of a
//! regular [`Progress`] and adds its own byte counters with an independent
//! [`RateFilter`], so item and byte throughput are smoothed separately.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use compact_str::{CompactString, format_compact};
use web_time::Instant;

use crate::{
    format::DisplayFormat,
    progress::{Progress, ProgressSnapshot},
    rate::RateFilter,
    render::LineOptions,
};

/// A [`Progress`] that also tracks transferred bytes.
///
/// Cloning is cheap and all clones share state.
#[derive(Clone)]
pub struct ByteProgress {
    items: Progress,
    bytes: Arc<AtomicI64>,
    bytes_total: Arc<AtomicI64>,
    byte_rate: Arc<RateFilter>,
}

impl ByteProgress {
    /// Creates a tracker for `total` items spanning `bytes_total` bytes.
    ///
    /// Either total may be negative when unknown.
    pub fn new(description: impl Into<CompactString>, total: i64, bytes_total: i64) -> Self {
        Self::from_progress(Progress::new(description, total, 0), bytes_total)
    }

    /// Wraps an existing item tracker, adding byte counters.
    #[must_use]
    pub fn from_progress(items: Progress, bytes_total: i64) -> Self {
        Self {
            items,
            bytes: Arc::new(AtomicI64::new(0)),
            bytes_total: Arc::new(AtomicI64::new(bytes_total)),
            byte_rate: Arc::new(RateFilter::new()),
        }
    }

    /// The item-count half of this tracker.
    #[must_use]
    pub const fn progress(&self) -> &Progress {
        &self.items
    }

    /// Adds `amount` transferred bytes.
    pub fn add_bytes(&self, amount: i64) {
        self.bytes.fetch_add(amount, Ordering::Relaxed);
    }

    /// Gets the transferred byte count.
    #[must_use]
    pub fn get_bytes(&self) -> i64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Sets the transferred byte count.
    pub fn set_bytes(&self, bytes: i64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }

    /// Gets the expected byte count; negative means unknown.
    #[must_use]
    pub fn get_bytes_total(&self) -> i64 {
        self.bytes_total.load(Ordering::Relaxed)
    }

    /// Sets the expected byte count.
    pub fn set_bytes_total(&self, bytes_total: i64) {
        self.bytes_total.store(bytes_total, Ordering::Relaxed);
    }

    /// Returns the last computed byte rate.
    #[must_use]
    pub fn get_byte_rate(&self) -> f64 {
        self.byte_rate.rate()
    }

    /// Feeds the byte count to its filter and returns the (possibly cached) byte rate.
    pub fn update_byte_rate(&self, now: Instant) -> f64 {
        self.byte_rate.update(self.get_bytes(), now)
    }

    /// Restarts both dimensions. See [`Progress::run`].
    pub fn run(&self) {
        self.run_at(Instant::now());
    }

    /// Like [`run`](Self::run), with an explicit start instant.
    pub fn run_at(&self, now: Instant) {
        self.items.run_at(now);
        self.byte_rate.reset();
        self.byte_rate.update(self.get_bytes(), now);
    }

    /// Marks the work as finished.
    pub fn finish(&self) {
        self.items.finish();
    }

    /// Refreshes both rates and captures the current state.
    #[must_use]
    pub fn snapshot(&self) -> ByteProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Like [`snapshot`](Self::snapshot), treating `now` as the current time.
    #[must_use]
    pub fn snapshot_at(&self, now: Instant) -> ByteProgressSnapshot {
        ByteProgressSnapshot {
            items: self.items.snapshot_at(now),
            byte_rate: self.update_byte_rate(now),
            bytes: self.get_bytes(),
            bytes_total: self.get_bytes_total(),
        }
    }
}

/// A plain-data view of a [`ByteProgress`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteProgressSnapshot {
    items: ProgressSnapshot,
    bytes: i64,
    bytes_total: i64,
    byte_rate: f64,
}

impl ByteProgressSnapshot {
    /// The item-count view.
    #[must_use]
    pub const fn items(&self) -> &ProgressSnapshot {
        &self.items
    }

    /// Transferred bytes.
    #[must_use]
    pub const fn bytes(&self) -> i64 {
        self.bytes
    }

    /// Expected bytes; negative means unknown.
    #[must_use]
    pub const fn bytes_total(&self) -> i64 {
        self.bytes_total
    }

    /// Smoothed bytes per second.
    #[must_use]
    pub const fn byte_rate(&self) -> f64 {
        self.byte_rate
    }

    /// Renders the item status followed by `[bytes/total @rate/s]`.
    #[must_use]
    pub fn status(&self, options: &LineOptions) -> CompactString {
        let format = DisplayFormat::bytes();
        let mut status = self.items.status(options);
        let transferred = format.progress(self.bytes, self.bytes_total);
        if transferred.is_empty() {
            return status;
        }

        if options.show_rate {
            status.push_str(&format_compact!(
                " [{transferred} @{}/s]",
                format.rate(self.byte_rate)
            ));
        } else {
            status.push_str(&format_compact!(" [{transferred}]"));
        }
        status
    }
}

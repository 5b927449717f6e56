//! # `rated_progress`
//!
//! Progress tracking with smoothed rate estimation, in-place console rendering, and a
//! small cooperative worker pool to drive the work being reported on.
//!
//! * **Concurrent**: progress handles are cheap to clone ([`Arc`](std::sync::Arc)-based).
//!   Workers bump atomic counters; a renderer reads them on its own cadence.
//! * **Smoothed**: rates come from a time-weighted exponential filter that is independent
//!   of how often it is polled, and recomputed at most every 50 ms.
//! * **Degrades gracefully**: the console renderer redraws in place when the cursor can be
//!   queried and falls back to carriage-return overwrite when it cannot.
//!
//! ## Modules
//!
//! * [`rate`]: The [`RateFilter`] estimator.
//! * [`format`](mod@format): Value, percent and fraction formatting.
//! * [`progress`]: The core [`Progress`] state and its snapshots.
//! * [`bytes`]: [`ByteProgress`], adding a byte-counted dimension.
//! * [`builder`]: Fluent construction of [`Progress`].
//! * [`render`]: The [`ConsoleRenderer`] redraw session.
//! * [`task`]: Background [`Task`]s and the [`Tracked`]/[`Completion`] traits.
//! * [`monitor`](mod@monitor): The blocking poll-and-redraw loop.
//! * [`pool`]: The cooperative [`WorkerPool`].
//! * [`io`]: Byte-counting [`std::io::Read`]/[`std::io::Write`] wrappers.
//! * [`iter`]: Item-counting iterator adapters.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use rated_progress::{ConsoleRenderer, Progress, Task};
//!
//! let progress = Progress::new("hashing", 1_000, 0);
//! let task = Task::spawn(progress, |p| {
//!     for _ in 0..1_000 {
//!         p.inc(1);
//!         std::thread::sleep(Duration::from_millis(2));
//!     }
//! })
//! .expect("spawn");
//!
//! let mut renderer = ConsoleRenderer::default();
//! task.monitor(&mut renderer, Duration::from_secs(60));
//! task.join().expect("task");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod builder;
pub mod bytes;
pub mod error;
pub mod format;
pub mod io;
pub mod iter;
pub mod monitor;
pub mod pool;
pub mod progress;
pub mod rate;
pub mod render;
pub mod task;

pub use builder::ProgressBuilder;
pub use bytes::{ByteProgress, ByteProgressSnapshot};
pub use error::{BoxError, Error, Result, WorkerFault};
pub use format::DisplayFormat;
pub use iter::{ProgressIter, ProgressIteratorExt};
pub use monitor::{Monitor, monitor};
pub use pool::{Action, CancelToken, WorkerContext, WorkerPool, WorkerState};
pub use progress::{Progress, ProgressSnapshot};
pub use rate::RateFilter;
pub use render::{Console, ConsoleRenderer, LineOptions, PlainConsole, Stdout};
pub use task::{Completion, Task, Tracked};

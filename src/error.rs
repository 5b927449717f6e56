//! Error types shared across the crate.
//!
//! Rendering problems are deliberately absent here: a console without cursor support
//! degrades the renderer instead of failing, and write errors are plain [`std::io::Error`]s.

use std::{error::Error as StdError, fmt, time::Duration};

use thiserror::Error;

/// A boxed error returned by worker actions.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Convenience alias for results produced by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by progress construction, tasks and the worker pool.
#[derive(Error, Debug)]
pub enum Error {
    /// A pool was asked to launch zero workers.
    #[error("worker pool needs at least one worker")]
    InvalidWorkerCount,

    /// The rate filter half-life must be a positive, finite duration.
    #[error("invalid smoothing half-life: {0:?}")]
    InvalidHalfLife(Duration),

    /// The OS refused to start a thread.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// One or more workers faulted. The first observed fault is kept as the source.
    #[error("{count} worker(s) faulted, first: {first}")]
    WorkerFaults {
        /// The first fault recorded by the pool.
        #[source]
        first: WorkerFault,
        /// Total number of faults collected at this join point.
        count: usize,
    },

    /// A monitored background task panicked.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

/// A failure recorded for a single worker.
#[derive(Debug)]
pub struct WorkerFault {
    worker: usize,
    source: BoxError,
}

impl WorkerFault {
    pub(crate) fn new(worker: usize, source: BoxError) -> Self {
        Self { worker, source }
    }

    pub(crate) fn from_panic(worker: usize, payload: &(dyn std::any::Any + Send)) -> Self {
        Self::new(worker, panic_message(payload).into())
    }

    /// Index of the worker that faulted.
    #[must_use]
    pub const fn worker(&self) -> usize {
        self.worker
    }

    /// The error the worker returned (or its panic message).
    #[must_use]
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}: {}", self.worker, self.source)
    }
}

impl StdError for WorkerFault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

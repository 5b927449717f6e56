//! A fixed-size pool of cooperatively cancellable workers.
//!
//! [`WorkerPool`] launches its workers immediately on construction, each running either
//! a shared action or its own. This is not a general thread pool: there is no queue and
//! no reuse, just `N` threads and one shared [`CancelToken`].
//!
//! # Lifecycle
//!
//! Every worker starts [`Running`](WorkerState::Running) and ends in exactly one terminal
//! state: completed, cancelled (returned after cancellation was raised) or faulted
//! (returned an error or panicked). Faults do not stop siblings. They are collected and
//! handed to the next caller of [`wait_all`](WorkerPool::wait_all) or
//! [`cancel_all`](WorkerPool::cancel_all), first observed fault first.
//!
//! # Cancellation
//!
//! Cancellation is cooperative. [`WorkerPool::cancel_all`] raises the token and then waits;
//! a worker that never checks [`WorkerContext::is_cancelled`] is never interrupted.

use std::{
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    error::{BoxError, Error, Result, WorkerFault},
    task::Completion,
};

/// A boxed, single-use worker action.
pub type Action = Box<dyn FnOnce(&WorkerContext) -> Result<(), BoxError> + Send + 'static>;

/// A shared cooperative cancellation flag.
///
/// Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a worker is handed at launch.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    index: usize,
    token: CancelToken,
}

impl WorkerContext {
    /// The worker's position in the pool, from zero.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The pool's shared cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Shorthand for `self.token().is_cancelled()`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// The state of a single worker.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerState {
    /// Launched and not yet returned.
    Running = 0,
    /// Returned successfully without cancellation.
    Completed = 1,
    /// Returned successfully after cancellation was raised.
    Cancelled = 2,
    /// Returned an error or panicked.
    Faulted = 3,
}

impl WorkerState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Completed,
            2 => Self::Cancelled,
            _ => Self::Faulted,
        }
    }

    /// Whether the worker has finished, one way or another.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// State shared between the pool and its worker threads.
struct Shared {
    states: Vec<AtomicU8>,
    faults: Mutex<Vec<WorkerFault>>,
}

impl Shared {
    fn state(&self, index: usize) -> WorkerState {
        WorkerState::from_u8(self.states[index].load(Ordering::Acquire))
    }
}

/// A fixed set of concurrently running workers sharing one cancellation token.
pub struct WorkerPool {
    token: CancelToken,
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Launches `count` workers that all run `action`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerCount`] if `count` is zero, or [`Error::Spawn`] if a
    /// thread cannot be started (already launched workers are cancelled and joined).
    pub fn new<F, E>(count: usize, action: F) -> Result<Self>
    where
        F: Fn(&WorkerContext) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        if count == 0 {
            return Err(Error::InvalidWorkerCount);
        }

        let action = Arc::new(action);
        let actions = (0..count)
            .map(|_| {
                let action = Arc::clone(&action);
                Box::new(move |ctx: &WorkerContext| -> Result<(), BoxError> {
                    action(ctx).map_err(Into::into)
                }) as Action
            })
            .collect();

        Self::launch(actions)
    }

    /// Launches one worker per available CPU, all running `action`.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::new`].
    pub fn with_available_parallelism<F, E>(action: F) -> Result<Self>
    where
        F: Fn(&WorkerContext) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let count = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::new(count, action)
    }

    /// Launches one worker per action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerCount`] if `actions` is empty, or [`Error::Spawn`] if
    /// a thread cannot be started.
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Result<Self> {
        let actions: Vec<Action> = actions.into_iter().collect();
        if actions.is_empty() {
            return Err(Error::InvalidWorkerCount);
        }
        Self::launch(actions)
    }

    fn launch(actions: Vec<Action>) -> Result<Self> {
        let token = CancelToken::new();
        let shared = Arc::new(Shared {
            states: (0..actions.len())
                .map(|_| AtomicU8::new(WorkerState::Running as u8))
                .collect(),
            faults: Mutex::new(Vec::new()),
        });

        debug!(workers = actions.len(), "launching worker pool");

        let mut pool = Self {
            token,
            shared,
            handles: Vec::with_capacity(actions.len()),
        };

        for (index, action) in actions.into_iter().enumerate() {
            let ctx = WorkerContext {
                index,
                token: pool.token.clone(),
            };
            let shared = Arc::clone(&pool.shared);

            // On failure the pool is dropped, which cancels and joins whatever did start.
            let handle = thread::Builder::new()
                .name(format!("worker-{index}"))
                .spawn(move || run_worker(&ctx, &shared, action))?;
            pool.handles.push(handle);
        }

        Ok(pool)
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.states.len()
    }

    /// Always `false`: a pool has at least one worker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.states.is_empty()
    }

    /// The shared cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// A point-in-time copy of every worker's state.
    #[must_use]
    pub fn states(&self) -> Vec<WorkerState> {
        (0..self.len()).map(|i| self.shared.state(i)).collect()
    }

    /// Whether at least one worker is still running.
    ///
    /// Racy by nature; meant for coarse polling.
    #[must_use]
    pub fn is_working(&self) -> bool {
        (0..self.len()).any(|i| self.shared.state(i) == WorkerState::Running)
    }

    /// Raises cancellation, then blocks until every worker has exited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerFaults`] if any worker faulted.
    pub fn cancel_all(&mut self) -> Result<()> {
        debug!("cancelling worker pool");
        self.token.cancel();
        self.wait_all()
    }

    /// Blocks until every worker has exited, without raising cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerFaults`] carrying the first recorded fault and the fault
    /// count. Faults are reported once; a later call returns `Ok` unless new faults occur.
    pub fn wait_all(&mut self) -> Result<()> {
        for handle in self.handles.drain(..) {
            // Worker panics are caught inside the thread; a join error cannot carry one.
            let _ = handle.join();
        }

        let mut faults = std::mem::take(&mut *self.shared.faults.lock()).into_iter();
        match faults.next() {
            Some(first) => Err(Error::WorkerFaults {
                first,
                count: faults.len() + 1,
            }),
            None => Ok(()),
        }
    }
}

impl Completion for WorkerPool {
    /// Whether every worker has reached a terminal state.
    fn is_complete(&self) -> bool {
        (0..self.len()).all(|i| self.shared.state(i).is_terminal())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.token.cancel();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_worker(ctx: &WorkerContext, shared: &Shared, action: Action) {
    let index = ctx.index;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(ctx)));

    let state = match outcome {
        Ok(Ok(())) if ctx.is_cancelled() => WorkerState::Cancelled,
        Ok(Ok(())) => WorkerState::Completed,
        Ok(Err(error)) => {
            warn!(worker = index, %error, "worker faulted");
            shared.faults.lock().push(WorkerFault::new(index, error));
            WorkerState::Faulted
        }
        Err(payload) => {
            let fault = WorkerFault::from_panic(index, payload.as_ref());
            warn!(worker = index, error = %fault, "worker panicked");
            shared.faults.lock().push(fault);
            WorkerState::Faulted
        }
    };

    shared.states[index].store(state as u8, Ordering::Release);
    debug!(worker = index, ?state, "worker exited");
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
        time::{Duration, Instant},
    };

    use super::{Action, WorkerContext, WorkerPool, WorkerState};
    use crate::{
        error::{BoxError, Error},
        task::Completion,
    };

    fn no_op(_: &WorkerContext) -> Result<(), BoxError> {
        Ok(())
    }

    fn poll_until_cancelled(ctx: &WorkerContext) -> Result<(), BoxError> {
        while !ctx.is_cancelled() {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    /// Wait All
    /// Four no-op workers all complete.
    #[test]
    fn test_wait_all_no_op() {
        let mut pool = WorkerPool::new(4, no_op).unwrap();
        assert_eq!(pool.len(), 4);

        pool.wait_all().unwrap();
        assert!(pool.is_complete());
        assert!(!pool.is_working());
        assert_eq!(pool.states(), vec![WorkerState::Completed; 4]);
    }

    /// Misuse fails fast.
    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            WorkerPool::new(0, no_op),
            Err(Error::InvalidWorkerCount)
        ));
        assert!(matches!(
            WorkerPool::from_actions(Vec::new()),
            Err(Error::InvalidWorkerCount)
        ));
    }

    /// Default parallelism launches at least one worker.
    #[test]
    fn test_available_parallelism() {
        let mut pool = WorkerPool::with_available_parallelism(no_op).unwrap();
        assert!(pool.len() >= 1);
        pool.wait_all().unwrap();
    }

    /// Cancel All
    /// Polling workers exit promptly and end up cancelled.
    #[test]
    fn test_cancel_all() {
        let mut pool = WorkerPool::new(3, poll_until_cancelled).unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(pool.is_working());
        assert!(!pool.is_complete());

        let started = Instant::now();
        pool.cancel_all().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        assert!(pool.is_complete());
        assert!(pool.token().is_cancelled());
        assert_eq!(pool.states(), vec![WorkerState::Cancelled; 3]);
    }

    /// Distinct Actions
    #[test]
    fn test_distinct_actions() {
        let hits = Arc::new([AtomicUsize::new(0), AtomicUsize::new(0)]);

        let actions: Vec<Action> = (0..2usize)
            .map(|n| {
                let hits = Arc::clone(&hits);
                Box::new(move |ctx: &WorkerContext| -> Result<(), BoxError> {
                    assert_eq!(ctx.index(), n);
                    hits[n].fetch_add(n + 1, Ordering::Relaxed);
                    Ok(())
                }) as Action
            })
            .collect();

        let mut pool = WorkerPool::from_actions(actions).unwrap();
        pool.wait_all().unwrap();

        assert_eq!(hits[0].load(Ordering::Relaxed), 1);
        assert_eq!(hits[1].load(Ordering::Relaxed), 2);
    }

    /// Fault Aggregation
    /// Faults do not stop siblings and surface once at the join point.
    #[test]
    fn test_faults_are_aggregated() {
        let mut pool = WorkerPool::new(4, |ctx: &WorkerContext| -> Result<(), BoxError> {
            match ctx.index() {
                1 => Err("bad input".into()),
                3 => panic!("worker blew up"),
                _ => Ok(()),
            }
        })
        .unwrap();

        match pool.wait_all() {
            Err(Error::WorkerFaults { first, count }) => {
                assert_eq!(count, 2);
                assert!([1, 3].contains(&first.worker()));
            }
            other => panic!("expected aggregated faults, got {other:?}"),
        }

        let states = pool.states();
        assert_eq!(states[0], WorkerState::Completed);
        assert_eq!(states[1], WorkerState::Faulted);
        assert_eq!(states[2], WorkerState::Completed);
        assert_eq!(states[3], WorkerState::Faulted);

        // Reported once.
        pool.wait_all().unwrap();
    }

    /// A panic message is kept as the fault's error.
    #[test]
    fn test_panic_becomes_fault() {
        let mut pool = WorkerPool::new(1, |_: &WorkerContext| -> Result<(), BoxError> {
            panic!("kaboom");
        })
        .unwrap();

        match pool.cancel_all() {
            Err(Error::WorkerFaults { first, count: 1 }) => {
                assert_eq!(first.worker(), 0);
                assert_eq!(first.error().to_string(), "kaboom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    /// Dropping a pool cancels and joins its workers.
    #[test]
    fn test_drop_cancels() {
        let exited = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&exited);

        let pool = WorkerPool::new(2, move |ctx: &WorkerContext| -> Result<(), BoxError> {
            poll_until_cancelled(ctx)?;
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();

        drop(pool);
        assert_eq!(exited.load(Ordering::Relaxed), 2);
    }
}

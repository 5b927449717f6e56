//! Background units of work that a monitor can watch.
//!
//! [`Task::spawn`] runs an action on its own thread with a [`Tracked`] progress
//! handle, starting the progress timer before the action and finishing it afterwards
//! (even if the action panics). The returned [`Task`] answers "is it done yet?" and
//! can be joined for the action's result.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use compact_str::CompactString;
use tracing::debug;

use crate::{
    bytes::ByteProgress,
    error::{Error, Result, panic_message},
    monitor::Monitor,
    progress::Progress,
    render::{Console, ConsoleRenderer, LineOptions, compose_line},
};

/// Something whose completion can be polled.
pub trait Completion {
    /// Returns `true` once the work has reached a terminal state.
    fn is_complete(&self) -> bool;
}

/// A progress handle the monitor loop knows how to start, finish and draw.
pub trait Tracked: Clone + Send + 'static {
    /// Starts the elapsed timer and resets rates.
    fn start(&self);

    /// Marks the work finished.
    fn finish(&self);

    /// Refreshes rates and composes the display line.
    fn render_line(&self, options: &LineOptions) -> CompactString;
}

impl Tracked for Progress {
    fn start(&self) {
        self.run();
    }

    fn finish(&self) {
        Self::finish(self);
    }

    fn render_line(&self, options: &LineOptions) -> CompactString {
        let snap = self.snapshot();
        compose_line(snap.description(), &snap.status(options), snap.item(), options)
    }
}

impl Tracked for ByteProgress {
    fn start(&self) {
        self.run();
    }

    fn finish(&self) {
        Self::finish(self);
    }

    fn render_line(&self, options: &LineOptions) -> CompactString {
        let snap = self.snapshot();
        let items = snap.items();
        compose_line(items.description(), &snap.status(options), items.item(), options)
    }
}

impl Completion for Progress {
    fn is_complete(&self) -> bool {
        self.is_finished()
    }
}

impl Completion for ByteProgress {
    fn is_complete(&self) -> bool {
        self.progress().is_finished()
    }
}

/// A unit of work running on a background thread.
pub struct Task<P, T> {
    progress: P,
    done: Arc<AtomicBool>,
    handle: JoinHandle<T>,
}

/// Sets the completion flag when the worker thread leaves the action, panicking or not.
struct DoneGuard<P: Tracked> {
    progress: P,
    done: Arc<AtomicBool>,
}

impl<P: Tracked> Drop for DoneGuard<P> {
    fn drop(&mut self) {
        self.progress.finish();
        self.done.store(true, Ordering::Release);
    }
}

impl<P: Tracked, T: Send + 'static> Task<P, T> {
    /// Spawns `action` on a new thread, handing it a clone of `progress`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the thread cannot be created.
    pub fn spawn<F>(progress: P, action: F) -> Result<Self>
    where
        F: FnOnce(P) -> T + Send + 'static,
    {
        Self::spawn_with(
            thread::Builder::new().name("progress-task".into()),
            progress,
            action,
        )
    }

    /// Like [`spawn`](Self::spawn), on a thread configured by `builder`.
    ///
    /// If the thread cannot be created, `progress` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the thread cannot be created.
    pub fn spawn_with<F>(builder: thread::Builder, progress: P, action: F) -> Result<Self>
    where
        F: FnOnce(P) -> T + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let thread_done = Arc::clone(&done);
        let worker_progress = progress.clone();

        let handle = builder.spawn(move || {
            let _guard = DoneGuard {
                progress: worker_progress.clone(),
                done: thread_done,
            };
            worker_progress.start();
            action(worker_progress)
        })?;

        Ok(Self {
            progress,
            done,
            handle,
        })
    }

    /// The progress handle this task reports through.
    pub const fn progress(&self) -> &P {
        &self.progress
    }

    /// Polls and redraws this task's progress until it completes or `timeout` passes.
    ///
    /// Returns `true` if the task completed. See [`Monitor::run`].
    pub fn monitor<C: Console>(
        &self,
        renderer: &mut ConsoleRenderer<C>,
        timeout: Duration,
    ) -> bool {
        Monitor::new()
            .timeout(timeout)
            .run(&self.progress, self, renderer)
    }

    /// Blocks until the action returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskPanicked`] if the action panicked.
    pub fn join(self) -> Result<T> {
        self.handle.join().map_err(|payload| {
            let message = panic_message(payload.as_ref());
            debug!(%message, "background task panicked");
            Error::TaskPanicked(message)
        })
    }
}

impl<P, T> Completion for Task<P, T> {
    fn is_complete(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

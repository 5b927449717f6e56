//! The blocking poll-and-redraw loop.
//!
//! [`Monitor::run`] is the only place the rendering side waits. It renders, sleeps for
//! the poll interval, and repeats until the watched [`Completion`] reports done or the
//! timeout runs out, then finalizes the line. Tasks expose a completion flag rather than
//! a notification channel, so this is an explicit sleep-poll on the calling thread.

use std::{thread, time::Duration};

use tracing::{debug, warn};
use web_time::Instant;

use crate::{
    render::{Console, ConsoleRenderer, LineOptions},
    task::{Completion, Tracked},
};

/// Default time between redraws.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for a monitor loop.
#[derive(Clone, Debug, Default)]
pub struct Monitor {
    poll_interval: Option<Duration>,
    timeout: Option<Duration>,
    options: LineOptions,
}

impl Monitor {
    /// A monitor with the default poll interval, no timeout and default line options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time between redraws.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Gives up waiting after `timeout` of wall-clock time.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets what each rendered line shows.
    #[must_use]
    pub fn line_options(mut self, options: LineOptions) -> Self {
        self.options = options;
        self
    }

    /// Redraws `source` until `work` completes or the timeout passes.
    ///
    /// Always ends with one finalizing render. Render failures are logged and never
    /// interrupt the loop. Returns `true` if completion, not the timeout, ended it.
    pub fn run<S, W, C>(&self, source: &S, work: &W, renderer: &mut ConsoleRenderer<C>) -> bool
    where
        S: Tracked,
        W: Completion + ?Sized,
        C: Console,
    {
        let interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        let started = Instant::now();

        let completed = loop {
            if work.is_complete() {
                break true;
            }

            if let Err(error) = renderer.render(&source.render_line(&self.options)) {
                warn!(%error, "progress render failed");
            }

            if self.timeout.is_some_and(|timeout| started.elapsed() >= timeout) {
                debug!(elapsed = ?started.elapsed(), "monitor timed out");
                break false;
            }

            thread::sleep(interval);
        };

        if let Err(error) = renderer.finalize(&source.render_line(&self.options)) {
            warn!(%error, "final progress render failed");
        }

        completed
    }
}

/// Monitors `source` until `work` completes or `timeout` passes, with default options.
pub fn monitor<S, W, C>(
    source: &S,
    work: &W,
    renderer: &mut ConsoleRenderer<C>,
    timeout: Duration,
) -> bool
where
    S: Tracked,
    W: Completion + ?Sized,
    C: Console,
{
    Monitor::new().timeout(timeout).run(source, work, renderer)
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::{Monitor, monitor};
    use crate::{
        error::BoxError,
        pool::{WorkerContext, WorkerPool},
        progress::Progress,
        render::{ConsoleRenderer, LineOptions, PlainConsole},
        task::Task,
    };

    fn plain_renderer() -> ConsoleRenderer<PlainConsole<Vec<u8>>> {
        ConsoleRenderer::new(PlainConsole::new(Vec::new()))
    }

    /// Completion Path
    #[test]
    fn test_monitor_completes() {
        let task = Task::spawn(Progress::new("work", 5, 0), |p| {
            for _ in 0..5 {
                p.inc(1);
                thread::sleep(Duration::from_millis(20));
            }
        })
        .unwrap();

        let mut renderer = plain_renderer();
        assert!(task.monitor(&mut renderer, Duration::from_secs(10)));
        task.join().unwrap();

        let out = String::from_utf8(renderer.into_console().into_inner()).unwrap();
        assert!(out.ends_with('\n'));
        assert_eq!(out.matches('\n').count(), 1);
        assert!(out.contains("work: 5/5"), "final render shows the finished state: {out:?}");
    }

    /// Timeout Path
    /// A short timeout returns false and still finalizes the line.
    #[test]
    fn test_monitor_times_out() {
        let progress = Progress::new("slow", 100, 0);
        let task = Task::spawn(progress.clone(), |_| {
            thread::sleep(Duration::from_millis(500));
        })
        .unwrap();

        let mut renderer = plain_renderer();
        let completed = monitor(&progress, &task, &mut renderer, Duration::from_millis(60));
        assert!(!completed);

        let out = String::from_utf8(renderer.into_console().into_inner()).unwrap();
        assert!(out.ends_with("    \n"), "final render emitted: {out:?}");

        task.join().unwrap();
    }

    /// Already-complete work renders exactly once, as the finalizing render.
    #[test]
    fn test_monitor_already_complete() {
        let progress = Progress::new("done", 1, 1);
        progress.finish();

        let mut renderer = plain_renderer();
        let options = LineOptions {
            description_width: 0,
            show_rate: false,
            show_elapsed: false,
        };
        let completed = Monitor::new()
            .poll_interval(Duration::from_millis(1))
            .line_options(options)
            .run(&progress, &progress, &mut renderer);
        assert!(completed);

        let out = String::from_utf8(renderer.into_console().into_inner()).unwrap();
        assert_eq!(out, "\rdone: 1/1    \n");
    }

    /// Pool-Driven Progress
    /// Workers share one progress; the monitor watches the pool.
    #[test]
    fn test_monitor_worker_pool() {
        let progress = Progress::new("chunks", 40, 0);
        let shared = progress.clone();
        progress.run();

        let mut pool = WorkerPool::new(4, move |_: &WorkerContext| -> Result<(), BoxError> {
            for _ in 0..10 {
                shared.inc(1);
                thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        })
        .unwrap();

        let mut renderer = plain_renderer();
        assert!(monitor(&progress, &pool, &mut renderer, Duration::from_secs(10)));
        pool.wait_all().unwrap();

        let out = String::from_utf8(renderer.into_console().into_inner()).unwrap();
        assert!(out.contains("chunks: 40/40"), "{out:?}");
    }
}

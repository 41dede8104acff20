//! Lock acquisition with contention reporting.

use std::{
    fmt,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Blocking time above which lock acquisition is reported by default.
pub const DEFAULT_LOCK_WARNING_THRESHOLD: Duration = Duration::from_millis(100);

/// A thread waited longer than the configured threshold for a lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockContention {
    /// Name of the blocked thread, or its id when unnamed.
    pub thread: String,
    /// How long the thread was blocked.
    pub waited: Duration,
    /// The contended resource.
    pub resource: &'static str,
}

impl fmt::Display for LockContention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "thread {} was blocked for {} ms on {}",
            self.thread,
            self.waited.as_millis(),
            self.resource
        )
    }
}

/// Receives diagnostics raised by a component manager.
///
/// Implementations must not call back into the manager that reported the
/// diagnostic.
pub trait DiagnosticSink: Send + Sync {
    /// Called after a slow lock acquisition completed.
    fn lock_contention(&self, report: &LockContention);
}

/// The default sink: reports through `tracing` at warn level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn lock_contention(&self, report: &LockContention) {
        tracing::warn!(
            thread = %report.thread,
            waited_ms = u64::try_from(report.waited.as_millis()).unwrap_or(u64::MAX),
            resource = report.resource,
            "lock acquisition was slow",
        );
    }
}

/// A re-entrant mutex that times blocked acquisitions.
pub(crate) struct TimedLock<T> {
    mutex: ReentrantMutex<T>,
    threshold: Duration,
    sink: Arc<dyn DiagnosticSink>,
    resource: &'static str,
}

impl<T> TimedLock<T> {
    pub(crate) fn new(
        value: T,
        resource: &'static str,
        threshold: Duration,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            mutex: ReentrantMutex::new(value),
            threshold,
            sink,
            resource,
        }
    }

    /// Acquires the lock, reporting to the sink when blocking took longer
    /// than the threshold. Uncontended and re-entrant acquisitions are not
    /// timed.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, T> {
        if let Some(guard) = self.mutex.try_lock() {
            return guard;
        }

        let started = Instant::now();
        let guard = self.mutex.lock();
        let waited = started.elapsed();
        if waited > self.threshold {
            self.sink.lock_contention(&LockContention {
                thread: current_thread_name(),
                waited,
                resource: self.resource,
            });
        }
        guard
    }
}

fn current_thread_name() -> String {
    let current = thread::current();
    current
        .name()
        .map_or_else(|| format!("{:?}", current.id()), str::to_owned)
}

impl<T> fmt::Debug for TimedLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedLock")
            .field("resource", &self.resource)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Barrier, mpsc};

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LockContention>>);

    impl DiagnosticSink for Recorder {
        fn lock_contention(&self, report: &LockContention) {
            self.0.lock().push(report.clone());
        }
    }

    #[test]
    fn uncontended_and_reentrant_locks_are_silent() {
        let recorder = Arc::new(Recorder::default());
        let lock = TimedLock::new(5, "test", Duration::ZERO, recorder.clone());
        let outer = lock.lock();
        let inner = lock.lock();
        assert_eq!(*outer + *inner, 10);
        assert!(recorder.0.lock().is_empty());
    }

    #[test]
    fn slow_acquisition_is_reported() {
        let recorder = Arc::new(Recorder::default());
        let lock = Arc::new(TimedLock::new(
            (),
            "test",
            Duration::from_millis(5),
            recorder.clone(),
        ));
        let held = Arc::new(Barrier::new(2));
        let (release, released) = mpsc::channel::<()>();

        let holder = {
            let lock = Arc::clone(&lock);
            let held = Arc::clone(&held);
            thread::Builder::new()
                .name("holder".to_owned())
                .spawn(move || {
                    let _guard = lock.lock();
                    held.wait();
                    released.recv().expect("release signal");
                })
                .expect("spawn holder")
        };

        held.wait();
        let waiter = {
            let lock = Arc::clone(&lock);
            thread::Builder::new()
                .name("waiter".to_owned())
                .spawn(move || drop(lock.lock()))
                .expect("spawn waiter")
        };
        thread::sleep(Duration::from_millis(40));
        release.send(()).expect("send release");
        holder.join().expect("holder panicked");
        waiter.join().expect("waiter panicked");

        let reports = recorder.0.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].thread, "waiter");
        assert_eq!(reports[0].resource, "test");
        assert!(reports[0].waited > Duration::from_millis(5));
    }

    #[test]
    fn reports_render_in_milliseconds() {
        let report = LockContention {
            thread: "main".to_owned(),
            waited: Duration::from_millis(250),
            resource: "components",
        };
        assert_eq!(
            report.to_string(),
            "thread main was blocked for 250 ms on components"
        );
    }
}

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use indexmap::IndexMap;

use crate::report::TimingReport;
use crate::timer_error::SplitTimerError;

pub(crate) type ReportCallback = Arc<dyn Fn(TimingReport) + Send + Sync + 'static>;

/// The ephemeral timing record for one in-flight request.
///
/// `started_at` doubles as the lifecycle marker: `None` before the first
/// start and again once the timer has stopped, so late splits are rejected
/// the same way as splits on a never-started timer.
struct TimerState {
    started_at: Option<Instant>,
    splits: IndexMap<String, f64>,
    callback: Option<ReportCallback>,
    finalize_claimed: bool,
}

/// Shared handle to one request's timing state.
///
/// The start layer inserts a `TimerHandle` into the request's extensions,
/// so handlers can pull it back out with `Extension<TimerHandle>` and
/// record splits directly. The handle is scoped to its request: it travels
/// with the request's extensions and is dropped with them, so state never
/// outlives the request. The mutex exists because tower futures may migrate
/// between worker threads across polls; within one request the operations
/// run sequentially and the lock is never contended.
#[derive(Clone)]
pub struct TimerHandle {
    state: Arc<Mutex<TimerState>>,
}

impl TimerHandle {
    pub(crate) fn new() -> Self {
        TimerHandle {
            state: Arc::new(Mutex::new(TimerState {
                started_at: None,
                splits: IndexMap::new(),
                callback: None,
                finalize_claimed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        // Single logical thread of control per request; a poisoned lock can
        // only mean a panic already unwinding through the host, so recover.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One start-layer pass: warn if timings will go unreported, update the
    /// callback (a new one wins, a missing one never clears the old), then
    /// restart the clock and drop any previously recorded splits.
    ///
    /// Returns true if this caller claimed the finalizer role, which
    /// happens exactly once per request no matter how many start layers
    /// are stacked.
    pub(crate) fn begin(&self, callback: Option<ReportCallback>) -> bool {
        let mut state = self.lock();
        if callback.is_none() && state.callback.is_none() && !state.finalize_claimed {
            tracing::warn!(
                "no completion callback registered; register one to receive timing results"
            );
        }
        if callback.is_some() {
            state.callback = callback;
        }
        let claimed = !state.finalize_claimed;
        state.finalize_claimed = true;
        state.started_at = Some(Instant::now());
        state.splits.clear();
        claimed
    }

    /// Record the elapsed time since start under `key`.
    ///
    /// Re-using a key overwrites the previous value and logs a warning.
    pub fn split(&self, key: &str) -> Result<(), SplitTimerError> {
        if key.is_empty() {
            return Err(SplitTimerError::EmptyKey);
        }
        let mut state = self.lock();
        let Some(started_at) = state.started_at else {
            return Err(SplitTimerError::NotStarted);
        };
        let elapsed = elapsed_ms(started_at);
        if state.splits.contains_key(key) {
            tracing::warn!("duplicate split key {key:?}; the previous value will be overwritten");
        }
        state.splits.insert(key.to_string(), elapsed);
        Ok(())
    }

    pub(crate) fn finalize(&self, path: &str) {
        let (report, callback) = {
            let mut state = self.lock();
            let Some(started_at) = state.started_at.take() else {
                // Already stopped; nothing left to report.
                return;
            };
            let report = TimingReport {
                path: path.to_string(),
                start_ms: 0.0,
                end_ms: elapsed_ms(started_at),
                splits: std::mem::take(&mut state.splits),
            };
            (report, state.callback.take())
        };
        tracing::trace!("request timing complete: {report}");
        // Invoked outside the lock so the callback may use the handle.
        if let Some(callback) = callback {
            callback(report);
        }
    }
}

fn elapsed_ms(from: Instant) -> f64 {
    from.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_split_before_begin_is_rejected() {
        let handle = TimerHandle::new();
        assert_eq!(handle.split("key"), Err(SplitTimerError::NotStarted));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let handle = TimerHandle::new();
        handle.begin(None);
        assert_eq!(handle.split(""), Err(SplitTimerError::EmptyKey));
    }

    #[test]
    fn test_first_begin_claims_the_finalizer() {
        let handle = TimerHandle::new();
        assert!(handle.begin(None));
        assert!(!handle.begin(None));
        assert!(!handle.begin(None));
    }

    #[test]
    fn test_begin_clears_previous_splits() {
        let handle = TimerHandle::new();
        handle.begin(None);
        handle.split("marker").unwrap();
        let reported: Arc<Mutex<Option<TimingReport>>> = Arc::new(Mutex::new(None));
        let slot = reported.clone();
        handle.begin(Some(Arc::new(move |report| {
            *slot.lock().unwrap() = Some(report);
        })));
        handle.finalize("/");
        let report = reported.lock().unwrap().take().unwrap();
        assert!(report.get("marker").is_none());
    }

    #[test]
    fn test_bare_begin_keeps_the_registered_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = TimerHandle::new();
        handle.begin(Some(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        handle.begin(None);
        handle.finalize("/");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finalize_zeroes_start_and_orders_end_after_splits() {
        let reported: Arc<Mutex<Option<TimingReport>>> = Arc::new(Mutex::new(None));
        let slot = reported.clone();
        let handle = TimerHandle::new();
        handle.begin(Some(Arc::new(move |report| {
            *slot.lock().unwrap() = Some(report);
        })));
        std::thread::sleep(Duration::from_millis(2));
        handle.split("marker").unwrap();
        std::thread::sleep(Duration::from_millis(2));
        handle.finalize("/widgets");
        let report = reported.lock().unwrap().take().unwrap();
        assert_eq!(report.path, "/widgets");
        assert_eq!(report.start_ms, 0.0);
        let marker = report.get("marker").unwrap();
        assert!(marker > 0.0);
        assert!(report.end_ms > marker);
    }

    #[test]
    fn test_duplicate_key_overwrites_with_later_value() {
        let handle = TimerHandle::new();
        handle.begin(None);
        handle.split("key").unwrap();
        let reported: Arc<Mutex<Option<TimingReport>>> = Arc::new(Mutex::new(None));
        let slot = reported.clone();
        {
            let mut state = handle.lock();
            state.callback = Some(Arc::new(move |report| {
                *slot.lock().unwrap() = Some(report);
            }));
        }
        std::thread::sleep(Duration::from_millis(2));
        let first = {
            let state = handle.lock();
            state.splits["key"]
        };
        handle.split("key").unwrap();
        handle.finalize("/");
        let report = reported.lock().unwrap().take().unwrap();
        assert!(report.get("key").unwrap() > first);
    }

    #[test]
    fn test_state_is_inert_after_finalize() {
        let handle = TimerHandle::new();
        handle.begin(None);
        handle.finalize("/");
        assert_eq!(handle.split("late"), Err(SplitTimerError::NotStarted));
        // A second finalize must not fire anything.
        handle.finalize("/");
    }
}

//! Run progress counters.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Point-in-time view of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Work items in a terminal state
    pub completed: usize,
    /// Work items planned
    pub total: usize,
    /// Source files currently being processed
    pub active_files: usize,
}

impl ProgressSnapshot {
    /// Fraction complete in `[0, 1]`. An empty run is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

type Callback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    total: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Progress shared by all workers of a run.
///
/// `completed` only ever increases. The callback fires after every completed
/// item, from whichever task completed it.
#[derive(Clone, Default)]
pub struct Progress {
    counters: Arc<Counters>,
    callback: Option<Callback>,
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every completed item to `callback`.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressSnapshot) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn set_total(&self, total: usize) {
        self.counters.total.store(total, Ordering::SeqCst);
    }

    /// Mark one item terminal.
    pub fn advance(&self) {
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        if let Some(callback) = &self.callback {
            callback(self.snapshot());
        }
    }

    pub fn file_started(&self) {
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(active, Ordering::SeqCst);
    }

    pub fn file_finished(&self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of files in flight at once.
    pub fn peak_active_files(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.counters.completed.load(Ordering::SeqCst),
            total: self.counters.total.load(Ordering::SeqCst),
            active_files: self.counters.active.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_callback_sees_monotonic_counts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = Progress::new().with_callback(move |s| sink.lock().unwrap().push(s.completed));
        progress.set_total(3);
        progress.advance();
        progress.advance();
        progress.advance();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(progress.snapshot().fraction(), 1.0);
    }

    #[test]
    fn test_peak_active_files() {
        let progress = Progress::new();
        progress.file_started();
        progress.file_started();
        progress.file_finished();
        progress.file_started();
        progress.file_finished();
        progress.file_finished();

        assert_eq!(progress.peak_active_files(), 2);
        assert_eq!(progress.snapshot().active_files, 0);
    }

    #[test]
    fn test_empty_run_is_complete() {
        assert_eq!(Progress::new().snapshot().fraction(), 1.0);
    }
}

//! Shared result collection and progress counters for one scan.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use webprobe_core::{HttpMethod, ProbeError, ProbeOutcome, ProbeTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
pub struct TaskError {
    pub task: ProbeTask,
    pub error: ProbeError,
}

/// Everything a scan produced. `hits` and `errors` are in completion order.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub hits: Vec<ProbeOutcome>,
    pub errors: Vec<TaskError>,
    pub total_dispatched: usize,
}

impl ScanResult {
    /// `(url, method, status)` per hit.
    pub fn directory_hits(&self) -> Vec<(String, HttpMethod, u16)> {
        self.hits
            .iter()
            .filter_map(|o| o.status.map(|s| (o.url.clone(), o.task.method, s)))
            .collect()
    }

    /// `(url, method, payload)` per hit. The URL is the task's, without the
    /// injected query.
    pub fn injection_hits(&self) -> Vec<(String, HttpMethod, String)> {
        self.hits
            .iter()
            .filter_map(|o| o.task.payload.as_ref().map(|p| (o.task.url.clone(), o.task.method, p.value().to_string())))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub dispatched: usize,
    pub completed: usize,
    pub hits: usize,
    pub errors: usize,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    result: Mutex<ScanResult>,
    completed: AtomicUsize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScanResult> {
        self.result.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Hits go to `hits`; failed probes to `errors`; everything else is dropped.
    pub fn record(&self, outcome: ProbeOutcome, verdict: Verdict) {
        let mut r = self.lock();
        match (verdict, outcome.error.clone()) {
            (Verdict::Hit, _) => r.hits.push(outcome),
            (Verdict::Miss, Some(error)) => r.errors.push(TaskError { task: outcome.task, error }),
            (Verdict::Miss, None) => {}
        }
    }

    /// Record an error that is not tied to the probe itself (e.g. a body that
    /// could not be decoded for link extraction).
    pub fn record_error(&self, task: ProbeTask, error: ProbeError) {
        self.lock().errors.push(TaskError { task, error });
    }

    /// Count one task taken from the frontier.
    pub fn dispatched(&self) {
        self.lock().total_dispatched += 1;
    }

    /// Count one fully processed task.
    pub fn advance(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Progress {
        let r = self.lock();
        Progress {
            dispatched: r.total_dispatched,
            completed: self.completed.load(Ordering::SeqCst),
            hits: r.hits.len(),
            errors: r.errors.len(),
        }
    }

    pub fn finish(&self) -> ScanResult {
        std::mem::take(&mut *self.lock())
    }
}

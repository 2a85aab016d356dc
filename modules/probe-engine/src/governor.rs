//! Bounded worker pool that drains a frontier to quiescence.

use crate::aggregate::{Aggregator, ScanResult, Verdict};
use crate::frontier::Frontier;
use crate::matchers::Matcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};
use url::Url;
use web_surface::{BaselineCache, Prober};
use webprobe_core::{HttpMethod, JitterRange, ProbeError, ProbeOutcome, ProbeTask, ScanError};

#[derive(Debug, Clone)]
pub struct GovernorOptions {
    /// Hard cap on probes in flight.
    pub concurrency: usize,
    pub jitter: JitterRange,
    /// Extract links from hit bodies and queue them.
    pub expand: bool,
    /// Methods queued for each extracted link.
    pub methods: Vec<HttpMethod>,
    /// Capture a soft-404 baseline per origin before its first probe.
    pub baseline: bool,
}

impl Default for GovernorOptions {
    fn default() -> Self {
        GovernorOptions {
            concurrency: 10,
            jitter: JitterRange::none(),
            expand: false,
            methods: vec![HttpMethod::Get],
            baseline: true,
        }
    }
}

/// Best-effort cancellation: once stopped, nothing new is dispatched and
/// in-flight probes run to completion.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Shared<P, M> {
    frontier: Arc<Frontier>,
    prober: Arc<P>,
    matcher: M,
    baselines: Arc<BaselineCache>,
    aggregator: Arc<Aggregator>,
    opts: GovernorOptions,
}

pub struct Governor<P, M> {
    shared: Arc<Shared<P, M>>,
    stop: StopHandle,
}

impl<P: Prober, M: Matcher> Governor<P, M> {
    pub fn new(frontier: Arc<Frontier>, prober: Arc<P>, matcher: M, opts: GovernorOptions) -> Result<Self, ScanError> {
        Self::with_baselines(frontier, prober, matcher, Arc::new(BaselineCache::default()), opts)
    }

    pub fn with_baselines(
        frontier: Arc<Frontier>,
        prober: Arc<P>,
        matcher: M,
        baselines: Arc<BaselineCache>,
        opts: GovernorOptions,
    ) -> Result<Self, ScanError> {
        if opts.concurrency == 0 {
            return Err(ScanError::Config("concurrency must be at least 1".into()));
        }
        if opts.expand && opts.methods.is_empty() {
            return Err(ScanError::Config("no HTTP methods configured".into()));
        }
        let shared = Shared { frontier, prober, matcher, baselines, aggregator: Arc::new(Aggregator::new()), opts };
        Ok(Governor { shared: Arc::new(shared), stop: StopHandle::default() })
    }

    /// Live counters, readable while `run` is in progress.
    pub fn aggregator(&self) -> Arc<Aggregator> {
        self.shared.aggregator.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn frontier(&self) -> Arc<Frontier> {
        self.shared.frontier.clone()
    }

    /// Dispatch until the frontier is empty and no worker is in flight, or
    /// until stopped; then wait for outstanding workers and return the result.
    pub async fn run(self) -> ScanResult {
        let sh = self.shared;
        let sem = Arc::new(Semaphore::new(sh.opts.concurrency));
        let mut workers: JoinSet<()> = JoinSet::new();
        info!(concurrency = sh.opts.concurrency, pending = sh.frontier.pending_len(), "scan started");

        loop {
            if self.stop.is_stopped() {
                info!("stop requested; waiting for in-flight probes");
                break;
            }
            let Ok(permit) = sem.clone().acquire_owned().await else { break };
            // A stop may have arrived while waiting for the permit.
            if self.stop.is_stopped() {
                drop(permit);
                info!("stop requested; waiting for in-flight probes");
                break;
            }
            match sh.frontier.take() {
                Some(task) => {
                    sh.aggregator.dispatched();
                    workers.spawn(process(sh.clone(), task, permit));
                }
                None => {
                    drop(permit);
                    // Quiescent: nothing pending and nobody left who could add more.
                    let Some(res) = workers.join_next().await else { break };
                    reap(&sh.aggregator, res);
                }
            }
            while let Some(res) = workers.try_join_next() {
                reap(&sh.aggregator, res);
            }
        }
        while let Some(res) = workers.join_next().await {
            reap(&sh.aggregator, res);
        }

        let result = sh.aggregator.finish();
        info!(dispatched = result.total_dispatched, hits = result.hits.len(), errors = result.errors.len(), "scan finished");
        result
    }
}

fn reap(aggregator: &Aggregator, res: Result<(), JoinError>) {
    if let Err(e) = res {
        warn!(error = %e, "worker aborted");
        aggregator.advance();
    }
}

/// One task, start to finish. The permit is held until the outcome is recorded
/// and any frontier expansion is done.
async fn process<P: Prober, M: Matcher>(sh: Arc<Shared<P, M>>, task: ProbeTask, permit: OwnedSemaphorePermit) {
    let baseline = if sh.opts.baseline {
        sh.baselines.get_or_establish(&*sh.prober, &task.url).await
    } else {
        None
    };
    sh.opts.jitter.sleep().await;
    let outcome = sh.prober.probe(&task).await;
    let verdict = if outcome.error.is_none() && sh.matcher.matches(&outcome, baseline.as_deref()) {
        Verdict::Hit
    } else {
        Verdict::Miss
    };
    if verdict == Verdict::Hit && sh.opts.expand {
        expand(&sh, &outcome);
    }
    debug!(task = %task, status = ?outcome.status, ?verdict, "processed");
    sh.aggregator.record(outcome, verdict);
    sh.aggregator.advance();
    drop(permit);
}

fn expand<P, M>(sh: &Shared<P, M>, outcome: &ProbeOutcome) {
    if !outcome.is_html() {
        return;
    }
    let Some(body) = outcome.body.as_deref() else { return };
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
    let Some(text) = decode_html(body) else {
        let err = std::str::from_utf8(body).err().map(|e| e.to_string()).unwrap_or_default();
        sh.aggregator.record_error(outcome.task.clone(), ProbeError::decode(format!("body is not utf-8: {}", err)));
        return;
    };
    let Ok(base) = Url::parse(&outcome.final_url) else { return };
    sh.frontier.extract_and_enqueue(text, &base, &sh.opts.methods);
}

/// UTF-8 view of a possibly truncated body. A multibyte character cut off by
/// the byte cap at the very end is dropped; invalid bytes anywhere give `None`.
fn decode_html(body: &[u8]) -> Option<&str> {
    match std::str::from_utf8(body) {
        Ok(t) => Some(t),
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&body[..e.valid_up_to()]).ok(),
        Err(_) => None,
    }
}

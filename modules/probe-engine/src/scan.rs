//! Ready-made scans: directory enumeration and SQL-injection probing.

use crate::extract::FormSpec;
use crate::frontier::Frontier;
use crate::governor::{Governor, GovernorOptions};
use crate::matchers::{DirectoryMatcher, InjectionMatcher, DEFAULT_SQL_ERRORS};
use std::collections::HashSet;
use std::sync::Arc;
use web_surface::baseline::{origin_of, DEFAULT_NOT_FOUND};
use web_surface::{BaselineCache, Prober};
use webprobe_core::{HttpMethod, JitterRange, Payload, ProbeTask, ScanError, Target};

#[derive(Debug, Clone)]
pub struct DirScanOptions {
    pub concurrency: usize,
    pub jitter: JitterRange,
    pub methods: Vec<HttpMethod>,
    /// Non-2xx statuses that still count as a hit.
    pub interesting: Vec<u16>,
    /// Statuses a baseline response must have for its body to be fingerprinted.
    pub baseline_statuses: Vec<u16>,
    /// Follow links found in hit bodies.
    pub recurse: bool,
}

impl Default for DirScanOptions {
    fn default() -> Self {
        DirScanOptions {
            concurrency: 10,
            jitter: JitterRange::none(),
            methods: vec![HttpMethod::Get],
            interesting: vec![403],
            baseline_statuses: DEFAULT_NOT_FOUND.to_vec(),
            recurse: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliScanOptions {
    pub concurrency: usize,
    pub jitter: JitterRange,
    pub methods: Vec<HttpMethod>,
    /// Query parameter receiving the payload.
    pub param: String,
    pub patterns: Vec<String>,
    pub baseline_statuses: Vec<u16>,
}

impl Default for SqliScanOptions {
    fn default() -> Self {
        SqliScanOptions {
            concurrency: 10,
            jitter: JitterRange::none(),
            methods: vec![HttpMethod::Get],
            param: "id".to_string(),
            patterns: DEFAULT_SQL_ERRORS.iter().map(|s| s.to_string()).collect(),
            baseline_statuses: DEFAULT_NOT_FOUND.to_vec(),
        }
    }
}

/// Wordlist entries with blanks and `#` comments removed, order kept, duplicates dropped.
pub fn clean_words<S: AsRef<str>>(words: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    words
        .iter()
        .map(|w| w.as_ref().trim())
        .filter(|w| !w.is_empty() && !w.starts_with('#'))
        .filter(|w| seen.insert(w.to_string()))
        .map(|w| w.to_string())
        .collect()
}

/// One task per word per method, each word joined below the root.
pub fn directory_tasks(root: &Target, words: &[String], methods: &[HttpMethod]) -> Vec<ProbeTask> {
    words
        .iter()
        .flat_map(|w| methods.iter().map(move |&m| ProbeTask::new(root.join(w), m)))
        .collect()
}

/// One task per payload per method, the payload placed in `param` of the root URL.
pub fn query_injection_tasks(root: &Target, payloads: &[String], methods: &[HttpMethod], param: &str) -> Vec<ProbeTask> {
    payloads
        .iter()
        .flat_map(|p| {
            methods
                .iter()
                .map(move |&m| ProbeTask::new(root.0.clone(), m).with_payload(Payload::query(param, p.clone())))
        })
        .collect()
}

/// One task per injectable form per payload.
pub fn form_injection_tasks(forms: &[FormSpec], payloads: &[String]) -> Vec<ProbeTask> {
    forms
        .iter()
        .filter(|f| f.is_injectable())
        .flat_map(|f| payloads.iter().map(move |p| f.task_for(p)))
        .collect()
}

fn check_common(concurrency: usize, methods: &[HttpMethod]) -> Result<(), ScanError> {
    if concurrency == 0 {
        return Err(ScanError::Config("concurrency must be at least 1".into()));
    }
    if methods.is_empty() {
        return Err(ScanError::Config("no HTTP methods configured".into()));
    }
    Ok(())
}

/// Frontier scoped to the root's origin. Seeds and extracted links must share
/// one URL spelling, so the root needs a pinned scheme.
fn frontier_for(root: &Target) -> Result<Frontier, ScanError> {
    if !root.has_scheme() {
        return Err(ScanError::Config(format!("target {} has no scheme; resolve it before scanning", root)));
    }
    let origin = origin_of(&root.0).ok_or_else(|| ScanError::Config(format!("target {} has no origin", root)))?;
    Ok(Frontier::with_scope(origin))
}

/// Build a directory-enumeration governor over `words` below `root`. All
/// configuration is checked here; nothing has been sent when this returns.
/// `root` must carry a scheme (see `HttpProber::resolve_scheme`).
pub fn directory_scan<P: Prober>(
    prober: Arc<P>,
    root: &Target,
    words: &[String],
    opts: &DirScanOptions,
) -> Result<Governor<P, DirectoryMatcher>, ScanError> {
    check_common(opts.concurrency, &opts.methods)?;
    let words = clean_words(words);
    if words.is_empty() {
        return Err(ScanError::Config("wordlist is empty".into()));
    }
    let frontier = Arc::new(frontier_for(root)?);
    frontier.seed(directory_tasks(root, &words, &opts.methods));
    let gov = GovernorOptions {
        concurrency: opts.concurrency,
        jitter: opts.jitter,
        expand: opts.recurse,
        methods: opts.methods.clone(),
        baseline: true,
    };
    let matcher = DirectoryMatcher { interesting: opts.interesting.clone() };
    let baselines = Arc::new(BaselineCache::new(opts.baseline_statuses.clone()));
    Governor::with_baselines(frontier, prober, matcher, baselines, gov)
}

/// Build an injection governor over prepared tasks (query or form payloads).
pub fn injection_scan<P: Prober>(
    prober: Arc<P>,
    tasks: Vec<ProbeTask>,
    opts: &SqliScanOptions,
) -> Result<Governor<P, InjectionMatcher>, ScanError> {
    check_common(opts.concurrency, &opts.methods)?;
    if tasks.is_empty() {
        return Err(ScanError::Config("no injection tasks to run".into()));
    }
    let matcher = InjectionMatcher::new(&opts.patterns);
    if matcher.patterns().is_empty() {
        return Err(ScanError::Config("no database error patterns configured".into()));
    }
    let frontier = Arc::new(Frontier::new());
    frontier.seed(tasks);
    let gov = GovernorOptions {
        concurrency: opts.concurrency,
        jitter: opts.jitter,
        expand: false,
        methods: opts.methods.clone(),
        baseline: true,
    };
    let baselines = Arc::new(BaselineCache::new(opts.baseline_statuses.clone()));
    Governor::with_baselines(frontier, prober, matcher, baselines, gov)
}

/// Convenience: query-parameter injection against `root`.
pub fn query_injection_scan<P: Prober>(
    prober: Arc<P>,
    root: &Target,
    payloads: &[String],
    opts: &SqliScanOptions,
) -> Result<Governor<P, InjectionMatcher>, ScanError> {
    let payloads = clean_words(payloads);
    if payloads.is_empty() {
        return Err(ScanError::Config("payload list is empty".into()));
    }
    if opts.param.trim().is_empty() {
        return Err(ScanError::Config("injection parameter name is empty".into()));
    }
    let tasks = query_injection_tasks(root, &payloads, &opts.methods, opts.param.trim());
    injection_scan(prober, tasks, opts)
}

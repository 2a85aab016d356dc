//! Soft-404 baselines.
//!
//! Many sites route every unknown path to one branded error page, often with a
//! 200 status. Before probing a host we request a path that cannot exist and
//! remember what its "not found" body looks like; later responses with the same
//! body are not treated as hits, whatever their status.

use crate::client::Prober;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;
use webprobe_core::{ProbeOutcome, ProbeTask};

/// Statuses treated as "not found" when capturing a baseline.
pub const DEFAULT_NOT_FOUND: &[u16] = &[404, 410];

const TOKEN_PLACEHOLDER: &str = "\u{0}token\u{0}";

/// Hash and length of a normalized body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyFingerprint {
    pub hash: u32,
    pub len: usize,
}

impl BodyFingerprint {
    /// Fingerprint `body` after collapsing whitespace and masking `token`
    /// (the path segment or payload that was requested, which error pages
    /// commonly echo back).
    pub fn of(body: &[u8], token: Option<&str>) -> Self {
        let text = String::from_utf8_lossy(body);
        let mut norm = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(t) = token.filter(|t| t.len() >= 3) {
            norm = norm.replace(t, TOKEN_PLACEHOLDER);
        }
        let hash = murmur3::murmur3_32(&mut Cursor::new(norm.as_bytes()), 0).unwrap_or_default();
        BodyFingerprint { hash, len: norm.len() }
    }
}

#[derive(Debug, Clone)]
pub struct BaselineSignature {
    /// Origin (`scheme://host[:port]`) the baseline was captured for.
    pub host: String,
    /// Absent when the synthetic request failed or did not return a not-found status.
    pub fingerprint: Option<BodyFingerprint>,
    pub status: Option<u16>,
    pub captured_at: OffsetDateTime,
}

/// Random path segment used for the synthetic request.
pub fn random_token() -> String {
    let suffix: String = thread_rng().sample_iter(&Alphanumeric).take(16).map(char::from).collect();
    format!("wp-{}", suffix.to_ascii_lowercase())
}

/// `scheme://host[:port]` of a URL. Scheme-less input yields the text before the first `/`.
pub fn origin_of(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if !webprobe_core::has_scheme(url) {
        return url.split('/').next().filter(|h| !h.is_empty()).map(|h| h.to_string());
    }
    let parsed = Url::parse(url).ok()?;
    match parsed.origin() {
        o @ url::Origin::Tuple(..) => Some(o.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

/// The string a server is likely to echo for this task: the payload if any,
/// else the last non-empty path segment.
pub fn probe_token(task: &ProbeTask) -> Option<String> {
    if let Some(p) = &task.payload {
        return Some(p.value().to_string());
    }
    let without_query = task.url.split(['?', '#']).next().unwrap_or("");
    let path = match without_query.find("://") {
        Some(i) => &without_query[i + 3..],
        None => without_query,
    };
    path.split('/').skip(1).filter(|s| !s.is_empty()).last().map(|s| s.to_string())
}

/// Request `<origin>/<random>` once and keep its fingerprint if the status is
/// in `not_found`.
pub async fn establish_baseline<P: Prober>(prober: &P, origin: &str, not_found: &[u16]) -> BaselineSignature {
    let token = random_token();
    let task = ProbeTask::get(format!("{}/{}", origin.trim_end_matches('/'), token));
    let outcome = prober.probe(&task).await;
    let fingerprint = match (&outcome.error, outcome.status, &outcome.body) {
        (None, Some(status), Some(body)) if not_found.contains(&status) => {
            let fp = BodyFingerprint::of(body, Some(&token));
            // An empty error body would match every empty 2xx/403 response.
            if fp.len == 0 {
                debug!(host = %origin, "baseline body is empty; nothing to fingerprint");
                None
            } else {
                Some(fp)
            }
        }
        (Some(e), _, _) => {
            warn!(host = %origin, error = %e, "baseline request failed; soft-404 filtering disabled for host");
            None
        }
        (None, status, _) => {
            warn!(host = %origin, ?status, "baseline request did not return a not-found status; soft-404 filtering disabled for host");
            None
        }
    };
    debug!(host = %origin, ?fingerprint, "baseline captured");
    BaselineSignature { host: origin.to_string(), fingerprint, status: outcome.status, captured_at: OffsetDateTime::now_utc() }
}

/// True when the outcome body matches the baseline fingerprint, regardless of status.
pub fn is_soft_404(outcome: &ProbeOutcome, signature: &BaselineSignature) -> bool {
    let (Some(fp), Some(body)) = (signature.fingerprint, outcome.body.as_deref()) else {
        return false;
    };
    let token = probe_token(&outcome.task);
    BodyFingerprint::of(body, token.as_deref()) == fp
}

/// Per-scan baselines, one per origin. Concurrent first probes against the
/// same origin wait on a single synthetic request.
pub struct BaselineCache {
    not_found: Vec<u16>,
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<BaselineSignature>>>>>,
}

impl BaselineCache {
    pub fn new(not_found: Vec<u16>) -> Self {
        BaselineCache { not_found, cells: Mutex::new(HashMap::new()) }
    }

    /// Baseline for the origin of `url`, capturing it on first use.
    pub async fn get_or_establish<P: Prober>(&self, prober: &P, url: &str) -> Option<Arc<BaselineSignature>> {
        let origin = origin_of(url)?;
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|p| p.into_inner());
            cells.entry(origin.clone()).or_default().clone()
        };
        let sig = cell
            .get_or_init(|| async { Arc::new(establish_baseline(prober, &origin, &self.not_found).await) })
            .await;
        Some(sig.clone())
    }

    /// Number of origins with a baseline started.
    pub fn len(&self) -> usize {
        self.cells.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BaselineCache {
    fn default() -> Self {
        BaselineCache::new(DEFAULT_NOT_FOUND.to_vec())
    }
}

//! Predicates deciding whether a probe outcome is a finding.

use web_surface::{is_soft_404, BaselineSignature};
use webprobe_core::ProbeOutcome;

/// Pure predicate over one outcome; safe to call from any worker.
pub trait Matcher: Send + Sync + 'static {
    fn matches(&self, outcome: &ProbeOutcome, baseline: Option<&BaselineSignature>) -> bool;
}

fn soft_404(outcome: &ProbeOutcome, baseline: Option<&BaselineSignature>) -> bool {
    baseline.map(|b| is_soft_404(outcome, b)).unwrap_or(false)
}

/// A path exists: 2xx or one of the `interesting` statuses, and not the host's soft-404 page.
#[derive(Debug, Clone)]
pub struct DirectoryMatcher {
    pub interesting: Vec<u16>,
}

impl Default for DirectoryMatcher {
    fn default() -> Self {
        DirectoryMatcher { interesting: vec![403] }
    }
}

impl Matcher for DirectoryMatcher {
    fn matches(&self, outcome: &ProbeOutcome, baseline: Option<&BaselineSignature>) -> bool {
        let Some(status) = outcome.status else { return false };
        let wanted = (200..300).contains(&status) || self.interesting.contains(&status);
        wanted && !soft_404(outcome, baseline)
    }
}

/// Database error strings that leak through when a payload breaks a query.
pub const DEFAULT_SQL_ERRORS: &[&str] = &[
    "you have an error in your sql syntax",
    "warning: mysql",
    "mysql_fetch",
    "mysqli_",
    "unclosed quotation mark after the character string",
    "quoted string not properly terminated",
    "microsoft ole db provider for sql server",
    "odbc sql server driver",
    "pg_query():",
    "postgresql query failed",
    "unterminated quoted string at or near",
    "ora-00933",
    "ora-01756",
    "sqlite3::",
    "sqlite error",
    "sqlstate[",
    "syntax error",
];

/// Body contains a known database error string (case-insensitive), and is
/// not the host's soft-404 page.
#[derive(Debug, Clone)]
pub struct InjectionMatcher {
    patterns: Vec<String>,
}

impl InjectionMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        InjectionMatcher { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for InjectionMatcher {
    fn default() -> Self {
        InjectionMatcher::new(DEFAULT_SQL_ERRORS)
    }
}

impl Matcher for InjectionMatcher {
    fn matches(&self, outcome: &ProbeOutcome, baseline: Option<&BaselineSignature>) -> bool {
        let Some(body) = outcome.body_text() else { return false };
        let body = body.to_lowercase();
        self.patterns.iter().any(|p| body.contains(p.as_str())) && !soft_404(outcome, baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use time::OffsetDateTime;
    use web_surface::BodyFingerprint;
    use webprobe_core::{ProbeError, ProbeTask};

    fn outcome(url: &str, status: u16, body: &str) -> ProbeOutcome {
        let t = ProbeTask::get(url);
        ProbeOutcome::response(t, url.into(), url.into(), status, None, body.as_bytes().to_vec(), Duration::ZERO)
    }

    fn baseline(body: &str) -> BaselineSignature {
        BaselineSignature {
            host: "http://h".into(),
            fingerprint: Some(BodyFingerprint::of(body.as_bytes(), None)),
            status: Some(404),
            captured_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn directory_statuses() {
        let m = DirectoryMatcher::default();
        assert!(m.matches(&outcome("http://h/a", 200, "x"), None));
        assert!(m.matches(&outcome("http://h/a", 204, ""), None));
        assert!(m.matches(&outcome("http://h/a", 403, "denied"), None));
        assert!(!m.matches(&outcome("http://h/a", 404, "x"), None));
        assert!(!m.matches(&outcome("http://h/a", 500, "x"), None));
        let t = ProbeTask::get("http://h/a");
        let failed = ProbeOutcome::failed(t, "http://h/a".into(), Duration::ZERO, ProbeError::transient("timeout"));
        assert!(!m.matches(&failed, None));
        let m = DirectoryMatcher { interesting: vec![301, 401] };
        assert!(m.matches(&outcome("http://h/a", 401, ""), None));
        assert!(!m.matches(&outcome("http://h/a", 403, ""), None));
    }

    #[test]
    fn directory_filters_soft_404() {
        let b = baseline("Page Not Found — Acme Corp");
        let m = DirectoryMatcher::default();
        assert!(!m.matches(&outcome("http://h/login", 200, "Page Not Found — Acme Corp"), Some(&b)));
        assert!(m.matches(&outcome("http://h/login", 200, "Sign in to Acme"), Some(&b)));
    }

    #[test]
    fn injection_is_case_insensitive_and_respects_baseline() {
        let m = InjectionMatcher::default();
        let body = "<b>You have an error in your SQL syntax</b> near ''1''";
        assert!(m.matches(&outcome("http://h/item", 200, body), None));
        assert!(m.matches(&outcome("http://h/item", 500, body), None));
        assert!(!m.matches(&outcome("http://h/item", 200, "all good"), None));
        let b = baseline(body);
        assert!(!m.matches(&outcome("http://h/item", 200, body), Some(&b)));
        let custom = InjectionMatcher::new(["  ", "Boom"]);
        assert_eq!(custom.patterns(), &["boom".to_string()]);
    }
}

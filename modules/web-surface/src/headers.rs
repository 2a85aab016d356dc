//! Security header and cookie flag audit for a single response.

use reqwest::header::{HeaderMap, SET_COOKIE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Missing,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFinding {
    pub header: String,
    pub severity: Severity,
    pub message: String,
}

impl HeaderFinding {
    fn new(header: &str, severity: Severity, message: impl Into<String>) -> Self {
        HeaderFinding { header: header.to_string(), severity, message: message.into() }
    }
}

/// Headers expected on a hardened site.
pub const RECOMMENDED: &[&str] = &[
    "Strict-Transport-Security",
    "Content-Security-Policy",
    "X-Frame-Options",
    "X-Content-Type-Options",
    "Referrer-Policy",
    "Permissions-Policy",
    "X-XSS-Protection",
];

const ONE_YEAR_SECS: u64 = 31_536_000;

pub fn audit_headers(headers: &HeaderMap) -> Vec<HeaderFinding> {
    let mut out = Vec::new();
    for &name in RECOMMENDED {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            out.push(HeaderFinding::new(name, Severity::Missing, "header not set"));
            continue;
        };
        let issues = match name {
            "Strict-Transport-Security" => analyze_hsts(value),
            "Content-Security-Policy" => analyze_csp(value),
            "X-Frame-Options" => {
                let v = value.trim().to_ascii_uppercase();
                if v == "DENY" || v == "SAMEORIGIN" { vec![] } else { vec![format!("unexpected value {:?}; use DENY or SAMEORIGIN", value)] }
            }
            "X-Content-Type-Options" => {
                if value.trim().eq_ignore_ascii_case("nosniff") { vec![] } else { vec![format!("unexpected value {:?}; use nosniff", value)] }
            }
            _ => vec![],
        };
        if issues.is_empty() {
            out.push(HeaderFinding::new(name, Severity::Ok, value));
        } else {
            out.extend(issues.into_iter().map(|m| HeaderFinding::new(name, Severity::Warning, m)));
        }
    }
    out.extend(audit_cookies(headers));
    out
}

/// Header and cookie findings plus HTML comments for one fetched page.
pub fn audit_page(headers: &HeaderMap, body: &str) -> (Vec<HeaderFinding>, Vec<String>) {
    (audit_headers(headers), crate::page::extract_comments(body))
}

pub fn analyze_hsts(value: &str) -> Vec<String> {
    let mut issues = Vec::new();
    let max_age = value
        .split(';')
        .map(|d| d.trim())
        .find_map(|d| {
            let (name, v) = d.split_once('=')?;
            name.trim().eq_ignore_ascii_case("max-age").then_some(v)
        })
        .map(|v| v.trim().trim_matches('"').parse::<u64>());
    match max_age {
        None => issues.push("max-age not specified".to_string()),
        Some(Err(_)) => issues.push("max-age is not a number".to_string()),
        Some(Ok(age)) if age < ONE_YEAR_SECS => {
            issues.push(format!("max-age too low ({} seconds); at least {} recommended", age, ONE_YEAR_SECS))
        }
        Some(Ok(_)) => {}
    }
    if !value.to_ascii_lowercase().contains("includesubdomains") {
        issues.push("includeSubDomains not set".to_string());
    }
    issues
}

pub fn analyze_csp(value: &str) -> Vec<String> {
    let mut issues = Vec::new();
    if value.contains("'unsafe-inline'") {
        issues.push("allows 'unsafe-inline'".to_string());
    }
    if value.contains("'unsafe-eval'") {
        issues.push("allows 'unsafe-eval'".to_string());
    }
    match value.split(';').map(|d| d.trim()).find(|d| d.starts_with("default-src")) {
        None => issues.push("default-src not defined".to_string()),
        Some(d) if !d.contains("'self'") && !d.contains("'none'") => issues.push("default-src not restricted to 'self'".to_string()),
        Some(_) => {}
    }
    issues
}

/// One finding per `Set-Cookie` lacking `HttpOnly` or `Secure`.
pub fn audit_cookies(headers: &HeaderMap) -> Vec<HeaderFinding> {
    let mut out = Vec::new();
    for raw in headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()) {
        let name = raw.split('=').next().unwrap_or("").trim();
        let attrs: Vec<String> = raw.split(';').skip(1).map(|a| a.trim().to_ascii_lowercase()).collect();
        let has = |flag: &str| attrs.iter().any(|a| a == flag);
        let mut missing = Vec::new();
        if !has("httponly") {
            missing.push("HttpOnly");
        }
        if !has("secure") {
            missing.push("Secure");
        }
        if !missing.is_empty() {
            out.push(HeaderFinding::new("Set-Cookie", Severity::Warning, format!("cookie {} missing {}", name, missing.join(", "))));
        }
    }
    out
}

use crate::{ProbeError, ScanError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "OPTIONS" => Ok(HttpMethod::Options),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(ScanError::Config(format!("unsupported HTTP method: {}", other))),
        }
    }
}

/// Where an injected value goes in the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// Appended to the URL as `param=value`.
    Query { param: String, value: String },
    /// Sent as an urlencoded form body. `value` is the injected string, already
    /// placed into the relevant `fields`.
    Form { fields: Vec<(String, String)>, value: String },
}

impl Payload {
    pub fn query(param: impl Into<String>, value: impl Into<String>) -> Self {
        Payload::Query { param: param.into(), value: value.into() }
    }

    /// The injected string, for reporting.
    pub fn value(&self) -> &str {
        match self {
            Payload::Query { value, .. } | Payload::Form { value, .. } => value,
        }
    }
}

/// One unit of work. Equality and hashing cover all three fields, which is the
/// identity the frontier deduplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeTask {
    pub url: String,
    pub method: HttpMethod,
    pub payload: Option<Payload>,
}

impl ProbeTask {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        ProbeTask { url: url.into(), method, payload: None }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Get)
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl fmt::Display for ProbeTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if let Some(p) = &self.payload {
            write!(f, " [{}]", p.value())?;
        }
        Ok(())
    }
}

/// The result of dispatching one task. Exactly one is produced per dispatch.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub task: ProbeTask,
    /// URL actually requested, after scheme normalization.
    pub url: String,
    /// URL of the last response once redirects were followed.
    pub final_url: String,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    /// Response body, truncated at the client's byte cap.
    pub body: Option<Vec<u8>>,
    pub elapsed: Duration,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    pub fn response(
        task: ProbeTask,
        url: String,
        final_url: String,
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
        elapsed: Duration,
    ) -> Self {
        ProbeOutcome {
            task,
            url,
            final_url,
            status: Some(status),
            content_type,
            body: Some(body),
            elapsed,
            error: None,
        }
    }

    pub fn failed(task: ProbeTask, url: String, elapsed: Duration, error: ProbeError) -> Self {
        ProbeOutcome {
            task,
            final_url: url.clone(),
            url,
            status: None,
            content_type: None,
            body: None,
            elapsed,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }

    /// Body decoded lossily; tolerant of any encoding.
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body.as_deref().map(String::from_utf8_lossy)
    }

    /// Whether the response declares (or, lacking a content type, looks like) HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => self
                .body
                .as_deref()
                .map(|b| {
                    let head = &b[..b.len().min(1024)];
                    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
                    head.contains("<html") || head.contains("<!doctype html") || head.contains("<a ")
                })
                .unwrap_or(false),
        }
    }
}

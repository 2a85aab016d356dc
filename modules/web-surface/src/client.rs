use reqwest::{header::HeaderMap, redirect::Policy, Client, Method};
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;
use webprobe_core::{has_scheme, HttpMethod, Payload, ProbeError, ProbeOutcome, ProbeTask, ScanError, Target};

/// Browser identities rotated per request.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.2420.81",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

#[derive(Debug, Clone)]
pub struct WebProbeOptions {
    pub timeout_ms: u64,
    pub redirects: usize,
    pub max_body_bytes: usize,
    pub user_agents: Vec<String>,
}

impl Default for WebProbeOptions {
    fn default() -> Self {
        WebProbeOptions {
            timeout_ms: 5_000,
            redirects: 3,
            max_body_bytes: 256 * 1024,
            user_agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Issues a single request for a task. Implementations must not touch shared scan state.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, task: &ProbeTask) -> impl Future<Output = ProbeOutcome> + Send;
}

/// reqwest-backed prober with https-then-http scheme fallback.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
    opts: WebProbeOptions,
}

/// Raw response data read by the prober before it is shaped into an outcome.
struct Fetched {
    final_url: String,
    status: u16,
    content_type: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpProber {
    pub fn new(opts: WebProbeOptions) -> Result<Self, ScanError> {
        if opts.user_agents.is_empty() {
            return Err(ScanError::Config("user agent pool is empty".into()));
        }
        let client = Client::builder()
            .redirect(Policy::limited(opts.redirects))
            .timeout(Duration::from_millis(opts.timeout_ms))
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| ScanError::Config(format!("http client: {}", e)))?;
        Ok(HttpProber { client, opts })
    }

    pub fn options(&self) -> &WebProbeOptions {
        &self.opts
    }

    fn user_agent(&self) -> &str {
        self.opts
            .user_agents
            .choose(&mut thread_rng())
            .map(|s| s.as_str())
            .unwrap_or(USER_AGENTS[0])
    }

    /// Pin the scheme of a scheme-less target: https if it connects, else http.
    pub async fn resolve_scheme(&self, target: &Target) -> Target {
        if target.has_scheme() {
            return target.clone();
        }
        let https = target.with_scheme("https");
        match self.fetch(&https.0, HttpMethod::Get, None).await {
            Err(e) if e.is_connect() => {
                debug!(target = %target, error = %e, "https unreachable, using http");
                target.with_scheme("http")
            }
            _ => https,
        }
    }

    /// GET a page and return its headers and lossily decoded body.
    pub async fn fetch_page(&self, url: &str) -> Result<(String, HeaderMap, String), ProbeError> {
        let task = ProbeTask::get(url);
        let (_, fetched) = self.fetch_with_fallback(&task).await.map_err(|(_, e)| e)?;
        let body = String::from_utf8_lossy(&fetched.body).into_owned();
        Ok((fetched.final_url, fetched.headers, body))
    }

    async fn fetch_with_fallback(&self, task: &ProbeTask) -> Result<(String, Fetched), (String, ProbeError)> {
        let raw = task.url.trim();
        if raw.is_empty() {
            return Err((String::new(), ProbeError::fatal("empty target url")));
        }
        if has_scheme(raw) {
            let url = apply_query(raw, task.payload.as_ref()).map_err(|e| (raw.to_string(), e))?;
            return match self.fetch(&url, task.method, task.payload.as_ref()).await {
                Ok(f) => Ok((url, f)),
                Err(e) => Err((url, classify(&e))),
            };
        }
        let https = apply_query(&format!("https://{}", raw), task.payload.as_ref()).map_err(|e| (raw.to_string(), e))?;
        match self.fetch(&https, task.method, task.payload.as_ref()).await {
            Ok(f) => Ok((https, f)),
            Err(e) if e.is_connect() => {
                debug!(url = %raw, error = %e, "https connect failed, retrying over http");
                let http = apply_query(&format!("http://{}", raw), task.payload.as_ref()).map_err(|e| (raw.to_string(), e))?;
                match self.fetch(&http, task.method, task.payload.as_ref()).await {
                    Ok(f) => Ok((http, f)),
                    Err(e) => Err((http, classify(&e))),
                }
            }
            Err(e) => Err((https, classify(&e))),
        }
    }

    async fn fetch(&self, url: &str, method: HttpMethod, payload: Option<&Payload>) -> Result<Fetched, reqwest::Error> {
        let mut req = self
            .client
            .request(to_reqwest(method), url)
            .header(reqwest::header::USER_AGENT, self.user_agent());
        if let Some(Payload::Form { fields, .. }) = payload {
            req = match method {
                HttpMethod::Get | HttpMethod::Head => req.query(fields),
                _ => req.form(fields),
            };
        }
        let mut resp = req.send().await?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let headers = resp.headers().clone();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let cap = self.opts.max_body_bytes;
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            let room = cap.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Fetched { final_url, status, content_type, headers, body })
    }
}

impl Prober for HttpProber {
    async fn probe(&self, task: &ProbeTask) -> ProbeOutcome {
        let started = Instant::now();
        let res = self.fetch_with_fallback(task).await;
        let elapsed = started.elapsed();
        match res {
            Ok((url, f)) => {
                debug!(task = %task, status = f.status, bytes = f.body.len(), "probe done");
                ProbeOutcome::response(task.clone(), url, f.final_url, f.status, f.content_type, f.body, elapsed)
            }
            Err((url, error)) => {
                debug!(task = %task, error = %error, "probe failed");
                ProbeOutcome::failed(task.clone(), url, elapsed, error)
            }
        }
    }
}

fn to_reqwest(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Patch => Method::PATCH,
    }
}

/// Append a query payload to `url`. Other payload kinds leave the URL untouched.
fn apply_query(url: &str, payload: Option<&Payload>) -> Result<String, ProbeError> {
    let Some(Payload::Query { param, value }) = payload else {
        return Ok(url.to_string());
    };
    let mut parsed = Url::parse(url).map_err(|e| ProbeError::fatal(format!("invalid url {}: {}", url, e)))?;
    parsed.query_pairs_mut().append_pair(param, value);
    Ok(parsed.to_string())
}

/// Map a reqwest failure onto the probe error taxonomy.
fn classify(e: &reqwest::Error) -> ProbeError {
    if e.is_builder() {
        ProbeError::fatal(e.to_string())
    } else if e.is_timeout() {
        ProbeError::transient(format!("timeout: {}", e))
    } else if e.is_connect() {
        ProbeError::transient(format!("connect: {}", e))
    } else {
        ProbeError::transient(e.to_string())
    }
}

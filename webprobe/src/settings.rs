//! Merge CLI flags, config file sections and built-in defaults.
//! A flag given on the command line wins over the config file.

use crate::config::HttpConfig;
use crate::output::OutputFormat;
use anyhow::{anyhow, Result};
use clap::Args;
use std::path::PathBuf;
use web_surface::baseline::DEFAULT_NOT_FOUND;
use web_surface::WebProbeOptions;
use webprobe_core::{HttpMethod, JitterRange, ScanError};

pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Default, Args)]
pub struct HttpArgs {
    /// Max probes in flight [default: 10]
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Per-request timeout in milliseconds [default: 5000]
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Max redirects to follow [default: 3]
    #[arg(long)]
    pub redirects: Option<usize>,
    /// Lower bound of the random delay before each probe [default: 0]
    #[arg(long)]
    pub jitter_min_ms: Option<u64>,
    /// Upper bound of the random delay before each probe [default: the lower bound]
    #[arg(long)]
    pub jitter_max_ms: Option<u64>,
    /// HTTP methods to try per candidate, comma separated [default: GET]
    #[arg(long, value_delimiter = ',')]
    pub methods: Option<Vec<String>>,
    /// Bytes of each response body kept for matching [default: 262144]
    #[arg(long)]
    pub max_body_bytes: Option<usize>,
    /// Statuses whose body becomes the soft-404 fingerprint [default: 404,410]
    #[arg(long, value_delimiter = ',')]
    pub baseline_statuses: Option<Vec<u16>>,
    /// Output format [default: text]
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
    /// Output file (overwrites). Stdout if omitted.
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub concurrency: usize,
    pub jitter: JitterRange,
    pub methods: Vec<HttpMethod>,
    pub baseline_statuses: Vec<u16>,
    pub probe: WebProbeOptions,
    pub format: OutputFormat,
    pub out: Option<PathBuf>,
}

pub fn parse_methods(names: &[String]) -> Result<Vec<HttpMethod>, ScanError> {
    let mut out = Vec::new();
    for n in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let m: HttpMethod = n.parse()?;
        if !out.contains(&m) {
            out.push(m);
        }
    }
    if out.is_empty() {
        return Err(ScanError::Config("no HTTP methods configured".into()));
    }
    Ok(out)
}

/// Validated settings. Everything that would make a scan fail to start is
/// rejected here, before any request is sent.
pub fn resolve(args: &HttpArgs, cfg: Option<&HttpConfig>) -> Result<Settings> {
    let empty = HttpConfig::default();
    let cfg = cfg.unwrap_or(&empty);
    let defaults = WebProbeOptions::default();

    let concurrency = args.concurrency.or(cfg.concurrency).unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err(ScanError::Config("concurrency must be at least 1".into()).into());
    }
    // An explicit max must be >= min; an unset max is raised to min.
    let jitter_min = args.jitter_min_ms.or(cfg.jitter_min_ms).unwrap_or(0);
    let jitter_max = match args.jitter_max_ms {
        Some(max) => max,
        None => cfg.jitter_max_ms.unwrap_or(0).max(jitter_min),
    };
    let jitter = JitterRange::from_millis(jitter_min, jitter_max)?;
    let methods = match args.methods.as_ref().or(cfg.methods.as_ref()) {
        Some(names) => parse_methods(names)?,
        None => vec![HttpMethod::Get],
    };
    let baseline_statuses = args
        .baseline_statuses
        .clone()
        .or_else(|| cfg.baseline_statuses.clone())
        .unwrap_or_else(|| DEFAULT_NOT_FOUND.to_vec());
    let format = match (args.format, cfg.format.as_deref()) {
        (Some(f), _) => f,
        (None, Some(name)) => OutputFormat::from_name(name).ok_or_else(|| anyhow!("unknown output format in config: {}", name))?,
        (None, None) => OutputFormat::Text,
    };
    let probe = WebProbeOptions {
        timeout_ms: args.timeout_ms.or(cfg.timeout_ms).unwrap_or(defaults.timeout_ms),
        redirects: args.redirects.or(cfg.redirects).unwrap_or(defaults.redirects),
        max_body_bytes: args.max_body_bytes.or(cfg.max_body_bytes).unwrap_or(defaults.max_body_bytes),
        user_agents: defaults.user_agents,
    };
    Ok(Settings { concurrency, jitter, methods, baseline_statuses, probe, format, out: args.out.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_without_flags_or_config() {
        let s = resolve(&HttpArgs::default(), None).unwrap();
        assert_eq!(s.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(s.methods, vec![HttpMethod::Get]);
        assert_eq!(s.baseline_statuses, vec![404, 410]);
        assert_eq!(s.probe.timeout_ms, 5_000);
        assert_eq!(s.format, OutputFormat::Text);
        assert_eq!(s.jitter.max(), Duration::ZERO);
    }

    #[test]
    fn flags_win_over_config() {
        let args = HttpArgs { concurrency: Some(3), ..Default::default() };
        let cfg = HttpConfig {
            concurrency: Some(20),
            timeout_ms: Some(900),
            methods: Some(vec!["get".into(), "HEAD".into(), "GET".into()]),
            format: Some("jsonl".into()),
            ..Default::default()
        };
        let s = resolve(&args, Some(&cfg)).unwrap();
        assert_eq!(s.concurrency, 3);
        assert_eq!(s.probe.timeout_ms, 900);
        assert_eq!(s.methods, vec![HttpMethod::Get, HttpMethod::Head]);
        assert_eq!(s.format, OutputFormat::Jsonl);
    }

    #[test]
    fn jitter_min_alone_raises_the_max() {
        let args = HttpArgs { jitter_min_ms: Some(50), ..Default::default() };
        let s = resolve(&args, None).unwrap();
        assert_eq!(s.jitter.min(), Duration::from_millis(50));
        assert_eq!(s.jitter.max(), Duration::from_millis(50));

        let cfg = HttpConfig { jitter_max_ms: Some(200), ..Default::default() };
        let s = resolve(&args, Some(&cfg)).unwrap();
        assert_eq!(s.jitter.max(), Duration::from_millis(200));
        let cfg = HttpConfig { jitter_max_ms: Some(20), ..Default::default() };
        assert_eq!(resolve(&args, Some(&cfg)).unwrap().jitter.max(), Duration::from_millis(50));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let zero = HttpArgs { concurrency: Some(0), ..Default::default() };
        assert!(resolve(&zero, None).is_err());
        let inverted = HttpArgs { jitter_min_ms: Some(50), jitter_max_ms: Some(10), ..Default::default() };
        assert!(resolve(&inverted, None).is_err());
        let bogus = HttpArgs { methods: Some(vec!["FETCH".into()]), ..Default::default() };
        assert!(resolve(&bogus, None).is_err());
        let blank = HttpArgs { methods: Some(vec![" ".into()]), ..Default::default() };
        assert!(resolve(&blank, None).is_err());
        let cfg = HttpConfig { format: Some("xml".into()), ..Default::default() };
        assert!(resolve(&HttpArgs::default(), Some(&cfg)).is_err());
    }
}

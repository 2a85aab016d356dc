use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Request and pool settings accepted by every scan section.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct HttpConfig {
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub redirects: Option<usize>,
    pub jitter_min_ms: Option<u64>,
    pub jitter_max_ms: Option<u64>,
    pub methods: Option<Vec<String>>,
    pub max_body_bytes: Option<usize>,
    pub baseline_statuses: Option<Vec<u16>>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DirsConfig {
    #[serde(flatten)]
    pub http: HttpConfig,
    pub interesting: Option<Vec<u16>>,
    pub recurse: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SqliConfig {
    #[serde(flatten)]
    pub http: HttpConfig,
    pub param: Option<String>,
    pub patterns: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub dirs: Option<DirsConfig>,
    pub sqli: Option<SqliConfig>,
}

pub const DEFAULT_CONFIG: &str = "webprobe.yaml";

/// Load `path`, or `./webprobe.yaml` when no path is given and the file exists.
/// An explicit path that cannot be read or parsed is an error; a missing
/// default file is not.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() {
                p.to_path_buf()
            } else {
                return Ok(None);
            }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    let cfg = parse_config(&s).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(cfg))
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(serde_yaml::from_str(s)?)
}

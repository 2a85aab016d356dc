use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use probe_engine::extract::extract_forms;
use probe_engine::matchers::DEFAULT_SQL_ERRORS;
use probe_engine::scan::form_injection_tasks;
use probe_engine::{
    directory_scan, injection_scan, query_injection_scan, DirScanOptions, Governor, Matcher, ScanResult, SqliScanOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;
use web_surface::headers::audit_page;
use web_surface::page::extract_title;
use web_surface::{HttpProber, Prober, WebProbeOptions};
use webprobe_core::Target;

mod config;
mod logging;
mod output;
mod settings;
mod wordlist;

use output::OutputFormat;
use settings::HttpArgs;

#[derive(Debug, Parser)]
#[command(name = "webprobe", version, about = "Content discovery and SQL-injection probing for web targets")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./webprobe.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log scan progress
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log every probe
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Enumerate paths below a target from a wordlist, following links found on hits
    Dirs {
        /// Target host or URL (scheme optional; https is tried first)
        target: String,
        /// Newline-delimited paths
        #[arg(short, long, value_name = "FILE")]
        wordlist: PathBuf,
        /// Non-2xx statuses that still count as found, comma separated [default: 403]
        #[arg(long, value_delimiter = ',')]
        interesting: Option<Vec<u16>>,
        /// Do not queue links extracted from hit pages
        #[arg(long, default_value_t = false)]
        no_recurse: bool,
        #[command(flatten)]
        http: HttpArgs,
    },
    /// Send SQL-injection payloads and report database error signatures
    Sqli {
        /// Target URL (scheme optional)
        target: String,
        /// Newline-delimited payloads
        #[arg(short, long, value_name = "FILE")]
        payloads: PathBuf,
        /// Query parameter receiving the payload [default: id]
        #[arg(long, conflicts_with = "forms")]
        param: Option<String>,
        /// Inject into the forms found on the target page instead of a query parameter
        #[arg(long, default_value_t = false)]
        forms: bool,
        /// Newline-delimited error substrings (case-insensitive) replacing the built-in list
        #[arg(long, value_name = "FILE")]
        patterns: Option<PathBuf>,
        #[command(flatten)]
        http: HttpArgs,
    },
    /// Audit security headers, cookie flags and HTML comments of one page
    Headers {
        /// Target host or URL (scheme optional)
        target: String,
        /// Timeout in milliseconds
        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,
        /// Max redirects to follow
        #[arg(long, default_value_t = 3)]
        redirects: usize,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites). Stdout if omitted.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

/// Run a governor to completion with Ctrl-C wired to its stop handle and a
/// progress line logged every second.
async fn drive<P: Prober, M: Matcher>(gov: Governor<P, M>) -> ScanResult {
    let stop = gov.stop_handle();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; finishing in-flight probes");
            stop.stop();
        }
    });
    let agg = gov.aggregator();
    let frontier = gov.frontier();
    let ticker = tokio::spawn(async move {
        let mut every = tokio::time::interval(Duration::from_secs(1));
        every.tick().await;
        loop {
            every.tick().await;
            let p = agg.snapshot();
            info!(
                dispatched = p.dispatched,
                completed = p.completed,
                pending = frontier.pending_len(),
                hits = p.hits,
                errors = p.errors,
                "progress"
            );
        }
    });
    let result = gov.run().await;
    ticker.abort();
    signal.abort();
    result
}

fn report_errors(result: &ScanResult) {
    for e in &result.errors {
        warn!("{}", output::error_line(e));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose, cli.debug))?;
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("webprobe {} (core {})", env!("CARGO_PKG_VERSION"), webprobe_core::version());
        }
        Commands::Dirs { target, wordlist, interesting, no_recurse, http } => {
            let cfg = loaded_cfg.as_ref().and_then(|c| c.dirs.as_ref());
            let s = settings::resolve(&http, cfg.map(|c| &c.http))?;
            let target = Target::parse(&target)?;
            let words = wordlist::load_wordlist(&wordlist)?;
            let opts = DirScanOptions {
                concurrency: s.concurrency,
                jitter: s.jitter,
                methods: s.methods.clone(),
                interesting: interesting
                    .or_else(|| cfg.and_then(|c| c.interesting.clone()))
                    .unwrap_or_else(|| DirScanOptions::default().interesting),
                baseline_statuses: s.baseline_statuses.clone(),
                recurse: !no_recurse && cfg.and_then(|c| c.recurse).unwrap_or(true),
            };
            let prober = Arc::new(HttpProber::new(s.probe.clone())?);
            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            let result = rt.block_on(async {
                let root = prober.resolve_scheme(&target).await;
                info!(root = %root, words = words.len(), methods = opts.methods.len(), "directory scan");
                let gov = directory_scan(prober.clone(), &root, &words, &opts)?;
                Ok::<_, anyhow::Error>(drive(gov).await)
            })?;
            report_errors(&result);
            output::write_dir_hits(output::open_writer(s.out.as_deref())?, s.format, &result)?;
            eprintln!("{}", output::summary_line(&result, started.elapsed().as_millis()));
        }
        Commands::Sqli { target, payloads, param, forms, patterns, http } => {
            let cfg = loaded_cfg.as_ref().and_then(|c| c.sqli.as_ref());
            let s = settings::resolve(&http, cfg.map(|c| &c.http))?;
            let target = Target::parse(&target)?;
            let payloads = wordlist::load_wordlist(&payloads)?;
            let patterns = match patterns {
                Some(path) => wordlist::load_wordlist(&path)?,
                None => cfg
                    .and_then(|c| c.patterns.clone())
                    .unwrap_or_else(|| DEFAULT_SQL_ERRORS.iter().map(|p| p.to_string()).collect()),
            };
            let opts = SqliScanOptions {
                concurrency: s.concurrency,
                jitter: s.jitter,
                methods: s.methods.clone(),
                param: param
                    .or_else(|| cfg.and_then(|c| c.param.clone()))
                    .unwrap_or_else(|| SqliScanOptions::default().param),
                patterns,
                baseline_statuses: s.baseline_statuses.clone(),
            };
            let prober = Arc::new(HttpProber::new(s.probe.clone())?);
            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            let result = rt.block_on(async {
                let root = prober.resolve_scheme(&target).await;
                let gov = if forms {
                    let (final_url, _, body) = prober
                        .fetch_page(&root.0)
                        .await
                        .map_err(|e| anyhow!("fetching {}: {}", root, e))?;
                    let page = Url::parse(&final_url)?;
                    let found = extract_forms(&body, &page);
                    let tasks = form_injection_tasks(&found, &payloads);
                    info!(page = %page, forms = found.len(), tasks = tasks.len(), "form injection");
                    if tasks.is_empty() {
                        bail!("no injectable forms found at {}", page);
                    }
                    injection_scan(prober.clone(), tasks, &opts)?
                } else {
                    info!(root = %root, param = %opts.param, payloads = payloads.len(), "query injection");
                    query_injection_scan(prober.clone(), &root, &payloads, &opts)?
                };
                Ok::<_, anyhow::Error>(drive(gov).await)
            })?;
            report_errors(&result);
            output::write_injection_hits(output::open_writer(s.out.as_deref())?, s.format, &result)?;
            eprintln!("{}", output::summary_line(&result, started.elapsed().as_millis()));
        }
        Commands::Headers { target, timeout_ms, redirects, format, out } => {
            let target = Target::parse(&target)?;
            let opts = WebProbeOptions { timeout_ms, redirects, ..Default::default() };
            let prober = HttpProber::new(opts)?;
            let rt = tokio::runtime::Runtime::new()?;
            let (final_url, headers, body) = rt.block_on(async {
                let root = prober.resolve_scheme(&target).await;
                prober.fetch_page(&root.0).await.map_err(|e| anyhow!("fetching {}: {}", root, e))
            })?;
            if let Some(title) = extract_title(&body) {
                info!(url = %final_url, title = %title, "page");
            }
            let (findings, comments) = audit_page(&headers, &body);
            output::write_header_report(output::open_writer(out.as_deref())?, format, &final_url, &findings, &comments)?;
        }
    }
    Ok(())
}

//! Bounded-concurrency probe engine: a deduplicating frontier drained by a
//! capped worker pool, soft-404 aware matchers, and a shared result aggregator.

pub mod aggregate;
pub mod extract;
pub mod frontier;
pub mod governor;
pub mod matchers;
pub mod scan;

pub use aggregate::{Aggregator, Progress, ScanResult, TaskError, Verdict};
pub use frontier::Frontier;
pub use governor::{Governor, GovernorOptions, StopHandle};
pub use matchers::{DirectoryMatcher, InjectionMatcher, Matcher};
pub use scan::{directory_scan, injection_scan, query_injection_scan, DirScanOptions, SqliScanOptions};

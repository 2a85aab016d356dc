//! HTTP probing of a web target: single-request prober, soft-404 baselines,
//! header audit and page scraping helpers.

pub mod baseline;
pub mod client;
pub mod headers;
pub mod page;

pub use baseline::{establish_baseline, is_soft_404, BaselineCache, BaselineSignature, BodyFingerprint};
pub use client::{HttpProber, Prober, WebProbeOptions, USER_AGENTS};

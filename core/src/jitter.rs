use crate::ScanError;
use rand::{thread_rng, Rng};
use std::time::Duration;

/// Uniform random delay applied by each worker before it dispatches a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    min: Duration,
    max: Duration,
}

impl Default for JitterRange {
    fn default() -> Self {
        JitterRange::none()
    }
}

impl JitterRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ScanError> {
        if min > max {
            return Err(ScanError::Config(format!(
                "jitter range is inverted: {}ms > {}ms",
                min.as_millis(),
                max.as_millis()
            )));
        }
        Ok(JitterRange { min, max })
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Result<Self, ScanError> {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// No delay at all.
    pub const fn none() -> Self {
        JitterRange { min: Duration::ZERO, max: Duration::ZERO }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        // Saturate ranges too wide for u64 microseconds; the clamp keeps the
        // sample inside [min, max] when both ends saturate.
        let lo = u64::try_from(self.min.as_micros()).unwrap_or(u64::MAX);
        let hi = u64::try_from(self.max.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(thread_rng().gen_range(lo..=hi)).clamp(self.min, self.max)
    }

    /// Sleep for one sampled delay. Returns immediately for a zero range.
    pub async fn sleep(&self) {
        let d = self.sample();
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

//! Core types shared by the probe client, the probe engine and the CLI.

pub mod error;
pub mod jitter;
pub mod task;

pub use error::{ErrorKind, ProbeError, ScanError};
pub use jitter::JitterRange;
pub use task::{HttpMethod, Payload, ProbeOutcome, ProbeTask};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// A scan root as given by the user: a host or URL, scheme optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(pub String);

impl Target {
    /// Trim the input and drop trailing slashes. Empty input is a configuration error.
    pub fn parse(s: &str) -> Result<Self, ScanError> {
        let t = s.trim().trim_end_matches('/');
        if t.is_empty() {
            return Err(ScanError::Config("target is empty".into()));
        }
        Ok(Target(t.to_string()))
    }

    pub fn has_scheme(&self) -> bool {
        has_scheme(&self.0)
    }

    /// Prefix the target with `scheme://` unless it already carries a scheme.
    pub fn with_scheme(&self, scheme: &str) -> Target {
        if self.has_scheme() {
            self.clone()
        } else {
            Target(format!("{}://{}", scheme, self.0))
        }
    }

    /// Append a wordlist entry as a path below the target root.
    pub fn join(&self, candidate: &str) -> String {
        format!("{}/{}", self.0, candidate.trim().trim_start_matches('/'))
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target(s.to_string())
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when `s` starts with `<scheme>://`.
pub fn has_scheme(s: &str) -> bool {
    match s.find("://") {
        Some(idx) if idx > 0 => s[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn target_rejects_empty() {
        assert!(Target::parse("   ").is_err());
        assert!(Target::parse("/").is_err());
    }

    #[test]
    fn target_join_and_scheme() {
        let t = Target::parse("example.com/").unwrap();
        assert!(!t.has_scheme());
        assert_eq!(t.join("/admin"), "example.com/admin");
        let s = t.with_scheme("https");
        assert_eq!(s.0, "https://example.com");
        assert_eq!(s.with_scheme("http").0, "https://example.com");
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("http://a"));
        assert!(has_scheme("HTTPS://a"));
        assert!(!has_scheme("a/b?u=http://c"));
        assert!(!has_scheme("://a"));
    }
}

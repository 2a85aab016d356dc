use std::fmt;
use thiserror::Error;

/// How a failed probe should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Timeout, refused or reset connection, DNS failure. Counted, never retried.
    Transient,
    /// The request could not be built (bad URL, unsupported scheme).
    Fatal,
    /// The body could not be decoded for link extraction.
    Decode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Decode => "decode",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProbeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn transient(message: impl Into<String>) -> Self {
        ProbeError { kind: ErrorKind::Transient, message: message.into() }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ProbeError { kind: ErrorKind::Fatal, message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ProbeError { kind: ErrorKind::Decode, message: message.into() }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

/// Errors that stop a scan before any worker starts.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to read {path}: {source}")]
    Wordlist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

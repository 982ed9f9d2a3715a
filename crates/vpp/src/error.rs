use std::path::PathBuf;
use thiserror::Error;

/// Error kinds a test case can terminate with
#[derive(Debug, Error)]
pub enum VppError {
    /// Negotiation could not resolve a usable software or hardware format.
    /// Reported as a skip, never as a failure.
    #[error("{0} unsupported")]
    UnsupportedFormat(String),

    /// The case itself is malformed (bad r2r value, out-of-range parameter, ...)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// ffmpeg could not be spawned or exited abnormally
    #[error("ffmpeg failed (exit code: {exit_code:?}) for {artifact}:\n{stderr}")]
    ToolInvocation {
        artifact: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Fingerprint of an artifact differs from the expected value
    #[error("content mismatch for {}: expected {expected}, got {actual}", .artifact.display())]
    ContentMismatch {
        artifact: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VppError {
    /// Skip outcomes are not failures
    pub fn is_skip(&self) -> bool {
        matches!(self, VppError::UnsupportedFormat(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VppError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, VppError>;

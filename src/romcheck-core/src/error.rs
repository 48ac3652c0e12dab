//! Error types for scan operations.
//!
//! Probes never fail outright: missing evidence turns into a negative or
//! unknown result value. The variants here cover the seams where a failure
//! is worth reporting.

use thiserror::Error;

/// Errors raised while collecting evidence.
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// The queried package is not installed.
    #[error("Package not found: {package}")]
    PackageNotFound {
        /// Package name.
        package: String,
    },

    /// The evidence source cannot answer this query on this platform.
    #[error("Unsupported query: {reason}")]
    Unsupported {
        /// Why the query is unsupported.
        reason: String,
    },

    /// Platform call failed.
    #[error("Platform error: {message}")]
    Platform {
        /// Error message.
        message: String,
    },
}

impl EvidenceError {
    /// Create a platform error.
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Create an unsupported-query error.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }
}

#[cfg(all(target_os = "android", feature = "android"))]
impl From<jni::errors::Error> for EvidenceError {
    fn from(e: jni::errors::Error) -> Self {
        Self::platform(format!("JNI: {e}"))
    }
}

/// Errors raised by the remote integrity check.
#[derive(Debug, Error)]
pub enum PlayIntegrityError {
    /// The token provider rejected the request.
    #[error("{message}")]
    TokenRequest {
        /// Message reported by the provider, kept verbatim.
        message: String,
    },

    /// The verification backend could not be reached.
    #[error("Verifier transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The verification backend answered with something unreadable.
    #[error("Invalid verifier response: {reason}")]
    InvalidResponse {
        /// Why the response was rejected.
        reason: String,
    },
}

impl PlayIntegrityError {
    /// Create a token request error carrying the provider's message.
    pub fn token(message: impl Into<String>) -> Self {
        Self::TokenRequest {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Errors that abort a whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A probe task failed unexpectedly.
    #[error("Security scan failed in {probe}: {message}")]
    ProbeFailed {
        /// Probe that failed.
        probe: &'static str,
        /// Failure description.
        message: String,
    },

    /// The scan was cancelled before completing.
    #[error("Security scan cancelled during {probe}")]
    Cancelled {
        /// Probe that was running.
        probe: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message.
        message: String,
    },

    /// Export could not be written.
    #[error("Export failed: {message}")]
    ExportFailed {
        /// Error message.
        message: String,
    },
}

impl ScanError {
    /// Whether the caller should offer to run the scan again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProbeFailed { .. } | Self::Cancelled { .. })
    }

    /// Convert a failed blocking task into a scan error.
    pub(crate) fn from_join(probe: &'static str, err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled { probe }
        } else {
            Self::ProbeFailed {
                probe,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        Self::ExportFailed {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        Self::ExportFailed {
            message: e.to_string(),
        }
    }
}

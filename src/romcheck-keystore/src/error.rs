//! Error types for key store operations.

use thiserror::Error;

/// Errors that can occur during key store operations.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// No attestation-capable key store on this platform.
    #[error("No attestation-capable key store available on this platform")]
    NoPlatformSupport,

    /// Key store exists but cannot be used right now.
    #[error("Hardware not available: {reason}")]
    HardwareNotAvailable {
        /// Reason hardware is not available.
        reason: String,
    },

    /// Key with the specified alias not found.
    #[error("Key not found: {alias}")]
    KeyNotFound {
        /// The key alias that was not found.
        alias: String,
    },

    /// Key generation failed.
    #[error("Key generation failed: {reason}")]
    KeyGenerationFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// Certificate chain could not be read.
    #[error("Attestation failed: {reason}")]
    AttestationFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// Deleting a key store entry failed.
    #[error("Key deletion failed: {reason}")]
    DeletionFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// Invalid key specification.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Platform-specific error.
    #[error("Platform error: {message}")]
    PlatformError {
        /// Error message from the platform.
        message: String,
    },
}

impl KeystoreError {
    /// Create a platform error from a message.
    #[must_use]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::PlatformError {
            message: message.into(),
        }
    }

    /// Create a key generation error from a reason.
    #[must_use]
    pub fn generation(reason: impl Into<String>) -> Self {
        Self::KeyGenerationFailed {
            reason: reason.into(),
        }
    }

    /// Create an attestation error from a reason.
    #[must_use]
    pub fn attestation(reason: impl Into<String>) -> Self {
        Self::AttestationFailed {
            reason: reason.into(),
        }
    }

    /// Whether the error means attestation is simply not offered here,
    /// as opposed to a failure of an available key store.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::NoPlatformSupport | Self::HardwareNotAvailable { .. }
        )
    }
}

#[cfg(all(target_os = "android", feature = "android"))]
impl From<jni::errors::Error> for KeystoreError {
    fn from(err: jni::errors::Error) -> Self {
        Self::platform(err.to_string())
    }
}

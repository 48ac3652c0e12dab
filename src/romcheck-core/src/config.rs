//! Configuration for the security scanner.

use std::time::Duration;

use crate::error::ScanError;

/// Configuration for a [`SecurityScanner`](crate::SecurityScanner).
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Challenge bound into the attestation certificate.
    pub attestation_challenge: Vec<u8>,
    /// Prefix for attestation key aliases; the epoch-ms time is appended.
    pub alias_prefix: String,
    /// Lowest platform API level with key attestation (Android O).
    pub min_attestation_sdk: u32,
    /// Keep attestation entries in the key store after a scan.
    pub retain_attestation_keys: bool,
    /// Request a StrongBox key when the device has one.
    pub prefer_strongbox: bool,
    /// Backend that decodes integrity tokens into verdicts.
    pub verifier_endpoint: Option<String>,
    /// Timeout for verifier requests.
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            attestation_challenge: b"ROMChecker".to_vec(),
            alias_prefix: "romcheck_attest_".into(),
            min_attestation_sdk: 26,
            retain_attestation_keys: false,
            prefer_strongbox: false,
            verifier_endpoint: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ScanConfig {
    /// Check the configuration before a scanner is built from it.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ConfigError`] for an empty challenge or alias
    /// prefix, a zero timeout, or a verifier endpoint that is not HTTP(S).
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.attestation_challenge.is_empty() {
            return Err(ScanError::ConfigError {
                message: "attestation challenge must not be empty".into(),
            });
        }
        if self.alias_prefix.is_empty() {
            return Err(ScanError::ConfigError {
                message: "alias prefix must not be empty".into(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ScanError::ConfigError {
                message: "timeout must be non-zero".into(),
            });
        }
        if let Some(endpoint) = &self.verifier_endpoint {
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(ScanError::ConfigError {
                    message: format!("verifier endpoint is not an HTTP URL: {endpoint}"),
                });
            }
        }
        Ok(())
    }

    /// Alias for an attestation key created at `epoch_ms`.
    #[must_use]
    pub fn attestation_alias(&self, epoch_ms: i64) -> String {
        format!("{}{}", self.alias_prefix, epoch_ms)
    }
}

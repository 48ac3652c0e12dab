//! Attesting key store trait and key specification.
//!
//! This module defines the [`AttestingKeystore`] trait that all platform
//! backends provide. Calls are blocking: on Android every operation is a
//! JNI round trip into the Keystore service, so callers on an async runtime
//! should run them on the blocking pool.

use crate::error::KeystoreError;
use crate::types::{HardwareType, KeyDigest};

/// Specification for an attestation key.
#[derive(Debug, Clone)]
pub struct AttestationKeySpec {
    /// Unique alias for the key store entry.
    pub alias: String,

    /// Challenge embedded in the attestation extension of the leaf certificate.
    pub challenge: Vec<u8>,

    /// EC key size in bits (256 selects P-256).
    pub key_size: u32,

    /// Digest the key is authorized for.
    pub digest: KeyDigest,

    /// Ask for a StrongBox-backed key when the device has one.
    pub prefer_strongbox: bool,
}

impl AttestationKeySpec {
    /// Create a P-256/SHA-256 specification with the given alias and challenge.
    #[must_use]
    pub fn new(alias: impl Into<String>, challenge: impl Into<Vec<u8>>) -> Self {
        Self {
            alias: alias.into(),
            challenge: challenge.into(),
            key_size: 256,
            digest: KeyDigest::Sha256,
            prefer_strongbox: false,
        }
    }

    /// Set the digest.
    #[must_use]
    pub fn digest(mut self, digest: KeyDigest) -> Self {
        self.digest = digest;
        self
    }

    /// Set whether StrongBox is preferred.
    #[must_use]
    pub fn prefer_strongbox(mut self, prefer: bool) -> Self {
        self.prefer_strongbox = prefer;
        self
    }

    /// Check the key spec before handing it to the platform.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidConfiguration`] for an empty alias or
    /// challenge, or an unsupported key size.
    pub fn validate(&self) -> Result<(), KeystoreError> {
        if self.alias.is_empty() {
            return Err(KeystoreError::InvalidConfiguration {
                reason: "alias must not be empty".into(),
            });
        }
        if self.challenge.is_empty() {
            return Err(KeystoreError::InvalidConfiguration {
                reason: "attestation challenge must not be empty".into(),
            });
        }
        if !matches!(self.key_size, 256 | 384 | 521) {
            return Err(KeystoreError::InvalidConfiguration {
                reason: format!("unsupported EC key size {}", self.key_size),
            });
        }
        Ok(())
    }
}

/// A key store able to generate keys with an attestation certificate chain.
///
/// ## Platform Implementations
///
/// - Android: `AndroidKeystore` (feature: `android`)
///
/// ## Example
///
/// ```rust,ignore
/// use romcheck_keystore::{AttestationKeySpec, AttestingKeystore};
///
/// fn attest(store: &dyn AttestingKeystore) -> Result<Vec<Vec<u8>>, KeystoreError> {
///     let spec = AttestationKeySpec::new("attest_1", b"challenge".to_vec());
///     store.generate_attested_key(&spec)?;
///     let chain = store.certificate_chain(&spec.alias)?;
///     store.delete_key(&spec.alias)?;
///     Ok(chain)
/// }
/// ```
pub trait AttestingKeystore: Send + Sync {
    /// Kind of key store behind this backend.
    fn hardware_type(&self) -> HardwareType;

    /// Generate a new key pair inside the key store, requesting an
    /// attestation certificate bound to `spec.challenge`.
    ///
    /// # Errors
    ///
    /// Returns error if the key spec is invalid or generation fails.
    fn generate_attested_key(&self, spec: &AttestationKeySpec) -> Result<(), KeystoreError>;

    /// Read the certificate chain for `alias`, leaf first, DER encoded.
    ///
    /// An alias without a chain yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns error if the key store cannot be queried.
    fn certificate_chain(&self, alias: &str) -> Result<Vec<Vec<u8>>, KeystoreError>;

    /// Remove the entry for `alias`.
    ///
    /// # Errors
    ///
    /// Returns error if the entry cannot be deleted.
    fn delete_key(&self, alias: &str) -> Result<(), KeystoreError>;
}

//! Core types for attestation key stores.

use serde::{Deserialize, Serialize};

/// Type of key store backing an attestation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HardwareType {
    /// Android Hardware Keystore (TEE-backed)
    AndroidKeystore = 1,

    /// Android StrongBox (dedicated secure element)
    AndroidStrongbox = 2,

    /// No hardware key store; attestation is not offered.
    SoftwareOnly = 7,
}

impl HardwareType {
    /// Whether keys of this type live in protected hardware.
    #[must_use]
    pub const fn is_hardware(&self) -> bool {
        !matches!(self, Self::SoftwareOnly)
    }
}

/// Digest bound to the attestation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyDigest {
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl KeyDigest {
    /// Name understood by the platform key store.
    #[must_use]
    pub const fn platform_name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }
}

//! Platform detection and key store factory.
//!
//! Detects whether an attestation-capable key store is reachable and creates
//! the matching backend. Platforms without one report `SoftwareOnly` and the
//! factory refuses to build a backend, so callers treat attestation as
//! unavailable rather than failed.

use crate::error::KeystoreError;
use crate::keystore::AttestingKeystore;
use crate::types::HardwareType;

/// Key store capabilities detected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeystoreCapabilities {
    /// Best available key store type
    pub hardware_type: HardwareType,
    /// Whether attested key generation can be requested
    pub supports_attestation: bool,
    /// Whether a StrongBox secure element is present
    pub has_strongbox: bool,
}

impl KeystoreCapabilities {
    const fn unsupported() -> Self {
        Self {
            hardware_type: HardwareType::SoftwareOnly,
            supports_attestation: false,
            has_strongbox: false,
        }
    }
}

/// Detect key store capabilities of the current platform.
pub fn detect_capabilities() -> KeystoreCapabilities {
    #[cfg(all(target_os = "android", feature = "android"))]
    {
        detect_android_capabilities()
    }

    #[cfg(not(all(target_os = "android", feature = "android")))]
    {
        KeystoreCapabilities::unsupported()
    }
}

#[cfg(all(target_os = "android", feature = "android"))]
fn detect_android_capabilities() -> KeystoreCapabilities {
    if super::android::java_vm().is_none() {
        return KeystoreCapabilities::unsupported();
    }

    let has_strongbox = super::android::has_strongbox();
    KeystoreCapabilities {
        hardware_type: if has_strongbox {
            HardwareType::AndroidStrongbox
        } else {
            HardwareType::AndroidKeystore
        },
        supports_attestation: true,
        has_strongbox,
    }
}

/// Create the attestation key store for this platform.
///
/// # Errors
///
/// Returns [`KeystoreError::NoPlatformSupport`] when the platform has no
/// attestation-capable key store.
pub fn create_platform_keystore() -> Result<Box<dyn AttestingKeystore>, KeystoreError> {
    let capabilities = detect_capabilities();

    tracing::info!(
        hardware_type = ?capabilities.hardware_type,
        supports_attestation = capabilities.supports_attestation,
        has_strongbox = capabilities.has_strongbox,
        "create_platform_keystore: detected capabilities"
    );

    if !capabilities.supports_attestation {
        return Err(KeystoreError::NoPlatformSupport);
    }

    #[cfg(all(target_os = "android", feature = "android"))]
    {
        let keystore = super::android::AndroidKeystore::new()?;
        Ok(Box::new(keystore))
    }

    #[cfg(not(all(target_os = "android", feature = "android")))]
    {
        Err(KeystoreError::NoPlatformSupport)
    }
}

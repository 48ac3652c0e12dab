//! Raw device evidence.
//!
//! Probes never touch the file system, property store or package manager
//! directly. They ask an [`EvidenceSource`], which answers with plain
//! values and absorbs every platform failure into a negative answer.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    EvidenceSource                    │
//! ├──────────────────┬───────────────────┬───────────────┤
//! │  SystemEvidence  │  PackageRegistry  │ MemoryEvidence│
//! │  fs, getprop,    │  pm / JNI         │ (fakes,       │
//! │  /proc/cmdline   │  PackageManager   │  replay)      │
//! └──────────────────┴───────────────────┴───────────────┘
//! ```

use serde::{Deserialize, Serialize};

pub use crate::error::EvidenceError;

#[cfg(all(target_os = "android", feature = "android"))]
pub mod android;
mod memory;
mod system;

#[cfg(all(target_os = "android", feature = "android"))]
pub use android::AndroidPackageManager;
pub use memory::MemoryEvidence;
pub use system::{ShellPackageRegistry, SystemEvidence};

/// Platform API level that introduced `SigningInfo` (Android P).
pub const SIGNING_INFO_MIN_SDK: u32 = 28;

/// Build metadata of the running OS image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Build tags (`release-keys`, `test-keys`, ...), when reported.
    pub tags: Option<String>,
    /// Build fingerprint.
    pub fingerprint: String,
    /// Display id.
    pub display: String,
    /// Platform API level.
    pub sdk_int: u32,
}

/// Signing certificates of a package, in the shape the platform returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningInfo {
    /// Content signers from `SigningInfo` (API 28 and later).
    SigningCertificates(Vec<Vec<u8>>),
    /// Flat signature list (before API 28).
    LegacySignatures(Vec<Vec<u8>>),
}

impl SigningInfo {
    /// Raw certificate blobs, whichever shape they came in.
    #[must_use]
    pub fn into_certificates(self) -> Vec<Vec<u8>> {
        match self {
            Self::SigningCertificates(certs) | Self::LegacySignatures(certs) => certs,
        }
    }

    /// Number of certificate blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::SigningCertificates(certs) | Self::LegacySignatures(certs) => certs.len(),
        }
    }

    /// Whether no blobs were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of raw device signals.
///
/// No method may panic. Reads that fail report absence (`false` / `None`)
/// except [`signing_info`](Self::signing_info), whose caller needs to tell
/// "no certificates" from "package could not be queried".
pub trait EvidenceSource: Send + Sync {
    /// Whether `path` exists.
    fn file_exists(&self, path: &str) -> bool;

    /// Whether `package` is installed. Any failure reads as not installed.
    fn is_package_installed(&self, package: &str) -> bool;

    /// Value of a system property, `None` when unset or unreadable.
    fn read_system_property(&self, name: &str) -> Option<String>;

    /// Kernel command line, `None` when unreadable.
    fn read_kernel_cmdline(&self) -> Option<String>;

    /// Build metadata.
    fn build_info(&self) -> BuildInfo;

    /// Signing certificates of `package`.
    ///
    /// # Errors
    ///
    /// Returns error if the package cannot be queried.
    fn signing_info(&self, package: &str) -> Result<SigningInfo, EvidenceError>;

    /// Signing certificates of `package` as a flat list of DER blobs.
    ///
    /// # Errors
    ///
    /// Returns error if the package cannot be queried.
    fn signing_certificates(&self, package: &str) -> Result<Vec<Vec<u8>>, EvidenceError> {
        self.signing_info(package).map(SigningInfo::into_certificates)
    }
}

/// Package manager seam used by [`SystemEvidence`].
pub trait PackageRegistry: Send + Sync {
    /// Whether `package` is installed.
    fn is_installed(&self, package: &str) -> bool;

    /// Signing certificates of `package`, retrieved the way `sdk_int`
    /// requires.
    ///
    /// # Errors
    ///
    /// Returns error if the package cannot be queried.
    fn signing_info(&self, package: &str, sdk_int: u32) -> Result<SigningInfo, EvidenceError>;
}

/// Create the evidence source for the current platform.
///
/// On Android with the `android` feature and an initialized application
/// context, package queries go through `PackageManager`; otherwise they fall
/// back to the `pm` shell command.
#[must_use]
pub fn create_platform_evidence() -> SystemEvidence {
    #[cfg(all(target_os = "android", feature = "android"))]
    {
        if romcheck_keystore::platform::android::app_context().is_some() {
            tracing::debug!("evidence: using PackageManager via JNI");
            return SystemEvidence::with_registry(Box::new(AndroidPackageManager));
        }
        tracing::warn!("evidence: no application context, falling back to pm shell");
    }

    SystemEvidence::new()
}

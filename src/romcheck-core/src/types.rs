//! Result types produced by a security scan.
//!
//! Every value here is an immutable snapshot built once per scan. Enum
//! variants serialize to the upper-case names used in exports
//! (`MAGISK`, `TRUSTED_ENVIRONMENT`, ...), and `as_str()` returns the same
//! name.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Root detection
// =============================================================================

/// One root-detection technique and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionMethod {
    /// Technique name ("SU Binary", "Magisk", ...).
    pub name: String,
    /// Whether the technique found root indicators.
    pub detected: bool,
    /// Audit text, never empty.
    pub details: String,
}

impl DetectionMethod {
    /// Create a detection method record.
    pub fn new(name: impl Into<String>, detected: bool, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detected,
            details: details.into(),
        }
    }
}

/// Root tooling variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RootType {
    /// Magisk
    Magisk,
    /// KernelSU
    #[serde(rename = "KERNELSU")]
    KernelSu,
    /// Kitsune Mask (Magisk fork with a hidden marker)
    Kitsune,
    /// SuperSU
    #[serde(rename = "SUPERSU")]
    SuperSu,
    /// Root indicators without a recognizable variant
    Unknown,
    /// No root indicators
    None,
}

impl RootType {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Magisk => "MAGISK",
            Self::KernelSu => "KERNELSU",
            Self::Kitsune => "KITSUNE",
            Self::SuperSu => "SUPERSU",
            Self::Unknown => "UNKNOWN",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for RootType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of root detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDetectionResult {
    /// OR over all `methods[*].detected`.
    pub is_rooted: bool,
    /// Detected root tooling variant.
    pub root_type: RootType,
    /// Build looks like a custom ROM.
    pub is_custom_rom: bool,
    /// Every technique, in fixed order.
    pub methods: Vec<DetectionMethod>,
}

// =============================================================================
// Bootloader
// =============================================================================

/// Bootloader lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BootloaderState {
    /// Refuses to flash unsigned images.
    Locked,
    /// Accepts arbitrary images.
    Unlocked,
    /// No conclusive signal.
    Unknown,
}

impl BootloaderState {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Unlocked => "UNLOCKED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for BootloaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified boot color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifiedBootState {
    /// Vendor-signed image, locked bootloader.
    Green,
    /// Image signed with a user-installed key.
    Yellow,
    /// Unlocked bootloader, integrity not enforced.
    Orange,
    /// Verification failed.
    Red,
    /// Not reported.
    Unknown,
}

impl VerifiedBootState {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Orange => "ORANGE",
            Self::Red => "RED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Boot state label reported in key attestation results.
    #[must_use]
    pub const fn attestation_label(&self) -> &'static str {
        match self {
            Self::Green => "VERIFIED",
            Self::Orange => "UNVERIFIED",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for VerifiedBootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of bootloader inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootloaderResult {
    /// Resolved lock state.
    pub state: BootloaderState,
    /// Verified boot color from the kernel command line.
    pub verified_boot_state: VerifiedBootState,
    /// Three-line summary: state, color, attempted methods.
    pub details: String,
}

// =============================================================================
// ROM signature
// =============================================================================

/// Provenance of the OS signing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureType {
    /// Public AOSP test keys.
    TestKeys,
    /// Vendor release keys.
    ReleaseKeys,
    /// No signing certificate found.
    Unsigned,
    /// Certificates present, provenance unclear.
    Unknown,
}

impl SignatureType {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TestKeys => "TEST_KEYS",
            Self::ReleaseKeys => "RELEASE_KEYS",
            Self::Unsigned => "UNSIGNED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata extracted from one signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Issuer distinguished name.
    pub issuer: String,
    /// Subject distinguished name.
    pub subject: String,
    /// SHA-1 of the encoded certificate, `AB:CD:...`.
    pub sha1_fingerprint: String,
    /// SHA-256 of the encoded certificate, `AB:CD:...`.
    pub sha256_fingerprint: String,
    /// Not-before, epoch milliseconds.
    pub valid_from: i64,
    /// Not-after, epoch milliseconds.
    pub valid_to: i64,
    /// Signature algorithm name, e.g. `SHA256withRSA`.
    pub algorithm: String,
}

/// Outcome of ROM signature analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomSignatureResult {
    /// Classified provenance.
    pub signature_type: SignatureType,
    /// Parsed signing certificates.
    pub certificates: Vec<CertificateInfo>,
    /// `certificates` is non-empty.
    pub is_valid: bool,
}

impl RomSignatureResult {
    /// Result used when the OS package cannot be queried.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            signature_type: SignatureType::Unknown,
            certificates: Vec::new(),
            is_valid: false,
        }
    }
}

// =============================================================================
// Key attestation
// =============================================================================

/// Security level assigned to an attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    /// No hardware guarantee.
    Software,
    /// TEE-backed with a locked bootloader.
    TrustedEnvironment,
    /// Dedicated secure element.
    Strongbox,
    /// Bootloader state undetermined; no guarantee reported.
    Unknown,
}

impl SecurityLevel {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Software => "SOFTWARE",
            Self::TrustedEnvironment => "TRUSTED_ENVIRONMENT",
            Self::Strongbox => "STRONGBOX",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of key attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttestationResult {
    /// Key generated by a hardware-backed key store.
    pub is_hardware_backed: bool,
    /// "VERIFIED", "UNVERIFIED" or "UNKNOWN".
    pub boot_state: String,
    /// Bootloader reported LOCKED.
    pub bootloader_locked: bool,
    /// Verified boot key from the root of trust (not extracted).
    pub verified_boot_key: Option<String>,
    /// Certificate chain, leaf first, as text.
    pub certificates: Vec<String>,
    /// Derived security level.
    pub security_level: SecurityLevel,
}

// =============================================================================
// Play Integrity
// =============================================================================

/// Remote integrity verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityVerdict {
    /// Hardware-backed proof of a genuine, locked device.
    MeetsStrongIntegrity,
    /// Genuine certified device.
    MeetsDeviceIntegrity,
    /// Basic environment checks passed.
    MeetsBasicIntegrity,
    /// The check ran and failed.
    Failed,
    /// The check could not run.
    Unknown,
}

impl IntegrityVerdict {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MeetsStrongIntegrity => "MEETS_STRONG_INTEGRITY",
            Self::MeetsDeviceIntegrity => "MEETS_DEVICE_INTEGRITY",
            Self::MeetsBasicIntegrity => "MEETS_BASIC_INTEGRITY",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for IntegrityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the remote integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayIntegrityResult {
    /// Overall verdict.
    pub verdict: IntegrityVerdict,
    /// Device integrity passed.
    pub device_integrity: bool,
    /// Basic integrity passed.
    pub basic_integrity: bool,
    /// Strong integrity passed.
    pub strong_integrity: bool,
    /// Reason when the check did not pass.
    pub error_message: Option<String>,
}

impl PlayIntegrityResult {
    /// A result with no passing flags.
    #[must_use]
    pub fn without_integrity(verdict: IntegrityVerdict, error_message: Option<String>) -> Self {
        Self {
            verdict,
            device_integrity: false,
            basic_integrity: false,
            strong_integrity: false,
            error_message,
        }
    }
}

// =============================================================================
// Scan snapshot
// =============================================================================

/// Everything one scan found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityStatus {
    /// Remote integrity check.
    pub play_integrity: PlayIntegrityResult,
    /// Root detection.
    pub root_status: RootDetectionResult,
    /// Bootloader inspection.
    pub bootloader_status: BootloaderResult,
    /// ROM signature analysis.
    pub rom_signature: RomSignatureResult,
    /// Key attestation, absent when unavailable.
    pub key_attestation: Option<KeyAttestationResult>,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
}

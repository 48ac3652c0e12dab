//! Scan export document.
//!
//! A flat JSON summary of a [`SecurityStatus`] for sharing. Certificate
//! details and attestation chains are left out; only counts and verdicts
//! are exported.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ScanError;
use crate::types::{
    BootloaderState, IntegrityVerdict, RootType, SecurityLevel, SecurityStatus, SignatureType,
    VerifiedBootState,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exported scan summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Capture time, `yyyy-MM-dd HH:mm:ss` in local time.
    pub timestamp: String,
    /// Integrity verdict.
    pub play_integrity: ExportPlayIntegrity,
    /// Root detection.
    pub root_status: ExportRootStatus,
    /// Bootloader inspection.
    pub bootloader: ExportBootloader,
    /// ROM signature.
    pub rom_signature: ExportRomSignature,
    /// Key attestation, `null` when unavailable.
    pub key_attestation: Option<ExportKeyAttestation>,
}

/// Exported integrity verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPlayIntegrity {
    /// Overall verdict.
    pub verdict: IntegrityVerdict,
    /// Device integrity passed.
    pub device_integrity: bool,
    /// Basic integrity passed.
    pub basic_integrity: bool,
    /// Strong integrity passed.
    pub strong_integrity: bool,
    /// Failure reason.
    pub error: Option<String>,
}

/// Exported root detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRootStatus {
    /// Any technique fired.
    pub is_rooted: bool,
    /// Root tooling variant.
    pub root_type: RootType,
    /// Custom ROM build.
    #[serde(rename = "isCustomROM")]
    pub is_custom_rom: bool,
    /// Every technique, in order.
    pub detections: Vec<ExportDetection>,
}

/// One exported detection technique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDetection {
    /// Technique name.
    pub name: String,
    /// Technique fired.
    pub detected: bool,
    /// Audit text.
    pub details: String,
}

/// Exported bootloader state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBootloader {
    /// Lock state.
    pub state: BootloaderState,
    /// Verified boot color.
    pub verified_boot_state: VerifiedBootState,
    /// State summary and audit log.
    pub details: String,
}

/// Exported ROM signature summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRomSignature {
    /// Signing key provenance.
    #[serde(rename = "type")]
    pub signature_type: SignatureType,
    /// Parsed certificates.
    pub certificate_count: usize,
    /// At least one certificate parsed.
    pub is_valid: bool,
}

/// Exported key attestation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportKeyAttestation {
    /// Hardware-backed key.
    pub hardware_backed: bool,
    /// Boot state label.
    pub boot_state: String,
    /// Bootloader locked.
    pub bootloader_locked: bool,
    /// Security level.
    pub security_level: SecurityLevel,
}

/// Format epoch milliseconds as local `yyyy-MM-dd HH:mm:ss`.
#[must_use]
pub fn format_timestamp(epoch_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(epoch_ms) {
        Some(utc) => utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        None => epoch_ms.to_string(),
    }
}

impl ExportDocument {
    /// Build the export summary of a scan.
    #[must_use]
    pub fn from_status(status: &SecurityStatus) -> Self {
        let integrity = &status.play_integrity;
        let root = &status.root_status;
        let bootloader = &status.bootloader_status;
        let signature = &status.rom_signature;

        Self {
            timestamp: format_timestamp(status.timestamp),
            play_integrity: ExportPlayIntegrity {
                verdict: integrity.verdict,
                device_integrity: integrity.device_integrity,
                basic_integrity: integrity.basic_integrity,
                strong_integrity: integrity.strong_integrity,
                error: integrity.error_message.clone(),
            },
            root_status: ExportRootStatus {
                is_rooted: root.is_rooted,
                root_type: root.root_type,
                is_custom_rom: root.is_custom_rom,
                detections: root
                    .methods
                    .iter()
                    .map(|m| ExportDetection {
                        name: m.name.clone(),
                        detected: m.detected,
                        details: m.details.clone(),
                    })
                    .collect(),
            },
            bootloader: ExportBootloader {
                state: bootloader.state,
                verified_boot_state: bootloader.verified_boot_state,
                details: bootloader.details.clone(),
            },
            rom_signature: ExportRomSignature {
                signature_type: signature.signature_type,
                certificate_count: signature.certificates.len(),
                is_valid: signature.is_valid,
            },
            key_attestation: status
                .key_attestation
                .as_ref()
                .map(|k| ExportKeyAttestation {
                    hardware_backed: k.is_hardware_backed,
                    boot_state: k.boot_state.clone(),
                    bootloader_locked: k.bootloader_locked,
                    security_level: k.security_level,
                }),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ScanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// File name for an export written at `epoch_ms`.
#[must_use]
pub fn export_file_name(epoch_ms: i64) -> String {
    format!("romchecker_scan_{epoch_ms}.json")
}

/// Write the export document of `status` into `dir`.
///
/// Returns the path of the written file.
///
/// # Errors
///
/// Returns [`ScanError::ExportFailed`] if the file cannot be written.
pub fn write_export(status: &SecurityStatus, dir: &Path) -> Result<PathBuf, ScanError> {
    let json = ExportDocument::from_status(status).to_json_pretty()?;
    let path = dir.join(export_file_name(Utc::now().timestamp_millis()));
    std::fs::write(&path, json)?;
    info!(path = %path.display(), "scan export written");
    Ok(path)
}

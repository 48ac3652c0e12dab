//! ROM signature analysis.
//!
//! Reads the signing certificates of the core OS package and classifies the
//! build's signing keys from its tags.

use tracing::{info, warn};

use crate::certificate::parse_certificates;
use crate::evidence::EvidenceSource;
use crate::types::{RomSignatureResult, SignatureType};

/// Package whose signing certificates identify the ROM signer.
pub const OS_PACKAGE: &str = "android";

/// Classify signing keys from build tags and the parsed certificate count.
///
/// Tags take precedence over the certificate list.
#[must_use]
pub fn classify_signature(tags: &str, certificate_count: usize) -> SignatureType {
    if tags.contains("release-keys") {
        SignatureType::ReleaseKeys
    } else if tags.contains("test-keys") {
        SignatureType::TestKeys
    } else if certificate_count == 0 {
        SignatureType::Unsigned
    } else {
        SignatureType::Unknown
    }
}

/// Analyze the signing certificates of the OS package.
pub fn analyze_rom_signature(evidence: &dyn EvidenceSource) -> RomSignatureResult {
    let blobs = match evidence.signing_certificates(OS_PACKAGE) {
        Ok(blobs) => blobs,
        Err(e) => {
            warn!(package = OS_PACKAGE, "cannot read signing certificates: {}", e);
            return RomSignatureResult::unknown();
        },
    };

    let certificates = parse_certificates(&blobs);
    let tags = evidence.build_info().tags.unwrap_or_default();
    let signature_type = classify_signature(&tags, certificates.len());

    info!(
        signature_type = %signature_type,
        blobs = blobs.len(),
        parsed = certificates.len(),
        "ROM signature analyzed"
    );

    RomSignatureResult {
        is_valid: !certificates.is_empty(),
        signature_type,
        certificates,
    }
}

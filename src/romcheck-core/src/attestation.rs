//! Key attestation probe.
//!
//! Generates a fresh EC key in the platform key store with an attestation
//! challenge, reads back its certificate chain and classifies the root of
//! trust from the bootloader state. The chain itself is not verified against
//! a trust anchor; it is reported as text.
//!
//! Key store unavailability is an ordinary outcome and yields `None`.

use romcheck_keystore::{AttestationKeySpec, AttestingKeystore};
use tracing::{debug, info, warn};

use crate::bootloader::check_bootloader;
use crate::certificate::describe_certificate;
use crate::config::ScanConfig;
use crate::evidence::EvidenceSource;
use crate::types::{BootloaderState, KeyAttestationResult, SecurityLevel};

/// Security level implied by the bootloader lock state.
///
/// An undetermined bootloader never reports a hardware guarantee.
#[must_use]
pub fn security_level_for(state: BootloaderState) -> SecurityLevel {
    match state {
        BootloaderState::Unknown => SecurityLevel::Unknown,
        BootloaderState::Locked => SecurityLevel::TrustedEnvironment,
        BootloaderState::Unlocked => SecurityLevel::Software,
    }
}

/// Run key attestation.
///
/// `now_ms` seeds the key alias. Returns `None` below the minimum platform
/// level, without a hardware key store, or when any key store call fails or
/// the chain comes back empty.
pub fn perform_key_attestation(
    evidence: &dyn EvidenceSource,
    keystore: Option<&dyn AttestingKeystore>,
    config: &ScanConfig,
    now_ms: i64,
) -> Option<KeyAttestationResult> {
    let sdk_int = evidence.build_info().sdk_int;
    if sdk_int < config.min_attestation_sdk {
        debug!(
            sdk_int,
            min = config.min_attestation_sdk,
            "key attestation not supported on this platform level"
        );
        return None;
    }

    let Some(keystore) = keystore else {
        debug!("no key store configured, skipping attestation");
        return None;
    };
    let hardware_type = keystore.hardware_type();
    if !hardware_type.is_hardware() {
        debug!(?hardware_type, "key store is not hardware-backed");
        return None;
    }

    let spec = AttestationKeySpec::new(
        config.attestation_alias(now_ms),
        config.attestation_challenge.clone(),
    )
    .prefer_strongbox(config.prefer_strongbox);

    if let Err(e) = keystore.generate_attested_key(&spec) {
        warn!(alias = %spec.alias, "attestation key generation failed: {}", e);
        return None;
    }

    let chain = keystore.certificate_chain(&spec.alias);

    if !config.retain_attestation_keys {
        if let Err(e) = keystore.delete_key(&spec.alias) {
            warn!(alias = %spec.alias, "failed to delete attestation key: {}", e);
        }
    }

    let chain = match chain {
        Ok(chain) if !chain.is_empty() => chain,
        Ok(_) => {
            warn!(alias = %spec.alias, "empty attestation chain");
            return None;
        },
        Err(e) => {
            warn!(alias = %spec.alias, "attestation chain unavailable: {}", e);
            return None;
        },
    };

    let bootloader = check_bootloader(evidence);
    let security_level = security_level_for(bootloader.state);

    info!(
        alias = %spec.alias,
        chain_len = chain.len(),
        bootloader = %bootloader.state,
        security_level = %security_level,
        "key attestation complete"
    );

    Some(KeyAttestationResult {
        is_hardware_backed: hardware_type.is_hardware(),
        boot_state: bootloader
            .verified_boot_state
            .attestation_label()
            .to_string(),
        bootloader_locked: bootloader.state == BootloaderState::Locked,
        verified_boot_key: None,
        certificates: chain.iter().map(|der| describe_certificate(der)).collect(),
        security_level,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use romcheck_keystore::{HardwareType, KeystoreError};

    use super::*;
    use crate::evidence::MemoryEvidence;

    const ATTEST_EC: &[u8] = include_bytes!("../tests/fixtures/attest_ec.der");

    /// Key store double that records calls.
    #[derive(Default)]
    struct FakeKeystore {
        chain: Vec<Vec<u8>>,
        fail_generate: bool,
        missing_entry: bool,
        software: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeKeystore {
        fn with_chain(chain: Vec<Vec<u8>>) -> Self {
            Self {
                chain,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AttestingKeystore for FakeKeystore {
        fn hardware_type(&self) -> HardwareType {
            if self.software {
                HardwareType::SoftwareOnly
            } else {
                HardwareType::AndroidKeystore
            }
        }

        fn generate_attested_key(&self, spec: &AttestationKeySpec) -> Result<(), KeystoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("generate:{}", spec.alias));
            if self.fail_generate {
                return Err(KeystoreError::generation("ProviderException"));
            }
            assert_eq!(spec.challenge, b"ROMChecker");
            Ok(())
        }

        fn certificate_chain(&self, alias: &str) -> Result<Vec<Vec<u8>>, KeystoreError> {
            self.calls.lock().unwrap().push(format!("chain:{alias}"));
            if self.missing_entry {
                return Err(KeystoreError::KeyNotFound {
                    alias: alias.to_string(),
                });
            }
            Ok(self.chain.clone())
        }

        fn delete_key(&self, alias: &str) -> Result<(), KeystoreError> {
            self.calls.lock().unwrap().push(format!("delete:{alias}"));
            Ok(())
        }
    }

    fn device() -> MemoryEvidence {
        MemoryEvidence::new().with_sdk(34)
    }

    #[test]
    fn test_security_levels() {
        assert_eq!(security_level_for(BootloaderState::Unknown), SecurityLevel::Unknown);
        assert_eq!(
            security_level_for(BootloaderState::Locked),
            SecurityLevel::TrustedEnvironment
        );
        assert_eq!(security_level_for(BootloaderState::Unlocked), SecurityLevel::Software);
    }

    #[test]
    fn test_below_min_sdk() {
        let keystore = FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()]);
        let evidence = MemoryEvidence::new().with_sdk(25);
        let result = perform_key_attestation(&evidence, Some(&keystore), &ScanConfig::default(), 1);
        assert!(result.is_none());
        assert!(keystore.calls().is_empty());
    }

    #[test]
    fn test_no_keystore() {
        assert!(perform_key_attestation(&device(), None, &ScanConfig::default(), 1).is_none());
    }

    #[test]
    fn test_software_keystore_is_skipped() {
        let keystore = FakeKeystore {
            software: true,
            ..FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()])
        };
        let result = perform_key_attestation(&device(), Some(&keystore), &ScanConfig::default(), 1);
        assert!(result.is_none());
    }

    #[test]
    fn test_unknown_bootloader_reports_unknown_level() {
        let keystore = FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()]);
        let result =
            perform_key_attestation(&device(), Some(&keystore), &ScanConfig::default(), 42).unwrap();

        assert_eq!(result.security_level, SecurityLevel::Unknown);
        assert!(result.is_hardware_backed);
        assert!(!result.bootloader_locked);
        assert_eq!(result.boot_state, "UNKNOWN");
        assert_eq!(result.certificates.len(), 1);
        assert!(result.verified_boot_key.is_none());
    }

    #[test]
    fn test_locked_green_device() {
        let keystore = FakeKeystore::with_chain(vec![ATTEST_EC.to_vec(), vec![1, 2, 3]]);
        let evidence = device()
            .with_property("ro.boot.flash.locked", "1")
            .with_cmdline("androidboot.verifiedbootstate=green");

        let result =
            perform_key_attestation(&evidence, Some(&keystore), &ScanConfig::default(), 7).unwrap();
        assert_eq!(result.security_level, SecurityLevel::TrustedEnvironment);
        assert!(result.bootloader_locked);
        assert_eq!(result.boot_state, "VERIFIED");
        assert!(result.certificates[1].starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_unlocked_orange_device() {
        let keystore = FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()]);
        let evidence = device()
            .with_property("ro.boot.flash.locked", "0")
            .with_cmdline("androidboot.verifiedbootstate=orange");

        let result =
            perform_key_attestation(&evidence, Some(&keystore), &ScanConfig::default(), 7).unwrap();
        assert_eq!(result.security_level, SecurityLevel::Software);
        assert_eq!(result.boot_state, "UNVERIFIED");
    }

    #[test]
    fn test_key_is_deleted_after_reading_chain() {
        let keystore = FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()]);
        perform_key_attestation(&device(), Some(&keystore), &ScanConfig::default(), 1700);
        assert_eq!(
            keystore.calls(),
            vec![
                "generate:romcheck_attest_1700",
                "chain:romcheck_attest_1700",
                "delete:romcheck_attest_1700",
            ]
        );
    }

    #[test]
    fn test_key_retained_when_configured() {
        let keystore = FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()]);
        let config = ScanConfig {
            retain_attestation_keys: true,
            ..ScanConfig::default()
        };
        perform_key_attestation(&device(), Some(&keystore), &config, 5);
        assert!(!keystore.calls().iter().any(|c| c.starts_with("delete:")));
    }

    #[test]
    fn test_empty_chain_or_failure() {
        let keystore = FakeKeystore::with_chain(Vec::new());
        assert!(
            perform_key_attestation(&device(), Some(&keystore), &ScanConfig::default(), 1).is_none()
        );
        // the entry is still cleaned up
        assert_eq!(keystore.calls().len(), 3);

        let keystore = FakeKeystore {
            fail_generate: true,
            ..FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()])
        };
        assert!(
            perform_key_attestation(&device(), Some(&keystore), &ScanConfig::default(), 1).is_none()
        );
        assert_eq!(keystore.calls().len(), 1);
    }

    #[test]
    fn test_missing_entry_yields_none() {
        let keystore = FakeKeystore {
            missing_entry: true,
            ..FakeKeystore::with_chain(vec![ATTEST_EC.to_vec()])
        };
        let result = perform_key_attestation(&device(), Some(&keystore), &ScanConfig::default(), 9);
        assert!(result.is_none());
        assert_eq!(keystore.calls().last().map(String::as_str), Some("delete:romcheck_attest_9"));
    }
}

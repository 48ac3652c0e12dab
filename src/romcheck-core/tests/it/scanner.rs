//! End-to-end scans against fake devices.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use romcheck_core::evidence::{BuildInfo, EvidenceError, EvidenceSource, SigningInfo};
use romcheck_core::export::ExportDocument;
use romcheck_core::{
    write_export, BootloaderState, IntegrityTokenProvider, IntegrityVerdict, MemoryEvidence,
    PlayIntegrityError, RootType, ScanConfig, ScanError, SecurityLevel, SecurityScanner,
    SignatureType,
};
use romcheck_keystore::{AttestationKeySpec, AttestingKeystore, HardwareType, KeystoreError};
use tokio::sync::Notify;

const PLATFORM_RSA: &[u8] = include_bytes!("../fixtures/platform_rsa.der");
const ATTEST_EC: &[u8] = include_bytes!("../fixtures/attest_ec.der");

/// Key store that hands out a fixed chain and remembers live aliases.
#[derive(Default)]
struct FakeKeystore {
    live: Mutex<Vec<String>>,
}

impl AttestingKeystore for FakeKeystore {
    fn hardware_type(&self) -> HardwareType {
        HardwareType::AndroidKeystore
    }

    fn generate_attested_key(&self, spec: &AttestationKeySpec) -> Result<(), KeystoreError> {
        spec.validate()?;
        self.live.lock().unwrap().push(spec.alias.clone());
        Ok(())
    }

    fn certificate_chain(&self, alias: &str) -> Result<Vec<Vec<u8>>, KeystoreError> {
        if self.live.lock().unwrap().iter().any(|a| a == alias) {
            Ok(vec![ATTEST_EC.to_vec(), PLATFORM_RSA.to_vec()])
        } else {
            Err(KeystoreError::KeyNotFound {
                alias: alias.to_string(),
            })
        }
    }

    fn delete_key(&self, alias: &str) -> Result<(), KeystoreError> {
        self.live.lock().unwrap().retain(|a| a != alias);
        Ok(())
    }
}

/// Provider that tracks how many token requests overlap.
#[derive(Default)]
struct SlowProvider {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl IntegrityTokenProvider for SlowProvider {
    async fn is_available(&self) -> bool {
        true
    }

    async fn request_token(&self, _nonce: &str) -> Result<String, PlayIntegrityError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Err(PlayIntegrityError::token("Integrity API error (-16): CLOUD_PROJECT_NUMBER_IS_INVALID"))
    }
}

/// Provider whose token request never completes.
#[derive(Default)]
struct HangingProvider {
    started: Notify,
    released: Arc<AtomicBool>,
}

/// Flags the pending token request as dropped.
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl IntegrityTokenProvider for HangingProvider {
    async fn is_available(&self) -> bool {
        true
    }

    async fn request_token(&self, _nonce: &str) -> Result<String, PlayIntegrityError> {
        let _flag = ReleaseFlag(Arc::clone(&self.released));
        self.started.notify_one();
        std::future::pending().await
    }
}

/// Provider that panics mid-request.
struct PanickingProvider;

#[async_trait]
impl IntegrityTokenProvider for PanickingProvider {
    async fn is_available(&self) -> bool {
        true
    }

    async fn request_token(&self, _nonce: &str) -> Result<String, PlayIntegrityError> {
        panic!("integrity client crashed")
    }
}

/// Evidence source whose build metadata read panics.
struct BrokenEvidence;

impl EvidenceSource for BrokenEvidence {
    fn file_exists(&self, _path: &str) -> bool {
        false
    }

    fn is_package_installed(&self, _package: &str) -> bool {
        false
    }

    fn read_system_property(&self, _name: &str) -> Option<String> {
        None
    }

    fn read_kernel_cmdline(&self) -> Option<String> {
        None
    }

    fn build_info(&self) -> BuildInfo {
        panic!("build metadata unavailable")
    }

    fn signing_info(&self, package: &str) -> Result<SigningInfo, EvidenceError> {
        Err(EvidenceError::PackageNotFound {
            package: package.to_string(),
        })
    }
}

fn release_build() -> BuildInfo {
    BuildInfo {
        tags: Some("release-keys".into()),
        fingerprint: "google/husky/husky:14/AP1A.240305.019/11338300:user/release-keys".into(),
        display: "AP1A.240305.019".into(),
        sdk_int: 34,
    }
}

fn scanner_for(evidence: MemoryEvidence, keystore: Option<Arc<FakeKeystore>>) -> SecurityScanner {
    let keystore = keystore.map(|k| k as Arc<dyn AttestingKeystore>);
    SecurityScanner::with_parts(ScanConfig::default(), Arc::new(evidence), keystore).unwrap()
}

#[tokio::test]
async fn scenario_clean_release_device() {
    let evidence = MemoryEvidence::new()
        .with_build(release_build())
        .with_property("ro.boot.flash.locked", "1")
        .with_cmdline("androidboot.verifiedbootstate=green androidboot.flash.locked=1")
        .with_signing_info(
            "android",
            SigningInfo::SigningCertificates(vec![PLATFORM_RSA.to_vec()]),
        );
    let keystore = Arc::new(FakeKeystore::default());

    let status = scanner_for(evidence, Some(keystore.clone()))
        .scan()
        .await
        .unwrap();

    assert!(!status.root_status.is_rooted);
    assert_eq!(status.root_status.root_type, RootType::None);
    assert!(!status.root_status.is_custom_rom);
    assert_eq!(status.bootloader_status.state, BootloaderState::Locked);
    assert_eq!(status.rom_signature.signature_type, SignatureType::ReleaseKeys);
    assert!(status.rom_signature.is_valid);

    let attestation = status.key_attestation.unwrap();
    assert_eq!(attestation.security_level, SecurityLevel::TrustedEnvironment);
    assert_eq!(attestation.boot_state, "VERIFIED");
    assert_eq!(attestation.certificates.len(), 2);

    // attestation entries do not accumulate
    assert!(keystore.live.lock().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_magisk_directory() {
    let evidence = MemoryEvidence::new()
        .with_build(release_build())
        .with_file("/data/adb/magisk");

    let status = scanner_for(evidence, None).scan().await.unwrap();
    assert!(status.root_status.is_rooted);
    assert_eq!(status.root_status.root_type, RootType::Magisk);
}

#[tokio::test]
async fn scenario_flash_unlocked() {
    let evidence = MemoryEvidence::new()
        .with_build(release_build())
        .with_property("ro.boot.flash.locked", "0")
        .with_property("ro.boot.verifiedbootstate", "green")
        .with_property("ro.boot.veritymode", "enforcing");
    let keystore = Arc::new(FakeKeystore::default());

    let status = scanner_for(evidence, Some(keystore)).scan().await.unwrap();
    assert_eq!(status.bootloader_status.state, BootloaderState::Unlocked);
    let attestation = status.key_attestation.unwrap();
    assert_eq!(attestation.security_level, SecurityLevel::Software);
    assert!(!attestation.bootloader_locked);
}

#[tokio::test]
async fn unknown_bootloader_never_reports_guarantee() {
    let evidence = MemoryEvidence::new().with_build(release_build());
    let keystore = Arc::new(FakeKeystore::default());

    let status = scanner_for(evidence, Some(keystore)).scan().await.unwrap();
    let attestation = status.key_attestation.unwrap();
    assert_eq!(attestation.security_level, SecurityLevel::Unknown);
    assert_eq!(attestation.boot_state, "UNKNOWN");
}

#[tokio::test]
async fn old_platform_skips_attestation() {
    let evidence = MemoryEvidence::new().with_sdk(25);
    let keystore = Arc::new(FakeKeystore::default());

    let status = scanner_for(evidence, Some(keystore)).scan().await.unwrap();
    assert!(status.key_attestation.is_none());
}

#[tokio::test]
async fn panicking_evidence_read_fails_scan() {
    let scanner =
        SecurityScanner::with_parts(ScanConfig::default(), Arc::new(BrokenEvidence), None)
            .unwrap();

    let err = scanner.scan().await.unwrap_err();
    assert!(matches!(err, ScanError::ProbeFailed { probe: "root", .. }));
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("Security scan failed in root"));
}

#[tokio::test]
async fn integrity_failure_is_classified() {
    let provider = Arc::new(SlowProvider::default());
    let scanner = scanner_for(MemoryEvidence::new(), None).with_token_provider(provider);

    let status = scanner.scan().await.unwrap();
    assert_eq!(status.play_integrity.verdict, IntegrityVerdict::Unknown);
    assert_eq!(
        status.play_integrity.error_message.as_deref(),
        Some("Unavailable (No Backend)")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_are_serialized() {
    let provider = Arc::new(SlowProvider::default());
    let scanner = Arc::new(
        scanner_for(MemoryEvidence::new(), None).with_token_provider(provider.clone()),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move { scanner.scan().await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scan_exports_to_file() {
    let evidence = MemoryEvidence::new()
        .with_build(release_build())
        .with_package("me.weishu.kernelsu");
    let status = scanner_for(evidence, None).scan().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = write_export(&status, dir.path()).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(json["rootStatus"]["rootType"], "KERNELSU");
    assert_eq!(json["rootStatus"]["detections"].as_array().unwrap().len(), 5);
    assert_eq!(json["playIntegrity"]["error"], "Play Services unavailable");
    assert!(json["keyAttestation"].is_null());
    assert_eq!(
        serde_json::from_value::<ExportDocument>(json).unwrap(),
        ExportDocument::from_status(&status)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_scan_stops_integrity_request() {
    let provider = Arc::new(HangingProvider::default());
    let scanner = scanner_for(MemoryEvidence::new(), None).with_token_provider(provider.clone());

    let scan = tokio::spawn(async move { scanner.scan().await });
    provider.started.notified().await;
    scan.abort();
    assert!(scan.await.unwrap_err().is_cancelled());

    tokio::time::timeout(Duration::from_secs(5), async {
        while !provider.released.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("token request still running after the scan was dropped");
}

#[tokio::test]
async fn panicking_integrity_client_fails_scan() {
    let scanner = scanner_for(MemoryEvidence::new(), None)
        .with_token_provider(Arc::new(PanickingProvider));

    let err = scanner.scan().await.unwrap_err();
    assert!(matches!(err, ScanError::ProbeFailed { probe: "integrity", .. }));
    assert!(err.to_string().starts_with("Security scan failed in integrity"));
}

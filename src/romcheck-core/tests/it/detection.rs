//! Property-based tests for the detection probes.

use proptest::prelude::*;

use romcheck_core::bootloader::check_bootloader;
use romcheck_core::certificate::{sha1_fingerprint, sha256_fingerprint};
use romcheck_core::evidence::{BuildInfo, MemoryEvidence};
use romcheck_core::play_integrity::{classify_failure, MSG_NO_BACKEND};
use romcheck_core::root::{detect_root, KITSUNE_MARKER, MAGISK_PATHS, SU_PATHS};
use romcheck_core::signature::classify_signature;
use romcheck_core::{BootloaderState, IntegrityVerdict, RootType, SignatureType};

const ROOT_FILES: &[&str] = &[
    "/system/bin/su",
    "/system/xbin/su",
    "/sbin/su",
    "/data/local/su",
    "/vendor/bin/su",
    "/data/adb/magisk",
    "/data/adb/modules",
    "/data/adb/ksu",
    "/data/adb/kitsune",
];

const ROOT_PACKAGES: &[&str] = &[
    "com.topjohnwu.magisk",
    "io.github.huskydg.magisk",
    "me.weishu.kernelsu",
    "eu.chainfire.supersu",
];

const BOOT_PROPERTIES: &[&str] = &[
    "ro.boot.flash.locked",
    "ro.boot.verifiedbootstate",
    "sys.oem_unlock_allowed",
    "ro.boot.vbmeta.device_state",
    "ro.boot.veritymode",
    "ro.boot.warranty_bit",
];

/// Strategy for a device with a random subset of root artifacts.
fn rooted_device() -> impl Strategy<Value = (Vec<bool>, Vec<bool>, Option<String>)> {
    (
        prop::collection::vec(any::<bool>(), ROOT_FILES.len()),
        prop::collection::vec(any::<bool>(), ROOT_PACKAGES.len()),
        prop::option::of(prop::sample::select(vec![
            "release-keys".to_string(),
            "test-keys".to_string(),
            "dev-keys".to_string(),
        ])),
    )
}

/// Strategy for a property value, including values no method recognizes.
fn boot_value() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec![
        "0".to_string(),
        "1".to_string(),
        "2".to_string(),
        "green".to_string(),
        "ORANGE".to_string(),
        "locked".to_string(),
        "unlocked".to_string(),
        "enforcing".to_string(),
        "eio".to_string(),
        "logging".to_string(),
    ]))
}

fn build_device(files: &[bool], packages: &[bool], tags: Option<String>) -> MemoryEvidence {
    let mut evidence = MemoryEvidence::new().with_build(BuildInfo {
        tags,
        fingerprint: "vendor/device/device:14/UP1A/1:user/release-keys".into(),
        display: "UP1A.231005.007".into(),
        sdk_int: 34,
    });
    for (path, present) in ROOT_FILES.iter().zip(files) {
        if *present {
            evidence = evidence.with_file(*path);
        }
    }
    for (package, installed) in ROOT_PACKAGES.iter().zip(packages) {
        if *installed {
            evidence = evidence.with_package(*package);
        }
    }
    evidence
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Root detection
    // ========================================================================

    /// Five methods in fixed order; rooted is the OR of all of them.
    #[test]
    fn root_methods_shape((files, packages, tags) in rooted_device()) {
        let result = detect_root(&build_device(&files, &packages, tags));

        let names: Vec<&str> = result.methods.iter().map(|m| m.name.as_str()).collect();
        prop_assert_eq!(names, vec!["SU Binary", "Magisk", "KernelSU", "Root Apps", "Rom Signature"]);
        prop_assert_eq!(result.is_rooted, result.methods.iter().any(|m| m.detected));
        prop_assert!(result.methods.iter().all(|m| !m.details.is_empty()));
    }

    /// The Kitsune marker decides the variant regardless of anything else.
    #[test]
    fn kitsune_marker_precedence((files, packages, tags) in rooted_device()) {
        let evidence = build_device(&files, &packages, tags).with_file(KITSUNE_MARKER);
        prop_assert_eq!(detect_root(&evidence).root_type, RootType::Kitsune);
    }

    /// NONE only when no root tooling was seen.
    #[test]
    fn root_type_none_without_tooling((files, packages, tags) in rooted_device()) {
        let result = detect_root(&build_device(&files, &packages, tags));
        let tooling = result.methods[..4].iter().any(|m| m.detected)
            || files[ROOT_FILES.len() - 1];
        prop_assert_eq!(result.root_type == RootType::None, !tooling);
    }

    /// Any su path or Magisk directory roots the device.
    #[test]
    fn single_artifact_roots(index in 0usize..(SU_PATHS.len() + MAGISK_PATHS.len())) {
        let path = SU_PATHS.iter().chain(MAGISK_PATHS).nth(index).copied().unwrap_or_default();
        let result = detect_root(&MemoryEvidence::new().with_file(path));
        prop_assert!(result.is_rooted);
        prop_assert_ne!(result.root_type, RootType::None);
    }

    // ========================================================================
    // Bootloader
    // ========================================================================

    /// Only read signals are logged, and the first conclusive one ends the chain.
    #[test]
    fn bootloader_stops_on_first_match(values in prop::collection::vec(boot_value(), BOOT_PROPERTIES.len())) {
        let mut evidence = MemoryEvidence::new();
        for (name, value) in BOOT_PROPERTIES.iter().zip(&values) {
            if let Some(value) = value {
                evidence = evidence.with_property(*name, value.clone());
            }
        }
        let result = check_bootloader(&evidence);

        let methods = result.details.lines().nth(2).unwrap_or_default();
        let methods = methods.trim_start_matches("Methods: ");
        let logged = if methods.is_empty() { 0 } else { methods.split(", ").count() };
        let readable = values.iter().filter(|v| v.is_some()).count();
        prop_assert!(logged <= readable);

        if result.state == BootloaderState::Unknown {
            prop_assert_eq!(logged, readable);
        }
        let header = format!("State: {}\n", result.state);
        prop_assert!(result.details.starts_with(&header));
    }

    /// A conclusive flash.locked wins over everything after it.
    #[test]
    fn flash_locked_wins(locked in any::<bool>(), others in prop::collection::vec(boot_value(), BOOT_PROPERTIES.len() - 1)) {
        let mut evidence = MemoryEvidence::new()
            .with_property("ro.boot.flash.locked", if locked { "1" } else { "0" })
            .with_cmdline("androidboot.flash.locked=2");
        for (name, value) in BOOT_PROPERTIES[1..].iter().zip(&others) {
            if let Some(value) = value {
                evidence = evidence.with_property(*name, value.clone());
            }
        }
        let result = check_bootloader(&evidence);
        let expected = if locked { BootloaderState::Locked } else { BootloaderState::Unlocked };
        prop_assert_eq!(result.state, expected);
        let entry = format!("Methods: flash.locked={}", u8::from(locked));
        prop_assert!(result.details.ends_with(&entry));
    }

    // ========================================================================
    // Signatures
    // ========================================================================

    /// Fingerprints are colon-separated upper-case pairs and stable.
    #[test]
    fn fingerprint_format(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        let sha256 = sha256_fingerprint(&data);
        prop_assert_eq!(sha256.len(), 32 * 3 - 1);
        prop_assert_eq!(sha256.split(':').count(), 32);
        prop_assert!(sha256.split(':').all(|pair| pair.len() == 2
            && pair.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))));
        prop_assert_eq!(&sha256, &sha256_fingerprint(&data));

        let sha1 = sha1_fingerprint(&data);
        prop_assert_eq!(sha1.split(':').count(), 20);
    }

    /// release-keys wins regardless of certificates.
    #[test]
    fn release_keys_precedence(prefix in "[a-z,-]{0,12}", count in 0usize..4) {
        let tags = format!("{prefix}release-keys");
        prop_assert_eq!(classify_signature(&tags, count), SignatureType::ReleaseKeys);
    }

    // ========================================================================
    // Integrity failures
    // ========================================================================

    /// "-16" anywhere means no backend.
    #[test]
    fn no_backend_classification(prefix in "[ -~]{0,20}", suffix in "[ -~]{0,20}") {
        let result = classify_failure(&format!("{prefix}-16{suffix}"));
        prop_assert_eq!(result.verdict, IntegrityVerdict::Unknown);
        prop_assert_eq!(result.error_message.as_deref(), Some(MSG_NO_BACKEND));
    }

    /// Other messages fail verbatim.
    #[test]
    fn other_failures_verbatim(message in "[A-Za-z ]{1,40}") {
        prop_assume!(!message.contains("CLOUD_PROJECT_NUMBER"));
        let result = classify_failure(&message);
        prop_assert_eq!(result.verdict, IntegrityVerdict::Failed);
        prop_assert_eq!(result.error_message.as_deref(), Some(message.as_str()));
    }
}

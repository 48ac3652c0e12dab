//! Root detection.
//!
//! Five independent techniques run unconditionally and in a fixed order, so
//! the resulting method list always has the same shape. The techniques
//! overlap on purpose: the root-app check repeats package lookups done by
//! the Magisk and KernelSU checks.

use tracing::{debug, info};

use crate::evidence::EvidenceSource;
use crate::types::{DetectionMethod, RootDetectionResult, RootType};

/// Well-known locations of a `su` binary.
pub const SU_PATHS: &[&str] = &[
    "/system/bin/su",
    "/system/xbin/su",
    "/sbin/su",
    "/data/local/su",
    "/vendor/bin/su",
];

/// Magisk data directories.
pub const MAGISK_PATHS: &[&str] = &["/data/adb/magisk", "/data/adb/modules"];

/// Magisk manager packages (upstream and the Kitsune/Delta fork).
pub const MAGISK_PACKAGES: &[&str] = &["com.topjohnwu.magisk", "io.github.huskydg.magisk"];

/// KernelSU data directory.
pub const KERNELSU_PATH: &str = "/data/adb/ksu";

/// KernelSU manager package.
pub const KERNELSU_PACKAGE: &str = "me.weishu.kernelsu";

/// SuperSU package.
pub const SUPERSU_PACKAGE: &str = "eu.chainfire.supersu";

/// Root manager apps.
pub const ROOT_APP_PACKAGES: &[&str] = &[
    "com.topjohnwu.magisk",
    "me.weishu.kernelsu",
    "eu.chainfire.supersu",
];

/// Marker left by Kitsune Mask.
pub const KITSUNE_MARKER: &str = "/data/adb/kitsune";

/// Build keywords of common custom ROMs.
pub const CUSTOM_ROM_KEYWORDS: &[&str] = &["lineage", "aosp", "pixel"];

/// Technique names, in execution order.
pub mod method {
    /// `su` binary on disk.
    pub const SU_BINARY: &str = "SU Binary";
    /// Magisk directories or manager.
    pub const MAGISK: &str = "Magisk";
    /// KernelSU directory or manager.
    pub const KERNELSU: &str = "KernelSU";
    /// Root manager apps installed.
    pub const ROOT_APPS: &str = "Root Apps";
    /// OS image signed with test keys.
    pub const ROM_SIGNATURE: &str = "Rom Signature";
}

fn found(detected: bool) -> &'static str {
    if detected {
        "Found"
    } else {
        "Not found"
    }
}

fn detected(detected: bool) -> &'static str {
    if detected {
        "Detected"
    } else {
        "Not detected"
    }
}

fn any_file(evidence: &dyn EvidenceSource, paths: &[&str]) -> bool {
    paths.iter().any(|path| evidence.file_exists(path))
}

fn any_package(evidence: &dyn EvidenceSource, packages: &[&str]) -> bool {
    packages.iter().any(|pkg| evidence.is_package_installed(pkg))
}

/// Run every root-detection technique and classify the result.
pub fn detect_root(evidence: &dyn EvidenceSource) -> RootDetectionResult {
    let build = evidence.build_info();

    let su_binary = any_file(evidence, SU_PATHS);
    let magisk = any_file(evidence, MAGISK_PATHS) || any_package(evidence, MAGISK_PACKAGES);
    let kernelsu =
        evidence.file_exists(KERNELSU_PATH) || evidence.is_package_installed(KERNELSU_PACKAGE);
    let root_apps = any_package(evidence, ROOT_APP_PACKAGES);
    let test_keys = build
        .tags
        .as_deref()
        .is_some_and(|tags| tags.contains("test-keys"));

    let methods = vec![
        DetectionMethod::new(method::SU_BINARY, su_binary, found(su_binary)),
        DetectionMethod::new(method::MAGISK, magisk, detected(magisk)),
        DetectionMethod::new(method::KERNELSU, kernelsu, detected(kernelsu)),
        DetectionMethod::new(method::ROOT_APPS, root_apps, found(root_apps)),
        DetectionMethod::new(
            method::ROM_SIGNATURE,
            test_keys,
            format!("Build TAGS: {}", build.tags.as_deref().unwrap_or("unknown")),
        ),
    ];

    let root_type = if evidence.file_exists(KITSUNE_MARKER) {
        RootType::Kitsune
    } else if magisk {
        RootType::Magisk
    } else if kernelsu {
        RootType::KernelSu
    } else if evidence.is_package_installed(SUPERSU_PACKAGE) {
        RootType::SuperSu
    } else if su_binary || root_apps {
        RootType::Unknown
    } else {
        RootType::None
    };

    let fingerprint = build.fingerprint.to_lowercase();
    let display = build.display.to_lowercase();
    let is_custom_rom = test_keys
        || CUSTOM_ROM_KEYWORDS
            .iter()
            .any(|kw| fingerprint.contains(kw) || display.contains(kw));

    let is_rooted = methods.iter().any(|m| m.detected);

    for m in &methods {
        debug!(method = %m.name, detected = m.detected, details = %m.details, "root check");
    }
    info!(is_rooted, root_type = %root_type, is_custom_rom, "root detection complete");

    RootDetectionResult {
        is_rooted,
        root_type,
        is_custom_rom,
        methods,
    }
}

//! In-memory evidence for fakes and captured device states.

use std::collections::{HashMap, HashSet};

use super::{BuildInfo, EvidenceError, EvidenceSource, SigningInfo};

/// An evidence source whose answers are fixed up front.
///
/// Everything not set reads as absent: no files, no packages, no
/// properties, no kernel command line, and packages without signing info
/// fail to query.
///
/// ```rust
/// use romcheck_core::evidence::{EvidenceSource, MemoryEvidence};
///
/// let evidence = MemoryEvidence::new()
///     .with_file("/data/adb/magisk")
///     .with_property("ro.boot.flash.locked", "0")
///     .with_tags("release-keys");
///
/// assert!(evidence.file_exists("/data/adb/magisk"));
/// assert_eq!(evidence.read_system_property("ro.boot.flash.locked").as_deref(), Some("0"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryEvidence {
    files: HashSet<String>,
    packages: HashSet<String>,
    properties: HashMap<String, String>,
    cmdline: Option<String>,
    build: BuildInfo,
    signing: HashMap<String, SigningInfo>,
}

impl MemoryEvidence {
    /// Empty evidence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as existing.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.files.insert(path.into());
        self
    }

    /// Mark `package` as installed.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.packages.insert(package.into());
        self
    }

    /// Set a system property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set the kernel command line.
    #[must_use]
    pub fn with_cmdline(mut self, cmdline: impl Into<String>) -> Self {
        self.cmdline = Some(cmdline.into());
        self
    }

    /// Set the build metadata.
    #[must_use]
    pub fn with_build(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    /// Set the build tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.build.tags = Some(tags.into());
        self
    }

    /// Set the platform API level.
    #[must_use]
    pub fn with_sdk(mut self, sdk_int: u32) -> Self {
        self.build.sdk_int = sdk_int;
        self
    }

    /// Set the signing certificates returned for `package`.
    #[must_use]
    pub fn with_signing_info(mut self, package: impl Into<String>, info: SigningInfo) -> Self {
        self.signing.insert(package.into(), info);
        self
    }
}

impl EvidenceSource for MemoryEvidence {
    fn file_exists(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    fn is_package_installed(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    fn read_system_property(&self, name: &str) -> Option<String> {
        // an empty value reads as unset, as getprop reports it
        self.properties
            .get(name)
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }

    fn read_kernel_cmdline(&self) -> Option<String> {
        self.cmdline.clone()
    }

    fn build_info(&self) -> BuildInfo {
        self.build.clone()
    }

    fn signing_info(&self, package: &str) -> Result<SigningInfo, EvidenceError> {
        self.signing
            .get(package)
            .cloned()
            .ok_or_else(|| EvidenceError::PackageNotFound {
                package: package.to_string(),
            })
    }
}

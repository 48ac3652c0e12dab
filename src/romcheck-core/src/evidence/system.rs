//! Live evidence from the running system.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use super::{BuildInfo, EvidenceError, EvidenceSource, PackageRegistry, SigningInfo};

const PROC_CMDLINE: &str = "/proc/cmdline";
const GETPROP: &str = "getprop";

/// Evidence read from the file system, `getprop` and `/proc/cmdline`.
pub struct SystemEvidence {
    root: Option<PathBuf>,
    cmdline_path: PathBuf,
    packages: Box<dyn PackageRegistry>,
}

impl SystemEvidence {
    /// Evidence from the live system, with `pm` for package queries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Box::new(ShellPackageRegistry))
    }

    /// Evidence from the live system with a custom package registry.
    #[must_use]
    pub fn with_registry(packages: Box<dyn PackageRegistry>) -> Self {
        Self {
            root: None,
            cmdline_path: PathBuf::from(PROC_CMDLINE),
            packages,
        }
    }

    /// Resolve absolute paths below `root` instead of `/`.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.cmdline_path = root.join(PROC_CMDLINE.trim_start_matches('/'));
        self.root = Some(root);
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl Default for SystemEvidence {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemEvidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemEvidence")
            .field("root", &self.root)
            .field("cmdline_path", &self.cmdline_path)
            .finish_non_exhaustive()
    }
}

impl EvidenceSource for SystemEvidence {
    fn file_exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn is_package_installed(&self, package: &str) -> bool {
        self.packages.is_installed(package)
    }

    fn read_system_property(&self, name: &str) -> Option<String> {
        let output = match Command::new(GETPROP)
            .arg(name)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                trace!(property = name, "getprop unavailable: {}", e);
                return None;
            },
        };

        // getprop prints an empty line for unset properties
        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = stdout.lines().next().map(str::trim).unwrap_or_default();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn read_kernel_cmdline(&self) -> Option<String> {
        match std::fs::read_to_string(&self.cmdline_path) {
            Ok(cmdline) => Some(cmdline),
            Err(e) => {
                debug!(path = %self.cmdline_path.display(), "kernel cmdline unreadable: {}", e);
                None
            },
        }
    }

    fn build_info(&self) -> BuildInfo {
        BuildInfo {
            tags: self.read_system_property("ro.build.tags"),
            fingerprint: self
                .read_system_property("ro.build.fingerprint")
                .unwrap_or_default(),
            display: self
                .read_system_property("ro.build.display.id")
                .unwrap_or_default(),
            sdk_int: self
                .read_system_property("ro.build.version.sdk")
                .and_then(|sdk| sdk.parse().ok())
                .unwrap_or(0),
        }
    }

    fn signing_info(&self, package: &str) -> Result<SigningInfo, EvidenceError> {
        let sdk_int = self.build_info().sdk_int;
        self.packages.signing_info(package, sdk_int)
    }
}

/// Package queries through the `pm` shell command.
///
/// `pm` cannot return signing certificates, so
/// [`signing_info`](PackageRegistry::signing_info) always reports the query
/// as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellPackageRegistry;

impl PackageRegistry for ShellPackageRegistry {
    fn is_installed(&self, package: &str) -> bool {
        let Ok(output) = Command::new("pm")
            .args(["path", package])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        else {
            return false;
        };

        output.status.success()
            && String::from_utf8_lossy(&output.stdout)
                .lines()
                .any(|line| line.starts_with("package:"))
    }

    fn signing_info(&self, package: &str, _sdk_int: u32) -> Result<SigningInfo, EvidenceError> {
        Err(EvidenceError::unsupported(format!(
            "signing certificates of {package} need PackageManager"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRegistry;

    impl PackageRegistry for FixedRegistry {
        fn is_installed(&self, package: &str) -> bool {
            package == "me.weishu.kernelsu"
        }

        fn signing_info(&self, _package: &str, sdk_int: u32) -> Result<SigningInfo, EvidenceError> {
            if sdk_int >= super::super::SIGNING_INFO_MIN_SDK {
                Ok(SigningInfo::SigningCertificates(vec![vec![1]]))
            } else {
                Ok(SigningInfo::LegacySignatures(vec![vec![1]]))
            }
        }
    }

    #[test]
    fn test_file_exists_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/adb/magisk")).unwrap();

        let evidence = SystemEvidence::new().with_root(dir.path());
        assert!(evidence.file_exists("/data/adb/magisk"));
        assert!(!evidence.file_exists("/data/adb/ksu"));
    }

    #[test]
    fn test_kernel_cmdline_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let evidence = SystemEvidence::new().with_root(dir.path());
        assert!(evidence.read_kernel_cmdline().is_none());

        std::fs::create_dir_all(dir.path().join("proc")).unwrap();
        std::fs::write(
            dir.path().join("proc/cmdline"),
            "console=ttyMSM0 androidboot.verifiedbootstate=orange\n",
        )
        .unwrap();
        let cmdline = evidence.read_kernel_cmdline().unwrap();
        assert!(cmdline.contains("verifiedbootstate=orange"));
    }

    #[cfg(not(target_os = "android"))]
    #[test]
    fn test_missing_getprop_reads_as_unset() {
        let evidence = SystemEvidence::new();
        assert!(evidence.read_system_property("ro.boot.flash.locked").is_none());
        let build = evidence.build_info();
        assert!(build.tags.is_none());
        assert_eq!(build.sdk_int, 0);
    }

    #[test]
    fn test_custom_registry() {
        let evidence = SystemEvidence::with_registry(Box::new(FixedRegistry));
        assert!(evidence.is_package_installed("me.weishu.kernelsu"));
        assert!(!evidence.is_package_installed("com.topjohnwu.magisk"));
        assert_eq!(
            evidence.signing_certificates("android").unwrap(),
            vec![vec![1]]
        );
    }

    #[test]
    fn test_shell_registry_has_no_signing_info() {
        assert!(matches!(
            ShellPackageRegistry.signing_info("android", 34),
            Err(EvidenceError::Unsupported { .. })
        ));
    }
}

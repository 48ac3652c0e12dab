//! Bootloader lock state and verified boot color.
//!
//! Lock state comes from a chain of seven signals tried in order; the first
//! conclusive one wins and later signals are not read. Every signal that was
//! read lands in an audit log as `key=value`, conclusive or not. The verified
//! boot color is read separately from the kernel command line.

use tracing::{debug, info};

use crate::evidence::EvidenceSource;
use crate::types::{BootloaderResult, BootloaderState, VerifiedBootState};

/// Kernel command line markers, checked in order.
const CMDLINE_FLASH_LOCKED: &[(&str, &str, BootloaderState)] = &[
    ("androidboot.flash.locked=1", "1", BootloaderState::Locked),
    ("androidboot.flash.locked=0", "0", BootloaderState::Unlocked),
];

/// How a property value maps to a lock state.
#[derive(Debug, Clone, Copy)]
struct PropertyCheck {
    /// Audit log key.
    key: &'static str,
    /// System property name.
    property: &'static str,
    /// Compare lower-cased.
    case_insensitive: bool,
    locked: &'static [&'static str],
    unlocked: &'static [&'static str],
}

impl PropertyCheck {
    fn classify(&self, value: &str) -> BootloaderState {
        if self.locked.contains(&value) {
            BootloaderState::Locked
        } else if self.unlocked.contains(&value) {
            BootloaderState::Unlocked
        } else {
            BootloaderState::Unknown
        }
    }
}

/// Property-based methods 1 through 6, in order.
const PROPERTY_CHECKS: &[PropertyCheck] = &[
    PropertyCheck {
        key: "flash.locked",
        property: "ro.boot.flash.locked",
        case_insensitive: false,
        locked: &["1"],
        unlocked: &["0"],
    },
    PropertyCheck {
        key: "vbstate",
        property: "ro.boot.verifiedbootstate",
        case_insensitive: true,
        locked: &["green"],
        unlocked: &["orange", "yellow", "red"],
    },
    PropertyCheck {
        key: "oem_unlock",
        property: "sys.oem_unlock_allowed",
        case_insensitive: false,
        locked: &["0"],
        unlocked: &["1"],
    },
    PropertyCheck {
        key: "vbmeta",
        property: "ro.boot.vbmeta.device_state",
        case_insensitive: true,
        locked: &["locked"],
        unlocked: &["unlocked"],
    },
    PropertyCheck {
        key: "veritymode",
        property: "ro.boot.veritymode",
        case_insensitive: true,
        locked: &["enforcing"],
        unlocked: &["disabled", "eio"],
    },
    PropertyCheck {
        key: "warranty",
        property: "ro.boot.warranty_bit",
        case_insensitive: false,
        locked: &["0"],
        unlocked: &["1"],
    },
];

/// Determine the bootloader lock state and verified boot color.
pub fn check_bootloader(evidence: &dyn EvidenceSource) -> BootloaderResult {
    let mut state = BootloaderState::Unknown;
    let mut log: Vec<String> = Vec::new();

    for check in PROPERTY_CHECKS {
        let Some(raw) = evidence.read_system_property(check.property) else {
            continue;
        };
        let value = if check.case_insensitive {
            raw.to_lowercase()
        } else {
            raw
        };
        log.push(format!("{}={}", check.key, value));
        state = check.classify(&value);
        if state != BootloaderState::Unknown {
            debug!(method = check.key, %state, "bootloader state resolved");
            break;
        }
    }

    let cmdline = evidence.read_kernel_cmdline();

    if state == BootloaderState::Unknown {
        if let Some((value, locked)) = cmdline.as_deref().and_then(cmdline_flash_locked) {
            log.push(format!("cmdline={value}"));
            state = locked;
        }
    }

    let verified_boot_state = cmdline
        .as_deref()
        .map(verified_boot_color)
        .unwrap_or(VerifiedBootState::Unknown);

    let details = format!(
        "State: {}\nVB: {}\nMethods: {}",
        state,
        verified_boot_state,
        log.join(", ")
    );
    info!(%state, %verified_boot_state, methods = log.len(), "bootloader check complete");

    BootloaderResult {
        state,
        verified_boot_state,
        details,
    }
}

/// Lock state from a substring scan of the kernel command line.
///
/// `=1` is looked for first, so a command line carrying both wins as locked.
fn cmdline_flash_locked(cmdline: &str) -> Option<(&'static str, BootloaderState)> {
    CMDLINE_FLASH_LOCKED
        .iter()
        .find(|(needle, _, _)| cmdline.contains(needle))
        .map(|(_, value, state)| (*value, *state))
}

/// Verified boot color from a substring scan of the kernel command line.
pub fn verified_boot_color(cmdline: &str) -> VerifiedBootState {
    const COLORS: &[(&str, VerifiedBootState)] = &[
        ("verifiedbootstate=green", VerifiedBootState::Green),
        ("verifiedbootstate=yellow", VerifiedBootState::Yellow),
        ("verifiedbootstate=orange", VerifiedBootState::Orange),
        ("verifiedbootstate=red", VerifiedBootState::Red),
    ];
    COLORS
        .iter()
        .find(|(needle, _)| cmdline.contains(needle))
        .map_or(VerifiedBootState::Unknown, |(_, color)| *color)
}

//! # romcheck-core
//!
//! Device integrity inspection: decides whether a device's bootloader, OS
//! signature and superuser tooling are still in their vendor-issued state,
//! and combines that with a remote integrity verdict.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SecurityScanner                           │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │           RemoteIntegrityClient                   │      │
//! │  │   (token provider, optional verifier backend)    │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │ detect_root  │  │ bootloader   │  │ signature    │      │
//! │  │ (5 methods)  │  │ (7 fallbacks)│  │ (X.509)      │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │           perform_key_attestation                 │      │
//! │  │     (romcheck-keystore, bootloader-derived level) │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │                 EvidenceSource                    │      │
//! │  │   (files, packages, properties, /proc/cmdline)   │      │
//! │  └──────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Properties
//!
//! - **Stateless**: every scan re-derives each verdict from live evidence
//! - **Never fatal**: missing evidence becomes an UNKNOWN or negative value
//! - **No false guarantees**: an undetermined bootloader never yields a
//!   hardware security level

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::missing_panics_doc)] // Panic documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod attestation;
pub mod bootloader;
pub mod certificate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod export;
mod http;
pub mod play_integrity;
pub mod root;
pub mod signature;
pub mod types;

pub use attestation::perform_key_attestation;
pub use bootloader::check_bootloader;
pub use config::ScanConfig;
pub use engine::SecurityScanner;
pub use error::{EvidenceError, PlayIntegrityError, ScanError};
pub use evidence::{EvidenceSource, MemoryEvidence, SystemEvidence};
pub use export::{write_export, ExportDocument};
pub use play_integrity::{
    HttpTokenVerifier, IntegrityTokenProvider, RemoteIntegrityClient, TokenVerifier,
};
pub use root::detect_root;
pub use signature::analyze_rom_signature;
pub use types::{
    BootloaderResult, BootloaderState, CertificateInfo, DetectionMethod, IntegrityVerdict,
    KeyAttestationResult, PlayIntegrityResult, RomSignatureResult, RootDetectionResult, RootType,
    SecurityLevel, SecurityStatus, SignatureType, VerifiedBootState,
};

//! # romcheck-keystore
//!
//! Hardware key store access for key attestation.
//!
//! A scan asks the platform key store to generate a fresh EC key pair whose
//! leaf certificate carries an attestation extension bound to a challenge,
//! then reads the certificate chain back.
//!
//! ## Platform Support
//!
//! | Platform | Backend | Attestation |
//! |----------|---------|-------------|
//! | Android | Keystore/StrongBox (JNI) | Key attestation chain |
//! | Everything else | none | unavailable |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use romcheck_keystore::{create_platform_keystore, AttestationKeySpec};
//!
//! let store = create_platform_keystore()?;
//! let spec = AttestationKeySpec::new("attest_1700000000000", b"ROMChecker".to_vec());
//! store.generate_attested_key(&spec)?;
//! let chain = store.certificate_chain(&spec.alias)?;
//! store.delete_key(&spec.alias)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type

mod error;
mod keystore;
mod types;

/// Platform-specific key store backends.
pub mod platform;

pub use error::KeystoreError;
pub use keystore::{AttestationKeySpec, AttestingKeystore};
pub use types::{HardwareType, KeyDigest};

pub use platform::{create_platform_keystore, detect_capabilities, KeystoreCapabilities};

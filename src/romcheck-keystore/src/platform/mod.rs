//! Platform-specific key store backends.
//!
//! - Android: Keystore/StrongBox via JNI (feature `android`)
//! - Everything else: no attestation-capable key store

#[cfg(all(target_os = "android", feature = "android"))]
pub mod android;

mod factory;

pub use factory::{create_platform_keystore, detect_capabilities, KeystoreCapabilities};

#[cfg(all(target_os = "android", feature = "android"))]
pub use android::AndroidKeystore;

//! # romcheck-ffi
//!
//! C-compatible FFI interface for the romcheck scan engine.
//!
//! This crate provides a stable C ABI, plus JNI bindings on Android, so a
//! host application can run a device integrity scan and read the verdict
//! as JSON.
//!
//! ## Usage
//!
//! ```c
//! #include "romcheck.h"
//!
//! int main() {
//!     RomcheckHandle* handle = romcheck_init();
//!     if (!handle) {
//!         return 1;
//!     }
//!
//!     uint8_t* status_json = NULL;
//!     size_t status_len = 0;
//!
//!     if (romcheck_scan(handle, &status_json, &status_len) == 0) {
//!         // Parse SecurityStatus JSON
//!         // ...
//!         romcheck_free(status_json);
//!     }
//!
//!     romcheck_destroy(handle);
//!     return 0;
//! }
//! ```

#![allow(clippy::missing_safety_doc)] // FFI functions are inherently unsafe

use std::ffi::{c_void, CStr};
use std::ptr;
use std::sync::Arc;

use romcheck_core::{ExportDocument, IntegrityTokenProvider, ScanConfig, SecurityScanner};
use tokio::runtime::Runtime;

#[cfg(all(target_os = "android", feature = "android"))]
mod android;

/// Opaque handle to a scanner instance.
#[repr(C)]
pub struct RomcheckHandle {
    runtime: Runtime,
    scanner: Arc<SecurityScanner>,
}

/// Error codes returned by FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomcheckError {
    /// Success.
    Success = 0,
    /// Invalid argument.
    InvalidArgument = -1,
    /// Initialization failed.
    InitializationFailed = -2,
    /// Scan failed.
    ScanFailed = -3,
    /// Serialization error.
    SerializationError = -4,
    /// Internal error.
    InternalError = -99,
}

/// Install the platform log sink once per process.
pub(crate) fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("ROMCheck"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_env("ROMCHECK_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        // A host that already installed a subscriber keeps it.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

/// Build a handle around a scanner created from `config`.
pub(crate) fn create_handle(
    config: ScanConfig,
    provider: Option<Arc<dyn IntegrityTokenProvider>>,
) -> Option<RomcheckHandle> {
    let runtime = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {}", e);
            return None;
        },
    };

    let mut scanner = match SecurityScanner::with_config(config) {
        Ok(scanner) => scanner,
        Err(e) => {
            tracing::error!("Failed to initialize scanner: {}", e);
            return None;
        },
    };
    if let Some(provider) = provider {
        scanner = scanner.with_token_provider(provider);
    }

    Some(RomcheckHandle {
        runtime,
        scanner: Arc::new(scanner),
    })
}

/// Copy `bytes` into a `malloc`ed buffer owned by the caller.
unsafe fn write_out(bytes: &[u8], out_data: *mut *mut u8, out_len: *mut usize) -> i32 {
    let len = bytes.len();
    let ptr = libc::malloc(len.max(1)) as *mut u8;
    if ptr.is_null() {
        return RomcheckError::InternalError as i32;
    }

    ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, len);

    *out_data = ptr;
    *out_len = len;

    RomcheckError::Success as i32
}

/// Initialize a scanner with default configuration.
///
/// Returns a handle that must be passed to all other functions.
/// Returns NULL on failure.
///
/// # Safety
///
/// The returned handle must be freed with `romcheck_destroy`.
#[no_mangle]
pub extern "C" fn romcheck_init() -> *mut RomcheckHandle {
    init_logging();

    match create_handle(ScanConfig::default(), None) {
        Some(handle) => Box::into_raw(Box::new(handle)),
        None => ptr::null_mut(),
    }
}

/// Initialize a scanner that decodes integrity tokens at `endpoint`.
///
/// Returns NULL on failure, including an endpoint that is not an HTTP URL.
///
/// # Safety
///
/// `endpoint` must be a valid null-terminated string. The returned handle
/// must be freed with `romcheck_destroy`.
#[no_mangle]
pub unsafe extern "C" fn romcheck_init_with_verifier(
    endpoint: *const libc::c_char,
) -> *mut RomcheckHandle {
    init_logging();

    if endpoint.is_null() {
        return ptr::null_mut();
    }
    let endpoint = match CStr::from_ptr(endpoint).to_str() {
        Ok(s) => s.to_string(),
        Err(_) => return ptr::null_mut(),
    };

    let config = ScanConfig {
        verifier_endpoint: Some(endpoint),
        ..ScanConfig::default()
    };

    match create_handle(config, None) {
        Some(handle) => Box::into_raw(Box::new(handle)),
        None => ptr::null_mut(),
    }
}

/// Run a full scan and return the `SecurityStatus` as JSON.
///
/// # Arguments
///
/// * `handle` - Handle from `romcheck_init`
/// * `status_data` - Output pointer for the JSON bytes (caller must free with `romcheck_free`)
/// * `status_len` - Output pointer for the JSON length
///
/// # Returns
///
/// 0 on success, negative error code on failure.
///
/// # Safety
///
/// - `handle` must be a valid handle from `romcheck_init`
/// - `status_data` and `status_len` must be valid pointers
#[no_mangle]
pub unsafe extern "C" fn romcheck_scan(
    handle: *mut RomcheckHandle,
    status_data: *mut *mut u8,
    status_len: *mut usize,
) -> i32 {
    if handle.is_null() || status_data.is_null() || status_len.is_null() {
        return RomcheckError::InvalidArgument as i32;
    }

    let handle = &*handle;

    let status = match handle.runtime.block_on(handle.scanner.scan()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            return RomcheckError::ScanFailed as i32;
        },
    };

    let bytes = match serde_json::to_vec(&status) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to serialize status: {}", e);
            return RomcheckError::SerializationError as i32;
        },
    };

    write_out(&bytes, status_data, status_len)
}

/// Run a full scan and return the export summary as pretty-printed JSON.
///
/// # Safety
///
/// Same requirements as `romcheck_scan`.
#[no_mangle]
pub unsafe extern "C" fn romcheck_scan_summary(
    handle: *mut RomcheckHandle,
    summary_data: *mut *mut u8,
    summary_len: *mut usize,
) -> i32 {
    if handle.is_null() || summary_data.is_null() || summary_len.is_null() {
        return RomcheckError::InvalidArgument as i32;
    }

    let handle = &*handle;

    let status = match handle.runtime.block_on(handle.scanner.scan()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            return RomcheckError::ScanFailed as i32;
        },
    };

    let json = match ExportDocument::from_status(&status).to_json_pretty() {
        Ok(j) => j,
        Err(e) => {
            tracing::error!("Failed to serialize summary: {}", e);
            return RomcheckError::SerializationError as i32;
        },
    };

    write_out(json.as_bytes(), summary_data, summary_len)
}

/// Free memory allocated by romcheck functions.
///
/// # Safety
///
/// `data` must be a pointer returned by a romcheck function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn romcheck_free(data: *mut c_void) {
    if !data.is_null() {
        libc::free(data);
    }
}

/// Destroy the handle and release resources.
///
/// # Safety
///
/// `handle` must be a valid handle from `romcheck_init`.
/// After this call, the handle is invalid and must not be used.
#[no_mangle]
pub unsafe extern "C" fn romcheck_destroy(handle: *mut RomcheckHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Get the library version.
///
/// Returns a static string with the version number.
#[no_mangle]
pub extern "C" fn romcheck_version() -> *const libc::c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const libc::c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_nul_terminated() {
        let version = unsafe { CStr::from_ptr(romcheck_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_null_arguments_rejected() {
        let mut data: *mut u8 = ptr::null_mut();
        let mut len = 0usize;
        let code = unsafe { romcheck_scan(ptr::null_mut(), &mut data, &mut len) };
        assert_eq!(code, RomcheckError::InvalidArgument as i32);

        let code = unsafe { romcheck_scan_summary(ptr::null_mut(), &mut data, &mut len) };
        assert_eq!(code, RomcheckError::InvalidArgument as i32);
        assert!(data.is_null());
    }

    #[test]
    fn test_invalid_verifier_endpoint() {
        let endpoint = std::ffi::CString::new("ftp://verifier.invalid").unwrap();
        let handle = unsafe { romcheck_init_with_verifier(endpoint.as_ptr()) };
        assert!(handle.is_null());
    }

    #[test]
    fn test_scan_round_trip() {
        let handle = romcheck_init();
        assert!(!handle.is_null());

        let mut data: *mut u8 = ptr::null_mut();
        let mut len = 0usize;
        let code = unsafe { romcheck_scan_summary(handle, &mut data, &mut len) };
        assert_eq!(code, RomcheckError::Success as i32);

        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        let doc: ExportDocument = serde_json::from_slice(bytes).unwrap();
        assert_eq!(doc.root_status.detections.len(), 5);

        unsafe {
            romcheck_free(data.cast());
            romcheck_destroy(handle);
        }
    }

    #[test]
    fn test_destroy_null_is_noop() {
        unsafe { romcheck_destroy(ptr::null_mut()) };
    }
}

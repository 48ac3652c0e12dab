//! Android JNI bindings for `io.romcheck.RomCheck`.
//!
//! The Play Integrity client lives in the Java layer, so integrity tokens
//! are requested through a callback object implementing
//! `io.romcheck.IntegrityTokenProvider`:
//!
//! ```java
//! interface IntegrityTokenProvider {
//!     boolean isAvailable();
//!     String requestToken(String nonce) throws Exception;
//! }
//! ```
//!
//! The callback blocks until the token task completes, so it is always
//! invoked from the blocking pool, never from a runtime worker.

use std::path::Path;
use std::ptr;
use std::sync::Arc;

use async_trait::async_trait;
use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jlong, jstring};
use jni::JNIEnv;
use romcheck_core::{write_export, PlayIntegrityError, ScanConfig};
use romcheck_keystore::platform::android::{attach_env, clear_pending_exception, init_context};
use tracing::{error, info, warn};

use super::*;

/// Integrity token provider backed by a Java callback object.
struct JniTokenProvider {
    callback: GlobalRef,
}

impl JniTokenProvider {
    fn is_available_blocking(callback: &GlobalRef) -> bool {
        let mut env = match attach_env() {
            Ok(env) => env,
            Err(e) => {
                warn!("JniTokenProvider: {}", e);
                return false;
            },
        };

        match env
            .call_method(callback.as_obj(), "isAvailable", "()Z", &[])
            .and_then(|v| v.z())
        {
            Ok(available) => available,
            Err(e) => {
                clear_pending_exception(&mut env);
                warn!("JniTokenProvider: isAvailable failed: {}", e);
                false
            },
        }
    }

    fn request_token_blocking(
        callback: &GlobalRef,
        nonce: &str,
    ) -> Result<String, PlayIntegrityError> {
        let mut env = attach_env().map_err(|e| PlayIntegrityError::token(e.to_string()))?;

        let jnonce = env
            .new_string(nonce)
            .map_err(|e| PlayIntegrityError::token(e.to_string()))?;

        let result = env.call_method(
            callback.as_obj(),
            "requestToken",
            "(Ljava/lang/String;)Ljava/lang/String;",
            &[JValue::Object(&jnonce)],
        );

        let token = match result.and_then(|v| v.l()) {
            Ok(token) => token,
            Err(jni::errors::Error::JavaException) => {
                return Err(PlayIntegrityError::token(take_exception_message(&mut env)));
            },
            Err(e) => return Err(PlayIntegrityError::token(e.to_string())),
        };

        if token.is_null() {
            return Err(PlayIntegrityError::token("Empty integrity token"));
        }

        let token = JString::from(token);
        let token: String = env
            .get_string(&token)
            .map_err(|e| PlayIntegrityError::token(e.to_string()))?
            .into();
        Ok(token)
    }
}

#[async_trait]
impl IntegrityTokenProvider for JniTokenProvider {
    async fn is_available(&self) -> bool {
        let callback = self.callback.clone();
        tokio::task::spawn_blocking(move || Self::is_available_blocking(&callback))
            .await
            .unwrap_or(false)
    }

    async fn request_token(&self, nonce: &str) -> Result<String, PlayIntegrityError> {
        let callback = self.callback.clone();
        let nonce = nonce.to_string();
        tokio::task::spawn_blocking(move || Self::request_token_blocking(&callback, &nonce))
            .await
            .map_err(|e| PlayIntegrityError::token(e.to_string()))?
    }
}

/// Message of the pending Java exception, which is cleared.
fn take_exception_message(env: &mut JNIEnv<'_>) -> String {
    let throwable = match env.exception_occurred() {
        Ok(t) if !t.is_null() => t,
        _ => return "Unknown integrity error".to_string(),
    };
    let _ = env.exception_clear();

    let message = env
        .call_method(&throwable, "getMessage", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .ok()
        .filter(|m| !m.is_null())
        .and_then(|m| env.get_string(&JString::from(m)).ok().map(String::from));
    clear_pending_exception(env);

    message.unwrap_or_else(|| "Unknown integrity error".to_string())
}

/// Read an optional Java string argument.
fn optional_string(env: &mut JNIEnv<'_>, value: &JString<'_>) -> Option<String> {
    if value.is_null() {
        return None;
    }
    env.get_string(value).ok().map(String::from)
}

fn to_jstring(env: &mut JNIEnv<'_>, value: &str) -> jstring {
    match env.new_string(value) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            error!("JNI: failed to create string: {}", e);
            ptr::null_mut()
        },
    }
}

/// `long nativeInit(Context, IntegrityTokenProvider, String verifierEndpoint)`
///
/// Provider and endpoint may be null. Returns 0 on failure.
#[no_mangle]
pub extern "system" fn Java_io_romcheck_RomCheck_nativeInit<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    context: JObject<'local>,
    provider: JObject<'local>,
    endpoint: JString<'local>,
) -> jlong {
    init_logging();

    if !context.is_null() {
        if let Err(e) = init_context(&mut env, &context) {
            warn!("nativeInit: context not stored: {}", e);
        }
    }

    let provider: Option<Arc<dyn IntegrityTokenProvider>> = if provider.is_null() {
        None
    } else {
        match env.new_global_ref(&provider) {
            Ok(callback) => Some(Arc::new(JniTokenProvider { callback })),
            Err(e) => {
                error!("nativeInit: provider reference failed: {}", e);
                return 0;
            },
        }
    };

    let config = ScanConfig {
        verifier_endpoint: optional_string(&mut env, &endpoint),
        ..ScanConfig::default()
    };

    info!(
        has_provider = provider.is_some(),
        has_verifier = config.verifier_endpoint.is_some(),
        "nativeInit"
    );

    match create_handle(config, provider) {
        Some(handle) => Box::into_raw(Box::new(handle)) as jlong,
        None => 0,
    }
}

/// `String nativeScan(long handle)`: `SecurityStatus` JSON, or null on failure.
#[no_mangle]
pub unsafe extern "system" fn Java_io_romcheck_RomCheck_nativeScan<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
) -> jstring {
    let handle = handle as *mut RomcheckHandle;
    if handle.is_null() {
        return ptr::null_mut();
    }
    let handle = &*handle;

    let status = match handle.runtime.block_on(handle.scanner.scan()) {
        Ok(s) => s,
        Err(e) => {
            error!("nativeScan: {}", e);
            return ptr::null_mut();
        },
    };

    match serde_json::to_string(&status) {
        Ok(json) => to_jstring(&mut env, &json),
        Err(e) => {
            error!("nativeScan: failed to serialize status: {}", e);
            ptr::null_mut()
        },
    }
}

/// `String nativeExport(long handle, String cacheDir)`: scans, writes the
/// export document into `cacheDir` and returns its path, or null on failure.
#[no_mangle]
pub unsafe extern "system" fn Java_io_romcheck_RomCheck_nativeExport<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
    cache_dir: JString<'local>,
) -> jstring {
    let handle = handle as *mut RomcheckHandle;
    if handle.is_null() {
        return ptr::null_mut();
    }
    let handle = &*handle;

    let Some(dir) = optional_string(&mut env, &cache_dir) else {
        error!("nativeExport: cache directory missing");
        return ptr::null_mut();
    };

    let status = match handle.runtime.block_on(handle.scanner.scan()) {
        Ok(s) => s,
        Err(e) => {
            error!("nativeExport: {}", e);
            return ptr::null_mut();
        },
    };

    match write_export(&status, Path::new(&dir)) {
        Ok(path) => to_jstring(&mut env, &path.to_string_lossy()),
        Err(e) => {
            error!("nativeExport: {}", e);
            ptr::null_mut()
        },
    }
}

/// `void nativeDestroy(long handle)`
#[no_mangle]
pub unsafe extern "system" fn Java_io_romcheck_RomCheck_nativeDestroy<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
    handle: jlong,
) {
    romcheck_destroy(handle as *mut RomcheckHandle);
}

//! `PackageManager` access through JNI.
//!
//! Shares the JavaVM and application `Context` cached by
//! `romcheck_keystore::platform::android`.

use jni::objects::{JByteArray, JObject, JObjectArray, JValue};
use jni::JNIEnv;
use romcheck_keystore::platform::android::{app_context, attach_env, clear_pending_exception};
use tracing::{debug, warn};

use super::{EvidenceError, PackageRegistry, SigningInfo, SIGNING_INFO_MIN_SDK};

/// `PackageManager.GET_SIGNATURES`
const GET_SIGNATURES: i32 = 0x0000_0040;

/// `PackageManager.GET_SIGNING_CERTIFICATES`
const GET_SIGNING_CERTIFICATES: i32 = 0x0800_0000;

/// Package queries through `android.content.pm.PackageManager`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidPackageManager;

impl AndroidPackageManager {
    fn package_info<'a>(
        env: &mut JNIEnv<'a>,
        package: &str,
        flags: i32,
    ) -> Result<JObject<'a>, EvidenceError> {
        let context =
            app_context().ok_or_else(|| EvidenceError::platform("application context not set"))?;
        let pm = env
            .call_method(
                context.as_obj(),
                "getPackageManager",
                "()Landroid/content/pm/PackageManager;",
                &[],
            )?
            .l()?;
        let name = env.new_string(package)?;
        let info = env
            .call_method(
                &pm,
                "getPackageInfo",
                "(Ljava/lang/String;I)Landroid/content/pm/PackageInfo;",
                &[JValue::Object(&name.into()), JValue::Int(flags)],
            )?
            .l()?;
        Ok(info)
    }

    fn signature_bytes(
        env: &mut JNIEnv<'_>,
        signatures: JObject<'_>,
    ) -> Result<Vec<Vec<u8>>, EvidenceError> {
        if signatures.is_null() {
            return Ok(Vec::new());
        }
        let signatures = JObjectArray::from(signatures);
        let length = env.get_array_length(&signatures)?;
        let mut blobs = Vec::with_capacity(length.max(0) as usize);
        for i in 0..length {
            let signature = env.get_object_array_element(&signatures, i)?;
            let bytes = env.call_method(&signature, "toByteArray", "()[B", &[])?.l()?;
            blobs.push(env.convert_byte_array(JByteArray::from(bytes))?);
        }
        Ok(blobs)
    }

    fn jni_signing_info(
        env: &mut JNIEnv<'_>,
        package: &str,
        sdk_int: u32,
    ) -> Result<SigningInfo, EvidenceError> {
        if sdk_int >= SIGNING_INFO_MIN_SDK {
            let info = Self::package_info(env, package, GET_SIGNING_CERTIFICATES)?;
            let signing = env
                .get_field(&info, "signingInfo", "Landroid/content/pm/SigningInfo;")?
                .l()?;
            if signing.is_null() {
                return Ok(SigningInfo::SigningCertificates(Vec::new()));
            }
            let signers = env
                .call_method(
                    &signing,
                    "getApkContentsSigners",
                    "()[Landroid/content/pm/Signature;",
                    &[],
                )?
                .l()?;
            Ok(SigningInfo::SigningCertificates(Self::signature_bytes(
                env, signers,
            )?))
        } else {
            let info = Self::package_info(env, package, GET_SIGNATURES)?;
            let signatures = env
                .get_field(&info, "signatures", "[Landroid/content/pm/Signature;")?
                .l()?;
            Ok(SigningInfo::LegacySignatures(Self::signature_bytes(
                env, signatures,
            )?))
        }
    }
}

impl PackageRegistry for AndroidPackageManager {
    fn is_installed(&self, package: &str) -> bool {
        let Ok(mut env) = attach_env() else {
            return false;
        };
        match Self::package_info(&mut env, package, 0) {
            Ok(info) => !info.is_null(),
            Err(_) => {
                // NameNotFoundException
                clear_pending_exception(&mut env);
                false
            },
        }
    }

    fn signing_info(&self, package: &str, sdk_int: u32) -> Result<SigningInfo, EvidenceError> {
        let mut env = attach_env().map_err(|e| EvidenceError::platform(e.to_string()))?;
        let result = Self::jni_signing_info(&mut env, package, sdk_int);
        match &result {
            Ok(info) => debug!(package, sdk_int, count = info.len(), "signing info read"),
            Err(e) => {
                clear_pending_exception(&mut env);
                warn!(package, sdk_int, "signing info query failed: {}", e);
            },
        }
        result
    }
}

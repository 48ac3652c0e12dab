//! Android Keystore attestation backend.
//!
//! Uses JNI to reach `java.security.KeyStore` through the `AndroidKeyStore`
//! provider. Keys are generated in, and never leave, the TEE or StrongBox.
//! The JavaVM and application `Context` are process globals set once from
//! `JNI_OnLoad` and the host app's initialization call.

use std::sync::OnceLock;

use jni::objects::{GlobalRef, JByteArray, JObject, JObjectArray, JValue};
use jni::{AttachGuard, JNIEnv, JavaVM};
use tracing::{debug, error, info, warn};

use crate::error::KeystoreError;
use crate::keystore::{AttestationKeySpec, AttestingKeystore};
use crate::types::HardwareType;

const ANDROID_KEYSTORE: &str = "AndroidKeyStore";

/// `KeyProperties.PURPOSE_SIGN | KeyProperties.PURPOSE_VERIFY`
const PURPOSE_SIGN_VERIFY: i32 = 4 | 8;

const FEATURE_STRONGBOX: &str = "android.hardware.strongbox_keystore";

/// Global JavaVM reference, set during JNI_OnLoad or explicit initialization.
static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// Application context, needed for PackageManager queries.
static APP_CONTEXT: OnceLock<GlobalRef> = OnceLock::new();

/// Initialize the JNI subsystem with a JavaVM reference.
pub fn init_jni(vm: JavaVM) -> Result<(), KeystoreError> {
    info!("init_jni: initializing JavaVM reference");
    JAVA_VM.set(vm).map_err(|_| {
        error!("init_jni: JavaVM already initialized");
        KeystoreError::HardwareNotAvailable {
            reason: "JavaVM already initialized".into(),
        }
    })
}

/// Store a global reference to the application `Context`.
///
/// Later calls are ignored; the first context wins.
pub fn init_context(env: &mut JNIEnv<'_>, context: &JObject<'_>) -> Result<(), KeystoreError> {
    if APP_CONTEXT.get().is_some() {
        debug!("init_context: context already set");
        return Ok(());
    }
    let global = env.new_global_ref(context)?;
    let _ = APP_CONTEXT.set(global);
    info!("init_context: application context stored");
    Ok(())
}

/// The cached JavaVM reference.
pub fn java_vm() -> Option<&'static JavaVM> {
    JAVA_VM.get()
}

/// The cached application `Context`.
pub fn app_context() -> Option<&'static GlobalRef> {
    APP_CONTEXT.get()
}

/// Attach the current thread to the JavaVM.
pub fn attach_env() -> Result<AttachGuard<'static>, KeystoreError> {
    let vm = java_vm().ok_or_else(|| KeystoreError::HardwareNotAvailable {
        reason: "JNI not initialized".into(),
    })?;
    vm.attach_current_thread()
        .map_err(|e| KeystoreError::HardwareNotAvailable {
            reason: format!("JNI attach failed: {}", e),
        })
}

/// Clear a pending Java exception so the env stays usable.
pub fn clear_pending_exception(env: &mut JNIEnv<'_>) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
}

/// JNI_OnLoad - called automatically when the library is loaded by Android.
#[no_mangle]
pub unsafe extern "system" fn JNI_OnLoad(
    vm: *mut jni::sys::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    info!("JNI_OnLoad: romcheck native library loaded");

    // Safety: vm pointer is provided by the JVM and is valid
    let vm = match JavaVM::from_raw(vm) {
        Ok(vm) => vm,
        Err(e) => {
            error!("JNI_OnLoad: failed to create JavaVM wrapper: {}", e);
            return jni::sys::JNI_ERR;
        },
    };

    if let Err(e) = init_jni(vm) {
        error!("JNI_OnLoad: failed to initialize JNI: {}", e);
        return jni::sys::JNI_ERR;
    }

    jni::sys::JNI_VERSION_1_6
}

/// Whether the device declares a StrongBox key store.
pub fn has_strongbox() -> bool {
    let Some(context) = app_context() else {
        return false;
    };
    let Ok(mut env) = attach_env() else {
        return false;
    };
    let result = query_system_feature(&mut env, context.as_obj(), FEATURE_STRONGBOX);
    if result.is_err() {
        clear_pending_exception(&mut env);
    }
    result.unwrap_or(false)
}

fn query_system_feature(
    env: &mut JNIEnv<'_>,
    context: &JObject<'_>,
    feature: &str,
) -> jni::errors::Result<bool> {
    let pm = env
        .call_method(
            context,
            "getPackageManager",
            "()Landroid/content/pm/PackageManager;",
            &[],
        )?
        .l()?;
    let feature = env.new_string(feature)?;
    env.call_method(
        &pm,
        "hasSystemFeature",
        "(Ljava/lang/String;)Z",
        &[JValue::Object(&feature.into())],
    )?
    .z()
}

/// Android Keystore backend for attestation keys.
pub struct AndroidKeystore {
    /// Whether StrongBox is present on this device
    strongbox_available: bool,
}

impl AndroidKeystore {
    /// Create a backend. Fails if JNI has not been initialized.
    pub fn new() -> Result<Self, KeystoreError> {
        if java_vm().is_none() {
            warn!("JNI not initialized - ensure library is loaded via System.loadLibrary()");
            return Err(KeystoreError::HardwareNotAvailable {
                reason: "JNI not initialized".into(),
            });
        }

        let strongbox_available = has_strongbox();
        info!(strongbox_available, "AndroidKeystore created");
        Ok(Self {
            strongbox_available,
        })
    }

    fn load_keystore<'a>(env: &mut JNIEnv<'a>) -> jni::errors::Result<JObject<'a>> {
        let keystore_type = env.new_string(ANDROID_KEYSTORE)?;
        let keystore = env
            .call_static_method(
                "java/security/KeyStore",
                "getInstance",
                "(Ljava/lang/String;)Ljava/security/KeyStore;",
                &[JValue::Object(&keystore_type.into())],
            )?
            .l()?;

        env.call_method(
            &keystore,
            "load",
            "(Ljava/security/KeyStore$LoadStoreParameter;)V",
            &[JValue::Object(&JObject::null())],
        )?;

        Ok(keystore)
    }

    fn jni_generate(
        env: &mut JNIEnv<'_>,
        spec: &AttestationKeySpec,
        strongbox: bool,
    ) -> jni::errors::Result<()> {
        let algorithm = env.new_string("EC")?;
        let provider = env.new_string(ANDROID_KEYSTORE)?;
        let generator = env
            .call_static_method(
                "java/security/KeyPairGenerator",
                "getInstance",
                "(Ljava/lang/String;Ljava/lang/String;)Ljava/security/KeyPairGenerator;",
                &[
                    JValue::Object(&algorithm.into()),
                    JValue::Object(&provider.into()),
                ],
            )?
            .l()?;

        let alias = env.new_string(&spec.alias)?;
        let builder = env.new_object(
            "android/security/keystore/KeyGenParameterSpec$Builder",
            "(Ljava/lang/String;I)V",
            &[JValue::Object(&alias.into()), JValue::Int(PURPOSE_SIGN_VERIFY)],
        )?;

        env.call_method(
            &builder,
            "setKeySize",
            "(I)Landroid/security/keystore/KeyGenParameterSpec$Builder;",
            &[JValue::Int(spec.key_size as i32)],
        )?;

        let digest = env.new_string(spec.digest.platform_name())?;
        let digests = env.new_object_array(1, "java/lang/String", &digest)?;
        env.call_method(
            &builder,
            "setDigests",
            "([Ljava/lang/String;)Landroid/security/keystore/KeyGenParameterSpec$Builder;",
            &[JValue::Object(&digests)],
        )?;

        let challenge = env.byte_array_from_slice(&spec.challenge)?;
        env.call_method(
            &builder,
            "setAttestationChallenge",
            "([B)Landroid/security/keystore/KeyGenParameterSpec$Builder;",
            &[JValue::Object(&challenge)],
        )?;

        if strongbox {
            env.call_method(
                &builder,
                "setIsStrongBoxBacked",
                "(Z)Landroid/security/keystore/KeyGenParameterSpec$Builder;",
                &[JValue::Bool(1)],
            )?;
        }

        let params = env
            .call_method(
                &builder,
                "build",
                "()Landroid/security/keystore/KeyGenParameterSpec;",
                &[],
            )?
            .l()?;

        env.call_method(
            &generator,
            "initialize",
            "(Ljava/security/spec/AlgorithmParameterSpec;)V",
            &[JValue::Object(&params)],
        )?;

        env.call_method(
            &generator,
            "generateKeyPair",
            "()Ljava/security/KeyPair;",
            &[],
        )?;

        Ok(())
    }

    /// DER chain of `alias`, `None` when the entry does not exist.
    fn jni_chain(env: &mut JNIEnv<'_>, alias: &str) -> jni::errors::Result<Option<Vec<Vec<u8>>>> {
        let keystore = Self::load_keystore(env)?;
        let alias = env.new_string(alias)?;
        let chain = env
            .call_method(
                &keystore,
                "getCertificateChain",
                "(Ljava/lang/String;)[Ljava/security/cert/Certificate;",
                &[JValue::Object(&alias.into())],
            )?
            .l()?;

        if chain.is_null() {
            return Ok(None);
        }

        let chain = JObjectArray::from(chain);
        let length = env.get_array_length(&chain)?;
        let mut result = Vec::with_capacity(length.max(0) as usize);
        for i in 0..length {
            let cert = env.get_object_array_element(&chain, i)?;
            let encoded = env.call_method(&cert, "getEncoded", "()[B", &[])?.l()?;
            let bytes = env.convert_byte_array(JByteArray::from(encoded))?;
            result.push(bytes);
        }
        Ok(Some(result))
    }

    fn jni_delete(env: &mut JNIEnv<'_>, alias: &str) -> jni::errors::Result<()> {
        let keystore = Self::load_keystore(env)?;
        let alias = env.new_string(alias)?;
        env.call_method(
            &keystore,
            "deleteEntry",
            "(Ljava/lang/String;)V",
            &[JValue::Object(&alias.into())],
        )?;
        Ok(())
    }
}

impl AttestingKeystore for AndroidKeystore {
    fn hardware_type(&self) -> HardwareType {
        if self.strongbox_available {
            HardwareType::AndroidStrongbox
        } else {
            HardwareType::AndroidKeystore
        }
    }

    fn generate_attested_key(&self, spec: &AttestationKeySpec) -> Result<(), KeystoreError> {
        spec.validate()?;
        let mut env = attach_env()?;

        let strongbox = spec.prefer_strongbox && self.strongbox_available;
        info!(alias = %spec.alias, strongbox, "generating attestation key");

        let mut result = Self::jni_generate(&mut env, spec, strongbox);
        if result.is_err() && strongbox {
            // StrongBoxUnavailableException: fall back to the TEE
            clear_pending_exception(&mut env);
            warn!(alias = %spec.alias, "StrongBox key generation failed, retrying in TEE");
            result = Self::jni_generate(&mut env, spec, false);
        }

        result.map_err(|e| {
            clear_pending_exception(&mut env);
            error!(alias = %spec.alias, "generateKeyPair failed: {}", e);
            KeystoreError::generation(e.to_string())
        })?;

        info!(alias = %spec.alias, "Key generated in Android Keystore");
        Ok(())
    }

    fn certificate_chain(&self, alias: &str) -> Result<Vec<Vec<u8>>, KeystoreError> {
        let mut env = attach_env()?;
        let chain = Self::jni_chain(&mut env, alias).map_err(|e| {
            clear_pending_exception(&mut env);
            warn!(alias = %alias, "getCertificateChain failed: {}", e);
            KeystoreError::attestation(e.to_string())
        })?;
        let chain = chain.ok_or_else(|| KeystoreError::KeyNotFound {
            alias: alias.to_string(),
        })?;
        debug!(alias = %alias, chain_len = chain.len(), "Attestation chain retrieved");
        Ok(chain)
    }

    fn delete_key(&self, alias: &str) -> Result<(), KeystoreError> {
        let mut env = attach_env()?;
        Self::jni_delete(&mut env, alias).map_err(|e| {
            clear_pending_exception(&mut env);
            error!(alias = %alias, "deleteEntry failed: {}", e);
            KeystoreError::DeletionFailed {
                reason: e.to_string(),
            }
        })?;
        info!(alias = %alias, "Key deleted from Android Keystore");
        Ok(())
    }
}

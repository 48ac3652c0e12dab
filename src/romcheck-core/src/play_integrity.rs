//! Remote integrity check through Google Play Integrity.
//!
//! The token itself comes from the app layer: on Android the Play Integrity
//! API is a Java library, so the platform side implements
//! [`IntegrityTokenProvider`] and the FFI crate bridges it. An optional
//! [`TokenVerifier`] backend decodes tokens into device verdicts.
//!
//! ## Flow
//!
//! 1. Check the provider is available (Play Services present)
//! 2. Generate a fresh 32-byte nonce, base64url without padding
//! 3. Request one integrity token carrying the nonce
//! 4. Without a verifier: a token means MEETS_BASIC_INTEGRITY
//! 5. With a verifier: post token + nonce, map the device verdict
//!
//! There is no retry. A failed request is classified from its message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use crate::error::PlayIntegrityError;
use crate::types::{IntegrityVerdict, PlayIntegrityResult};

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 32;

/// Reported when the provider cannot be used at all.
pub const MSG_UNAVAILABLE: &str = "Play Services unavailable";

/// Reported when the app has no integrity backend configured.
pub const MSG_NO_BACKEND: &str = "Unavailable (No Backend)";

/// Body posted to the verifier backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityVerifyRequest {
    /// Token returned by the provider.
    pub integrity_token: String,
    /// Nonce the token was requested with.
    pub nonce: String,
}

/// Decoded token payload, as returned by the verifier backend.
///
/// Labels are Google's verdict names (`MEETS_DEVICE_INTEGRITY`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityVerifyResponse {
    /// Token decrypted and nonce matched.
    pub verified: bool,
    /// `deviceIntegrity.deviceRecognitionVerdict`; absent when not evaluated.
    #[serde(default)]
    pub device_recognition_verdict: Option<Vec<String>>,
    /// `appIntegrity.appRecognitionVerdict`.
    #[serde(default)]
    pub app_recognition_verdict: Option<String>,
    /// Why verification failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl IntegrityVerifyResponse {
    /// Whether Play recognizes the calling app.
    pub fn is_play_recognized(&self) -> bool {
        self.app_recognition_verdict.as_deref() == Some("PLAY_RECOGNIZED")
    }

    fn has_label(&self, verdict: IntegrityVerdict) -> bool {
        self.device_recognition_verdict
            .iter()
            .flatten()
            .any(|label| label == verdict.as_str())
    }

    /// Map the backend's answer to a scan result.
    ///
    /// Stronger labels imply the weaker ones.
    pub fn to_result(&self) -> PlayIntegrityResult {
        if !self.verified {
            let message = self
                .error
                .clone()
                .unwrap_or_else(|| "Integrity verification failed".into());
            return PlayIntegrityResult::without_integrity(IntegrityVerdict::Failed, Some(message));
        }

        if self.device_recognition_verdict.is_none() {
            return PlayIntegrityResult::without_integrity(
                IntegrityVerdict::Unknown,
                Some("No device verdict".into()),
            );
        }

        let strong = self.has_label(IntegrityVerdict::MeetsStrongIntegrity);
        let device = strong || self.has_label(IntegrityVerdict::MeetsDeviceIntegrity);
        let basic = device || self.has_label(IntegrityVerdict::MeetsBasicIntegrity);

        let verdict = match (strong, device, basic) {
            (true, _, _) => IntegrityVerdict::MeetsStrongIntegrity,
            (_, true, _) => IntegrityVerdict::MeetsDeviceIntegrity,
            (_, _, true) => IntegrityVerdict::MeetsBasicIntegrity,
            _ => IntegrityVerdict::Failed,
        };

        PlayIntegrityResult {
            verdict,
            device_integrity: device,
            basic_integrity: basic,
            strong_integrity: strong,
            error_message: (!basic).then(|| "Device does not meet basic integrity".to_string()),
        }
    }
}

/// Source of integrity tokens.
#[async_trait]
pub trait IntegrityTokenProvider: Send + Sync {
    /// Whether the integrity service can be called.
    async fn is_available(&self) -> bool;

    /// Request one integrity token bound to `nonce`.
    ///
    /// # Errors
    ///
    /// Returns error with the provider's message if the request fails.
    async fn request_token(&self, nonce: &str) -> Result<String, PlayIntegrityError>;
}

/// Backend that decodes integrity tokens.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a token.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached or answers badly.
    async fn verify(
        &self,
        request: &IntegrityVerifyRequest,
    ) -> Result<IntegrityVerifyResponse, PlayIntegrityError>;
}

/// Verifier posting tokens to an HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpTokenVerifier {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpTokenVerifier {
    /// Create a verifier for `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: crate::http::create_agent(timeout),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(
        &self,
        request: &IntegrityVerifyRequest,
    ) -> Result<IntegrityVerifyResponse, PlayIntegrityError> {
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let request = request.clone();

        let (status, response) = tokio::task::spawn_blocking(move || {
            crate::http::post_json::<IntegrityVerifyResponse, _>(&agent, &endpoint, &request)
        })
        .await
        .map_err(|e| PlayIntegrityError::transport(format!("verifier task failed: {e}")))??;

        info!(status, verified = response.verified, "integrity token verified");
        Ok(response)
    }
}

/// Generate a fresh nonce: 32 random bytes, base64url without padding.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Classify a failed token request from its message.
#[must_use]
pub fn classify_failure(message: &str) -> PlayIntegrityResult {
    // -16: CLOUD_PROJECT_NUMBER_IS_INVALID
    if message.contains("-16") || message.contains("CLOUD_PROJECT_NUMBER") {
        PlayIntegrityResult::without_integrity(
            IntegrityVerdict::Unknown,
            Some(MSG_NO_BACKEND.to_string()),
        )
    } else {
        PlayIntegrityResult::without_integrity(IntegrityVerdict::Failed, Some(message.to_string()))
    }
}

/// Result reported when a token was obtained but not decoded.
#[must_use]
pub fn basic_integrity_placeholder() -> PlayIntegrityResult {
    PlayIntegrityResult {
        verdict: IntegrityVerdict::MeetsBasicIntegrity,
        device_integrity: true,
        basic_integrity: true,
        strong_integrity: false,
        error_message: None,
    }
}

/// Client performing the remote integrity check.
#[derive(Clone, Default)]
pub struct RemoteIntegrityClient {
    provider: Option<Arc<dyn IntegrityTokenProvider>>,
    verifier: Option<Arc<dyn TokenVerifier>>,
}

impl std::fmt::Debug for RemoteIntegrityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteIntegrityClient")
            .field("provider", &self.provider.is_some())
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

impl RemoteIntegrityClient {
    /// A client without a provider; every check reports unavailability.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// A client requesting tokens from `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn IntegrityTokenProvider>) -> Self {
        Self::default().with_provider(provider)
    }

    /// Request tokens from `provider`, keeping any verifier.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IntegrityTokenProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Whether a token provider is configured.
    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Decode tokens through `verifier`.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Run the integrity check once.
    pub async fn check_play_integrity(&self) -> PlayIntegrityResult {
        let Some(provider) = &self.provider else {
            return PlayIntegrityResult::without_integrity(
                IntegrityVerdict::Unknown,
                Some(MSG_UNAVAILABLE.to_string()),
            );
        };
        if !provider.is_available().await {
            info!("integrity provider unavailable");
            return PlayIntegrityResult::without_integrity(
                IntegrityVerdict::Unknown,
                Some(MSG_UNAVAILABLE.to_string()),
            );
        }

        let nonce = generate_nonce();
        let token = match provider.request_token(&nonce).await {
            Ok(token) => token,
            Err(e) => {
                let result = classify_failure(&e.to_string());
                warn!(verdict = %result.verdict, "integrity token request failed: {}", e);
                return result;
            },
        };

        let Some(verifier) = &self.verifier else {
            info!(token_len = token.len(), "integrity token received");
            return basic_integrity_placeholder();
        };

        let request = IntegrityVerifyRequest {
            integrity_token: token,
            nonce,
        };
        match verifier.verify(&request).await {
            Ok(response) => {
                let result = response.to_result();
                info!(
                    verdict = %result.verdict,
                    play_recognized = response.is_play_recognized(),
                    "integrity verdict decoded"
                );
                result
            },
            Err(PlayIntegrityError::Transport { message }) => {
                warn!("integrity verifier unreachable: {}", message);
                PlayIntegrityResult::without_integrity(
                    IntegrityVerdict::Unknown,
                    Some(MSG_NO_BACKEND.to_string()),
                )
            },
            Err(e) => {
                warn!("integrity verifier failed: {}", e);
                PlayIntegrityResult::without_integrity(IntegrityVerdict::Failed, Some(e.to_string()))
            },
        }
    }
}

//! Security scan coordinator.
//!
//! Runs the probes in a fixed order and merges them into one
//! [`SecurityStatus`]:
//! 1. Remote integrity check (the only network round trip)
//! 2. Root detection
//! 3. Bootloader inspection
//! 4. ROM signature analysis
//! 5. Key attestation
//!
//! Probes absorb expected failures into their own result values. A probe
//! that panics fails the whole scan; no partial status is returned.

use std::sync::Arc;

use chrono::Utc;
use romcheck_keystore::{create_platform_keystore, AttestingKeystore};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::attestation::perform_key_attestation;
use crate::bootloader::check_bootloader;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::evidence::{create_platform_evidence, EvidenceSource};
use crate::play_integrity::{
    HttpTokenVerifier, IntegrityTokenProvider, RemoteIntegrityClient, TokenVerifier,
};
use crate::root::detect_root;
use crate::signature::analyze_rom_signature;
use crate::types::SecurityStatus;

/// The security scanner.
///
/// One scanner can be shared; concurrent [`scan`](Self::scan) calls run one
/// after another.
pub struct SecurityScanner {
    /// Configuration.
    config: ScanConfig,
    /// Device signals.
    evidence: Arc<dyn EvidenceSource>,
    /// Attestation key store, absent off-device.
    keystore: Option<Arc<dyn AttestingKeystore>>,
    /// Remote integrity client.
    integrity: RemoteIntegrityClient,
    /// Serializes scans.
    scan_lock: Mutex<()>,
}

impl SecurityScanner {
    /// Create a scanner for the running device with default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new() -> Result<Self, ScanError> {
        Self::with_config(ScanConfig::default())
    }

    /// Create a scanner for the running device.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn with_config(config: ScanConfig) -> Result<Self, ScanError> {
        let keystore: Option<Arc<dyn AttestingKeystore>> = match create_platform_keystore() {
            Ok(store) => {
                info!(hardware_type = ?store.hardware_type(), "SecurityScanner: key store ready");
                Some(Arc::from(store))
            },
            Err(e) if e.is_unsupported() => {
                debug!("SecurityScanner: attestation not offered on this platform: {}", e);
                None
            },
            Err(e) => {
                warn!("SecurityScanner: attestation key store failed to open: {}", e);
                None
            },
        };

        Self::with_parts(config, Arc::new(create_platform_evidence()), keystore)
    }

    /// Create a scanner from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn with_parts(
        config: ScanConfig,
        evidence: Arc<dyn EvidenceSource>,
        keystore: Option<Arc<dyn AttestingKeystore>>,
    ) -> Result<Self, ScanError> {
        config.validate()?;

        let mut integrity = RemoteIntegrityClient::unavailable();
        if let Some(endpoint) = &config.verifier_endpoint {
            info!(endpoint = %endpoint, "SecurityScanner: integrity verifier configured");
            integrity =
                integrity.with_verifier(Arc::new(HttpTokenVerifier::new(endpoint, config.timeout)));
        }

        Ok(Self {
            config,
            evidence,
            keystore,
            integrity,
            scan_lock: Mutex::new(()),
        })
    }

    /// Use `provider` for integrity tokens.
    #[must_use]
    pub fn with_token_provider(mut self, provider: Arc<dyn IntegrityTokenProvider>) -> Self {
        self.integrity = self.integrity.with_provider(provider);
        self
    }

    /// Decode integrity tokens through `verifier`.
    #[must_use]
    pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.integrity = self.integrity.with_verifier(verifier);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Whether key attestation can run.
    pub fn has_keystore(&self) -> bool {
        self.keystore.is_some()
    }

    /// Run a full scan.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if a probe task panics or is cancelled.
    #[instrument(skip(self))]
    pub async fn scan(&self) -> Result<SecurityStatus, ScanError> {
        let _guard = self.scan_lock.lock().await;
        let timestamp = Utc::now().timestamp_millis();
        info!(timestamp, "security scan started");

        let integrity = self.integrity.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move {
            integrity.check_play_integrity().await
        }));
        let play_integrity = (&mut task.0)
            .await
            .map_err(|e| Self::probe_failed("integrity", e))?;

        let root_status = self.run_probe("root", detect_root).await?;
        let bootloader_status = self.run_probe("bootloader", check_bootloader).await?;
        let rom_signature = self.run_probe("signature", analyze_rom_signature).await?;

        let keystore = self.keystore.clone();
        let config = self.config.clone();
        let key_attestation = self
            .run_probe("attestation", move |evidence| {
                perform_key_attestation(evidence, keystore.as_deref(), &config, timestamp)
            })
            .await?;

        info!(
            verdict = %play_integrity.verdict,
            rooted = root_status.is_rooted,
            bootloader = %bootloader_status.state,
            signature = %rom_signature.signature_type,
            attested = key_attestation.is_some(),
            "security scan complete"
        );

        Ok(SecurityStatus {
            play_integrity,
            root_status,
            bootloader_status,
            rom_signature,
            key_attestation,
            timestamp,
        })
    }

    /// Run a blocking probe on the blocking pool.
    async fn run_probe<T, F>(&self, probe: &'static str, f: F) -> Result<T, ScanError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EvidenceSource) -> T + Send + 'static,
    {
        let evidence = Arc::clone(&self.evidence);
        tokio::task::spawn_blocking(move || f(evidence.as_ref()))
            .await
            .map_err(|e| Self::probe_failed(probe, e))
    }

    fn probe_failed(probe: &'static str, err: tokio::task::JoinError) -> ScanError {
        error!(probe, "security scan failed: {}", err);
        ScanError::from_join(probe, err)
    }
}

/// Aborts the wrapped task when the scan future is dropped first.
struct AbortOnDrop<T>(tokio::task::JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

//! Blocking HTTP client for the integrity verifier.
//!
//! On Android, tokio's async I/O is unreliable on JNI-attached threads, so
//! requests use blocking ureq and callers run them on the blocking pool.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PlayIntegrityError;

/// Create an agent with the given overall timeout.
#[must_use]
pub fn create_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout.min(Duration::from_secs(5)))
        .timeout(timeout)
        .user_agent(&format!("romcheck/{}", env!("CARGO_PKG_VERSION")))
        .build()
}

/// POST a JSON body and decode a JSON response.
pub fn post_json<T: serde::de::DeserializeOwned, B: serde::Serialize>(
    agent: &ureq::Agent,
    url: &str,
    body: &B,
) -> Result<(u16, T), PlayIntegrityError> {
    debug!("HTTP POST: {}", url);

    let response = agent.post(url).send_json(body).map_err(|e| {
        if let ureq::Error::Status(code, _) = &e {
            return PlayIntegrityError::transport(format!("HTTP error: {}", code));
        }
        warn!("HTTP POST failed: {} - {}", url, e);
        PlayIntegrityError::transport(format!("Request failed: {}", e))
    })?;

    let status = response.status();
    if !(200..300).contains(&status) {
        return Err(PlayIntegrityError::transport(format!(
            "HTTP error: {}",
            status
        )));
    }

    let body: T = response
        .into_json()
        .map_err(|e| PlayIntegrityError::InvalidResponse {
            reason: format!("JSON parse error: {}", e),
        })?;

    Ok((status, body))
}

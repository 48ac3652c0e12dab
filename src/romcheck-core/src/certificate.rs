//! X.509 certificate parsing and fingerprints.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::types::CertificateInfo;

/// Java-style names for common signature algorithm OIDs.
const SIGNATURE_ALGORITHMS: &[(&str, &str)] = &[
    ("1.2.840.113549.1.1.4", "MD5withRSA"),
    ("1.2.840.113549.1.1.5", "SHA1withRSA"),
    ("1.2.840.113549.1.1.10", "RSASSA-PSS"),
    ("1.2.840.113549.1.1.11", "SHA256withRSA"),
    ("1.2.840.113549.1.1.12", "SHA384withRSA"),
    ("1.2.840.113549.1.1.13", "SHA512withRSA"),
    ("1.2.840.10040.4.3", "SHA1withDSA"),
    ("2.16.840.1.101.3.4.3.2", "SHA256withDSA"),
    ("1.2.840.10045.4.1", "SHA1withECDSA"),
    ("1.2.840.10045.4.3.2", "SHA256withECDSA"),
    ("1.2.840.10045.4.3.3", "SHA384withECDSA"),
    ("1.2.840.10045.4.3.4", "SHA512withECDSA"),
    ("1.3.101.112", "Ed25519"),
];

/// Format a digest as colon-separated upper-case hex pairs (`AB:CD:...`).
#[must_use]
pub fn format_fingerprint(digest: &[u8]) -> String {
    let hex = hex::encode_upper(digest);
    hex.as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair))
        .collect::<Vec<_>>()
        .join(":")
}

/// SHA-1 fingerprint of an encoded certificate.
#[must_use]
pub fn sha1_fingerprint(der: &[u8]) -> String {
    format_fingerprint(&Sha1::digest(der))
}

/// SHA-256 fingerprint of an encoded certificate.
#[must_use]
pub fn sha256_fingerprint(der: &[u8]) -> String {
    format_fingerprint(&Sha256::digest(der))
}

/// Name of a signature algorithm OID, or the dotted OID when unnamed.
#[must_use]
pub fn signature_algorithm_name(oid: &str) -> String {
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|(known, _)| *known == oid)
        .map_or_else(|| oid.to_string(), |(_, name)| (*name).to_string())
}

/// Parse one DER certificate, `None` if it is not a certificate.
///
/// Fingerprints cover the whole input blob.
#[must_use]
pub fn parse_certificate(der: &[u8]) -> Option<CertificateInfo> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;
    let validity = cert.validity();

    Some(CertificateInfo {
        issuer: cert.issuer().to_string(),
        subject: cert.subject().to_string(),
        sha1_fingerprint: sha1_fingerprint(der),
        sha256_fingerprint: sha256_fingerprint(der),
        valid_from: validity.not_before.timestamp() * 1000,
        valid_to: validity.not_after.timestamp() * 1000,
        algorithm: signature_algorithm_name(&cert.signature_algorithm.algorithm.to_id_string()),
    })
}

/// Parse a list of certificate blobs, dropping the ones that do not parse.
#[must_use]
pub fn parse_certificates(blobs: &[Vec<u8>]) -> Vec<CertificateInfo> {
    blobs
        .iter()
        .filter_map(|blob| {
            let parsed = parse_certificate(blob);
            if parsed.is_none() {
                tracing::debug!(len = blob.len(), "dropping unparseable certificate");
            }
            parsed
        })
        .collect()
}

/// Human-readable rendering of a certificate.
///
/// Falls back to PEM armor when the blob does not parse as X.509.
#[must_use]
pub fn describe_certificate(der: &[u8]) -> String {
    let Ok((_, cert)) = X509Certificate::from_der(der) else {
        return to_pem(der);
    };
    let validity = cert.validity();

    format!(
        "[\n  Version: V{}\n  Subject: {}\n  Issuer: {}\n  Serial: {}\n  Validity: [From: {}, To: {}]\n  Signature Algorithm: {}\n  SHA-256: {}\n]",
        cert.version().0 + 1,
        cert.subject(),
        cert.issuer(),
        cert.raw_serial_as_string(),
        validity.not_before,
        validity.not_after,
        signature_algorithm_name(&cert.signature_algorithm.algorithm.to_id_string()),
        sha256_fingerprint(der),
    )
}

/// PEM armor for a DER certificate.
#[must_use]
pub fn to_pem(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----");
    pem
}

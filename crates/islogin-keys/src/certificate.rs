#![forbid(unsafe_code)]

//! The signer certificate embedded in a token's `KeyInfo`.
//!
//! The token carries the certificate as bare base64 DER.  It is wrapped in
//! PEM boundaries at 64 columns and run through the strict RFC 7468
//! decoder, then parsed as X.509, so malformed blobs fail here rather than
//! inside the signature check.

use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use islogin_core::Error;
use islogin_crypto::PublicKey;
use serde::Serialize;
use x509_cert::Certificate;

const PEM_LABEL: &str = "CERTIFICATE";
const PEM_WIDTH: usize = 64;

/// A decoded X.509 certificate together with its DER encoding.
#[derive(Debug, Clone)]
pub struct SignerCertificate {
    der: Vec<u8>,
    cert: Certificate,
}

/// Printable facts about a certificate, reported alongside the signature
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    /// Serial number as lowercase hex.
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Whether the verification instant fell inside the validity window.
    pub within_validity: bool,
}

/// Wrap bare base64 text in PEM boundaries, re-flowing it to 64 columns.
pub fn wrap_pem(base64_body: &str) -> String {
    let body: Vec<char> = base64_body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let mut pem = format!("-----BEGIN {PEM_LABEL}-----\n");
    for line in body.chunks(PEM_WIDTH) {
        pem.extend(line);
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {PEM_LABEL}-----\n"));
    pem
}

impl SignerCertificate {
    /// Decode the base64 content of an `X509Certificate` element.
    pub fn from_base64(blob: &str) -> Result<Self, Error> {
        if blob.trim().is_empty() {
            return Err(Error::Certificate("empty X509Certificate".into()));
        }
        Self::from_pem(&wrap_pem(blob))
    }

    /// Decode a PEM `CERTIFICATE` block.
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let (label, der) = pem_rfc7468::decode_vec(pem.trim().as_bytes())
            .map_err(|e| Error::Certificate(format!("invalid PEM certificate: {e}")))?;
        if label != PEM_LABEL {
            return Err(Error::Certificate(format!("expected {PEM_LABEL} PEM block, found {label}")));
        }
        Self::from_der(der)
    }

    /// Decode a DER certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self, Error> {
        let cert = Certificate::from_der(&der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Ok(Self { der, cert })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn certificate(&self) -> &Certificate {
        &self.cert
    }

    /// Extract the subject public key.
    pub fn public_key(&self) -> Result<PublicKey, Error> {
        use spki::DecodePublicKey;

        let spki_der = self
            .cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Key(format!("failed to encode SPKI: {e}")))?;

        if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(&spki_der) {
            return Ok(PublicKey::Rsa(pk));
        }
        if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
            return Ok(PublicKey::EcP256(vk));
        }
        if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
            return Ok(PublicKey::EcP384(vk));
        }
        Err(Error::Key(format!(
            "unsupported public key algorithm: {}",
            self.cert.tbs_certificate.subject_public_key_info.algorithm.oid
        )))
    }

    /// The `notBefore`/`notAfter` window as UTC instants.
    pub fn validity(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), Error> {
        let validity = &self.cert.tbs_certificate.validity;
        Ok((to_chrono(&validity.not_before)?, to_chrono(&validity.not_after)?))
    }

    /// Whether `now` falls inside the certificate's validity window
    /// (both ends inclusive, as RFC 5280 defines it).
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> Result<bool, Error> {
        let (not_before, not_after) = self.validity()?;
        Ok(not_before <= now && now <= not_after)
    }

    pub fn subject(&self) -> String {
        self.cert.tbs_certificate.subject.to_string()
    }

    pub fn issuer(&self) -> String {
        self.cert.tbs_certificate.issuer.to_string()
    }

    pub fn serial_hex(&self) -> String {
        self.cert
            .tbs_certificate
            .serial_number
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Summarize the certificate as seen at `now`.
    pub fn summary(&self, now: DateTime<Utc>) -> Result<CertificateSummary, Error> {
        let (not_before, not_after) = self.validity()?;
        Ok(CertificateSummary {
            subject: self.subject(),
            issuer: self.issuer(),
            serial: self.serial_hex(),
            not_before,
            not_after,
            within_validity: not_before <= now && now <= not_after,
        })
    }
}

fn to_chrono(t: &x509_cert::time::Time) -> Result<DateTime<Utc>, Error> {
    let since_epoch = t.to_unix_duration();
    let secs = i64::try_from(since_epoch.as_secs())
        .map_err(|_| Error::Certificate("certificate time out of range".into()))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| Error::Certificate("certificate time out of range".into()))
}

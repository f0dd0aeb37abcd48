#![forbid(unsafe_code)]

//! Trust decisions for the embedded signer certificate.

use crate::certificate::SignerCertificate;
use crate::x509;
use chrono::{DateTime, Utc};
use islogin_core::Error;
use serde::{Deserialize, Serialize};

/// A certificate supplied by the relying party, serialized as PEM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrustedCertificate {
    der: Vec<u8>,
    /// Normalized PEM, encoded once on construction.
    pem: String,
}

impl TrustedCertificate {
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let cert = SignerCertificate::from_pem(pem)?;
        let der = cert.der().to_vec();
        let pem = pem_rfc7468::encode_string("CERTIFICATE", pem_rfc7468::LineEnding::LF, &der)
            .map_err(|e| Error::Certificate(format!("failed to encode PEM: {e}")))?;
        Ok(Self { der, pem })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> &str {
        &self.pem
    }

    fn decode(&self) -> Result<SignerCertificate, Error> {
        SignerCertificate::from_der(self.der.clone())
    }
}

impl TryFrom<String> for TrustedCertificate {
    type Error = Error;

    fn try_from(pem: String) -> Result<Self, Self::Error> {
        Self::from_pem(&pem)
    }
}

impl From<TrustedCertificate> for String {
    fn from(cert: TrustedCertificate) -> Self {
        cert.pem
    }
}

/// Which certificates may sign a login token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum TrustPolicy {
    /// Trust whatever certificate the token embeds.  The signature proves
    /// integrity only, not origin.
    #[default]
    EmbeddedCertificate,
    /// The embedded certificate must be byte-for-byte one of these.
    Pinned { certificates: Vec<TrustedCertificate> },
    /// The embedded certificate must chain to one of these anchors, using
    /// any further embedded certificates as intermediates.
    Chain { anchors: Vec<TrustedCertificate> },
}

impl TrustPolicy {
    /// Check the signer against the policy.  `now` bounds the validity of
    /// chain issuers.
    pub fn check(
        &self,
        signer: &SignerCertificate,
        embedded_chain: &[SignerCertificate],
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        match self {
            Self::EmbeddedCertificate => Ok(()),
            Self::Pinned { certificates } => {
                if certificates.iter().any(|c| c.der() == signer.der()) {
                    Ok(())
                } else {
                    Err(Error::Untrusted(format!(
                        "signer {} is not a pinned certificate",
                        signer.subject()
                    )))
                }
            }
            Self::Chain { anchors } => {
                let anchors = anchors
                    .iter()
                    .map(TrustedCertificate::decode)
                    .collect::<Result<Vec<_>, _>>()?;
                x509::validate_cert_chain(signer, embedded_chain, &anchors, now)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EmbeddedCertificate => "embedded-certificate",
            Self::Pinned { .. } => "pinned",
            Self::Chain { .. } => "chain",
        }
    }
}

/// What to do with a signer certificate used outside its validity window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateValidityPolicy {
    /// Report the condition and log a warning, but accept the signature.
    #[default]
    Flag,
    /// Treat the signature as invalid.
    Enforce,
}

#![forbid(unsafe_code)]

//! Verification context: trust settings and the instant of verification.

use chrono::{DateTime, Utc};
use islogin_keys::{CertificateValidityPolicy, TrustPolicy};

/// Context for one signature verification.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    /// Which signer certificates are acceptable.
    pub trust: TrustPolicy,
    /// How to treat a signer certificate outside its validity window.
    pub validity: CertificateValidityPolicy,
    /// Instant the certificate validity window is checked against.
    pub now: DateTime<Utc>,
}

impl VerifyContext {
    /// Trust the embedded certificate and flag out-of-window certificates.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            trust: TrustPolicy::default(),
            validity: CertificateValidityPolicy::default(),
            now,
        }
    }

    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_validity(mut self, validity: CertificateValidityPolicy) -> Self {
        self.validity = validity;
        self
    }
}

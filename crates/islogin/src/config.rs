#![forbid(unsafe_code)]

//! Verification settings.

use islogin_keys::{CertificateValidityPolicy, TrustPolicy};
use serde::{Deserialize, Serialize};

/// Settings of a [`Verifier`](crate::Verifier).  Every field has a default,
/// so a JSON document only names what it changes:
///
/// ```json
/// {
///   "audienceUrl": "https://thjonusta.example.is",
///   "trust": { "mode": "chain", "anchors": ["-----BEGIN CERTIFICATE-----..."] },
///   "clockSkewSecs": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct VerificationConfig {
    /// Check `NotBefore < now < NotOnOrAfter`.
    pub verify_dates: bool,
    /// The audience tokens must be issued for.  Verification fails while
    /// this is unset.
    pub audience_url: Option<String>,
    pub trust: TrustPolicy,
    pub certificate_validity: CertificateValidityPolicy,
    /// Tolerance applied to both ends of the time window.
    pub clock_skew_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            verify_dates: true,
            audience_url: None,
            trust: TrustPolicy::default(),
            certificate_validity: CertificateValidityPolicy::default(),
            clock_skew_secs: 0,
        }
    }
}

impl VerificationConfig {
    /// Defaults with the given audience.
    pub fn new(audience_url: impl Into<String>) -> Self {
        Self {
            audience_url: Some(audience_url.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_verify_dates(mut self, verify_dates: bool) -> Self {
        self.verify_dates = verify_dates;
        self
    }

    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_certificate_validity(mut self, policy: CertificateValidityPolicy) -> Self {
        self.certificate_validity = policy;
        self
    }

    pub fn with_clock_skew_secs(mut self, secs: u64) -> Self {
        self.clock_skew_secs = secs;
        self
    }
}

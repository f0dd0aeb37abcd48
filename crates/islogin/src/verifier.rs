#![forbid(unsafe_code)]

//! The verification pipeline.
//!
//! Processing order, each step short-circuiting:
//! 1. Decode the base64 token
//! 2. Parse the SAML `Response`
//! 3. Verify the XML signature and apply the trust policy
//! 4. Extract the claims
//! 5. Require a configured audience, then an exact audience match
//! 6. Check the time window when `verify_dates` is set

use crate::assertion::AssertionDocument;
use crate::claims::{self, UserProfile, ValidityWindow};
use crate::config::VerificationConfig;
use crate::decoder;
use crate::rejection::{ErrorKind, Rejection};
use chrono::{DateTime, Duration, Utc};
use islogin_dsig::VerifyContext;
use serde::Serialize;
use tracing::debug;

/// An accepted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub user: UserProfile,
    /// `Response/@Destination`, empty when absent or when the signature
    /// covers only the `Assertion`.
    pub destination: String,
    /// The configured audience the token matched.
    pub audience_url: String,
}

/// Verifies login tokens against a fixed configuration.
#[derive(Debug, Clone)]
pub struct Verifier {
    config: VerificationConfig,
}

impl Verifier {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Verify a token at the current instant.
    pub fn verify(&self, token: &str) -> Result<Accepted, Rejection> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current instant were `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Accepted, Rejection> {
        let xml = decoder::decode_token(token).map_err(Rejection::invalid_token)?;
        let document = AssertionDocument::parse(xml).map_err(Rejection::invalid_token)?;

        let ctx = VerifyContext::new(now)
            .with_trust(self.config.trust.clone())
            .with_validity(self.config.certificate_validity);
        let report = document.verify_signature(&ctx);
        if !report.is_valid {
            return Err(Rejection::new(ErrorKind::CertificateInvalid, report.detail));
        }
        debug!(detail = %report.detail, "token signature accepted");
        let response_signed = document.signs_response(&report);

        let user = claims::extract(&document);

        let audience_url = match self.config.audience_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => return Err(Rejection::from_kind(ErrorKind::AudienceUrlMissing)),
        };
        if audience_url != document.conditions.audience {
            debug!(expected = audience_url, actual = %document.conditions.audience, "audience mismatch");
            return Err(Rejection::from_kind(ErrorKind::AudienceUrlNotMatching));
        }

        if self.config.verify_dates && !self.within_window(&user.date, now) {
            debug!(%now, window = ?user.date, "token outside its validity window");
            return Err(Rejection::from_kind(ErrorKind::LoginRequestExpired));
        }

        let destination = if response_signed {
            document.destination
        } else {
            debug!(unsigned = %document.destination, "destination outside the signed assertion, dropped");
            String::new()
        };
        debug!(%destination, "token accepted");
        Ok(Accepted {
            user,
            destination,
            audience_url: audience_url.to_owned(),
        })
    }

    /// `not_before - skew < now < not_on_or_after + skew`.  A missing bound
    /// never matches.
    fn within_window(&self, window: &ValidityWindow, now: DateTime<Utc>) -> bool {
        let skew = i64::try_from(self.config.clock_skew_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        match (window.not_before, window.not_on_or_after) {
            (Some(not_before), Some(not_on_or_after)) => {
                let opens = not_before.checked_sub_signed(skew).map_or(true, |start| start < now);
                let closes = not_on_or_after.checked_add_signed(skew).map_or(true, |end| now < end);
                opens && closes
            }
            _ => false,
        }
    }
}

#![forbid(unsafe_code)]

//! Why a token was refused.

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Rejection categories.  Each has a stable wire identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The token is not base64, not UTF-8, not XML, or lacks a required
    /// element.
    InvalidTokenXml,
    /// The signature, its certificate or the trust policy failed.
    CertificateInvalid,
    /// No audience was configured.
    AudienceUrlMissing,
    /// The token was issued for another audience.
    AudienceUrlNotMatching,
    /// The token is outside its validity window.
    LoginRequestExpired,
}

impl ErrorKind {
    pub fn id(&self) -> &'static str {
        match self {
            Self::InvalidTokenXml => "INVALID-TOKEN-XML",
            Self::CertificateInvalid => "CERTIFICATE-INVALID",
            Self::AudienceUrlMissing => "AUDIENCEURL-MISSING",
            Self::AudienceUrlNotMatching => "AUDIENCEURL-NOT-MATCHING",
            Self::LoginRequestExpired => "LOGIN-REQUEST-EXPIRED",
        }
    }

    /// The fixed reason text for the kind.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidTokenXml => "Invalid login token - cannot parse XML from Island.is.",
            Self::CertificateInvalid => "The XML signature of the login token is not valid.",
            Self::AudienceUrlMissing => {
                "You must provide an 'audienceUrl' in the options when calling the constructor function."
            }
            Self::AudienceUrlNotMatching => "The AudienceUrl you provide must match data from Island.is.",
            Self::LoginRequestExpired => "Login request has expired.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A refused token.  Serializes as `{"id": ..., "reason": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{detail}")]
pub struct Rejection {
    pub kind: ErrorKind,
    pub detail: String,
}

impl Rejection {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// A rejection carrying the kind's fixed reason.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.reason())
    }

    /// The token could not be read; `cause` says where it broke.
    pub fn invalid_token(cause: impl std::fmt::Display) -> Self {
        let kind = ErrorKind::InvalidTokenXml;
        Self::new(kind, format!("{} ({cause})", kind.reason()))
    }
}

impl Serialize for Rejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Rejection", 2)?;
        state.serialize_field("id", self.kind.id())?;
        state.serialize_field("reason", &self.detail)?;
        state.end()
    }
}

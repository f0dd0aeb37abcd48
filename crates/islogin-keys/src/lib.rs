#![forbid(unsafe_code)]

//! Certificate handling for login-token verification.
//!
//! Decodes the signer certificate embedded in a token, extracts its public
//! key and validity window, validates certificate chains and applies the
//! configured trust policy.

pub mod certificate;
pub mod trust;
pub mod x509;

pub use certificate::{CertificateSummary, SignerCertificate};
pub use trust::{CertificateValidityPolicy, TrustPolicy, TrustedCertificate};

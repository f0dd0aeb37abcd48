#![forbid(unsafe_code)]

//! XML Digital Signature verification for Island.is login tokens.
//!
//! Verifies a single enveloped signature against the certificate embedded
//! in its `KeyInfo`, then applies the configured trust and certificate
//! validity policies.  Every failure is folded into a [`SignatureReport`].

pub mod context;
pub mod verify;

pub use context::VerifyContext;
pub use verify::{verify, verify_signature, SignatureReport};

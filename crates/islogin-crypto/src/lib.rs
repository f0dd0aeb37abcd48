#![forbid(unsafe_code)]

//! Cryptographic algorithms for login-token signature verification.
//!
//! Maps XML-DSig algorithm URIs to digest implementations and to
//! verify-only signature implementations.  Nothing here signs.

pub mod digest;
pub mod verify;

pub use digest::DigestAlgorithm;
pub use verify::{PublicKey, SignatureAlgorithm};

#![forbid(unsafe_code)]

//! Core types shared by the Island.is login verifier crates.
//!
//! Holds the common [`Error`] type, algorithm URIs that may appear in
//! `Algorithm` attributes, and the namespace and element names used to walk
//! a signed SAML response.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};

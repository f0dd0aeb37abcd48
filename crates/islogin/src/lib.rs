#![forbid(unsafe_code)]

//! Verify Island.is SAML login tokens.
//!
//! A token is a base64-encoded SAML 2.0 `Response`.  [`Verifier::verify`]
//! decodes it, checks its enveloped XML signature, extracts the user
//! claims and applies the audience and time-window policy:
//!
//! ```no_run
//! use islogin::{VerificationConfig, Verifier};
//!
//! let verifier = Verifier::new(VerificationConfig::new("https://thjonusta.example.is"));
//! # let token = "";
//! match verifier.verify(token) {
//!     Ok(accepted) => println!("logged in: {}", accepted.user.kennitala),
//!     Err(rejection) => eprintln!("{}: {rejection}", rejection.kind.id()),
//! }
//! ```

pub mod assertion;
pub mod claims;
pub mod config;
pub mod decoder;
pub mod rejection;
pub mod verifier;

pub use assertion::AssertionDocument;
pub use claims::{UserProfile, ValidityWindow};
pub use config::VerificationConfig;
pub use rejection::{ErrorKind, Rejection};
pub use verifier::{Accepted, Verifier};

pub use islogin_c14n as c14n;
pub use islogin_core as core;
pub use islogin_crypto as crypto;
pub use islogin_dsig as dsig;
pub use islogin_keys as keys;
pub use islogin_transforms as transforms;
pub use islogin_xml as xml;

#![forbid(unsafe_code)]

//! Reference transforms for signed login tokens.
//!
//! Only the transforms a SAML response signature uses are supported: the
//! enveloped-signature transform and the canonicalization methods.

pub mod enveloped;
pub mod pipeline;

pub use enveloped::EnvelopedSignatureTransform;
pub use pipeline::{C14nTransform, Transform, TransformData, TransformPipeline};

use islogin_c14n::C14nMode;
use islogin_core::{algorithm, Error};

/// Build a transform from its `Algorithm` URI.
///
/// `signature` is the `Signature` element that owns the reference, needed
/// by the enveloped transform.
pub fn from_uri(
    uri: &str,
    signature: roxmltree::NodeId,
    inclusive_prefixes: Vec<String>,
) -> Result<Box<dyn Transform>, Error> {
    if uri == algorithm::ENVELOPED_SIGNATURE {
        return Ok(Box::new(EnvelopedSignatureTransform::new(signature)));
    }
    match C14nMode::from_uri(uri) {
        Some(mode) => Ok(Box::new(C14nTransform::new(mode, inclusive_prefixes))),
        None => Err(Error::UnsupportedAlgorithm(format!("transform: {uri}"))),
    }
}

#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the `Signature` element that owns the reference from the node
//! set, so the signature does not cover itself.

use crate::pipeline::{Transform, TransformData};
use islogin_core::{algorithm, Error};

pub struct EnvelopedSignatureTransform {
    signature: roxmltree::NodeId,
}

impl EnvelopedSignatureTransform {
    /// Create for the `Signature` element with the given node ID.
    pub fn new(signature: roxmltree::NodeId) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute(&self, doc: &roxmltree::Document<'_>, input: TransformData) -> Result<TransformData, Error> {
        match input {
            TransformData::Xml(mut node_set) => {
                let signature = doc
                    .get_node(self.signature)
                    .ok_or_else(|| Error::Transform("Signature node not found".into()))?;
                node_set.remove_subtree(signature);
                Ok(TransformData::Xml(node_set))
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}

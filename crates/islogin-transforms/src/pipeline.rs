#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use islogin_c14n::C14nMode;
use islogin_core::Error;
use islogin_xml::NodeSet;

/// Data flowing through the transform pipeline.
#[derive(Debug, Clone)]
pub enum TransformData {
    /// A node set over the document being verified.
    Xml(NodeSet),
    /// Raw octets.
    Binary(Vec<u8>),
}

impl TransformData {
    /// Convert to octets.  A node set left at the end of the pipeline is
    /// serialized with inclusive C14N without comments.
    pub fn into_binary(self, doc: &roxmltree::Document<'_>) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml(node_set) => {
                islogin_c14n::canonicalize_doc(doc, C14nMode::Inclusive, Some(&node_set), &[])
            }
        }
    }
}

/// Trait for individual transforms.
pub trait Transform: Send {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform over `doc`.
    fn execute(&self, doc: &roxmltree::Document<'_>, input: TransformData) -> Result<TransformData, Error>;
}

/// A pipeline of transforms executed in sequence.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform to the pipeline.
    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Execute all transforms in order and return the octets to digest.
    pub fn execute(&self, doc: &roxmltree::Document<'_>, input: TransformData) -> Result<Vec<u8>, Error> {
        let mut data = input;
        for transform in &self.transforms {
            data = transform.execute(doc, data)?;
        }
        data.into_binary(doc)
    }

    /// Algorithm URIs in execution order.
    pub fn uris(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.uri()).collect()
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute(&self, doc: &roxmltree::Document<'_>, input: TransformData) -> Result<TransformData, Error> {
        let bytes = match input {
            TransformData::Xml(node_set) => {
                islogin_c14n::canonicalize_doc(doc, self.mode, Some(&node_set), &self.inclusive_prefixes)?
            }
            TransformData::Binary(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                islogin_c14n::canonicalize(text, self.mode, None, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}

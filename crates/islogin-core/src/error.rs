#![forbid(unsafe_code)]

/// Errors produced while decoding, canonicalizing and verifying a login token.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("digest mismatch for reference: {0}")]
    DigestMismatch(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("untrusted certificate: {0}")]
    Untrusted(String),
}

impl Error {
    /// True for errors raised while reading the document structure, as
    /// opposed to errors raised by the cryptographic checks.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::XmlParse(_)
                | Error::XmlStructure(_)
                | Error::MissingElement(_)
                | Error::MissingAttribute(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

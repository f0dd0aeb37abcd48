#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for signed login tokens.
//!
//! Implements the four W3C variants a SAML signature may name:
//! - Canonical XML 1.0 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod escape;
pub mod exclusive;
pub mod inclusive;
pub mod qname;
pub mod render;

use islogin_core::{algorithm, Error};
use islogin_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    /// Like [`C14nMode::from_uri`] but reports an unknown URI as an error.
    pub fn require(uri: &str) -> Result<Self, Error> {
        Self::from_uri(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("canonicalization: {uri}")))
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// Canonicalize raw XML text.
///
/// - `xml`: the raw XML text
/// - `mode`: which C14N variant to use
/// - `node_set`: optional node set (for document-subset canonicalization)
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = roxmltree::Document::parse_with_options(xml, islogin_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Canonicalize a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    match mode {
        C14nMode::Inclusive | C14nMode::InclusiveWithComments => {
            inclusive::canonicalize(doc, mode.with_comments(), node_set)
        }
        C14nMode::Exclusive | C14nMode::ExclusiveWithComments => {
            exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
        }
    }
}

/// Canonicalize the subtree rooted at `node` (comments dropped unless the
/// mode keeps them).  This is how `SignedInfo` is canonicalized before the
/// signature check.
pub fn canonicalize_subtree(
    doc: &roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let set = if mode.with_comments() {
        NodeSet::tree_with_comments(node)
    } else {
        NodeSet::tree_without_comments(node)
    };
    canonicalize_doc(doc, mode, Some(&set), inclusive_prefixes)
}

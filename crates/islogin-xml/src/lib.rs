#![forbid(unsafe_code)]

//! XML document abstraction for the Island.is login verifier.
//!
//! Provides an owned document over `roxmltree`, the structural lookups the
//! assertion parser and signature verifier share, and the `NodeSet` used
//! for document-subset canonicalization.

pub mod document;
pub mod nodeset;
pub mod xpath;

pub use document::XmlDocument;
pub use nodeset::NodeSet;

/// Return the roxmltree parsing options used for every token.
///
/// DTDs are refused outright.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: false,
        ..roxmltree::ParsingOptions::default()
    }
}

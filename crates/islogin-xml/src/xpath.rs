#![forbid(unsafe_code)]

//! Same-document reference resolution.
//!
//! Only the reference forms a signed login token uses are supported:
//! - `#id-value`, a bare-name pointer resolved through the ID map
//! - `#xpointer(id('id-value'))`, the equivalent XPointer form
//!
//! Anything else, including an empty URI and external URIs, is refused.

use islogin_core::Error;
use std::collections::HashMap;

/// Parse a same-document reference (e.g., `#foo` → `foo`).
///
/// Returns `None` for external or whole-document references.
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    let fragment = uri.strip_prefix('#')?;
    let id = parse_xpointer_id(fragment).unwrap_or(fragment);
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Parse an `xpointer(id('...'))` expression and return the ID value.
pub fn parse_xpointer_id(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix("xpointer(id(")?.strip_suffix("))")?;
    inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

/// Resolve an ID value in a parsed document using a pre-built ID map.
pub fn resolve_id<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    id_map: &HashMap<String, roxmltree::NodeId>,
    id: &str,
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    id_map
        .get(id)
        .and_then(|nid| doc.get_node(*nid))
        .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))
}

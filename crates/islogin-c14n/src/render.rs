#![forbid(unsafe_code)]

//! Shared rendering of namespace declarations and attributes.

use crate::escape::{self, Context};
use std::cmp::Ordering;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    /// The namespace URI.
    pub uri: String,
}

impl NsDecl {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    /// Append ` xmlns[:prefix]="uri"` to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b" xmlns");
        if !self.prefix.is_empty() {
            out.push(b':');
            out.extend_from_slice(self.prefix.as_bytes());
        }
        out.extend_from_slice(b"=\"");
        escape::escape_into(out, &self.uri, Context::Attribute);
        out.push(b'"');
    }
}

// Default namespace first, then by prefix.
impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: String,
    pub local_name: String,
    /// The qualified name (prefix:local or just local).
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    /// Append ` qname="value"` to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        escape::escape_into(out, &self.value, Context::Attribute);
        out.push(b'"');
    }
}

// Unqualified attributes first, then by (namespace URI, local name).
impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then_with(|| self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Write a complete start tag: `<name ns-decls attrs>`.
pub fn write_start_tag(out: &mut Vec<u8>, name: &str, ns_decls: &[NsDecl], attrs: &[Attr]) {
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for decl in ns_decls {
        decl.write_to(out);
    }
    for attr in attrs {
        attr.write_to(out);
    }
    out.push(b'>');
}

/// Write an end tag: `</name>`.
pub fn write_end_tag(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(name.as_bytes());
    out.push(b'>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(ns: &str, local: &str, qname: &str) -> Attr {
        Attr {
            ns_uri: ns.into(),
            local_name: local.into(),
            qualified_name: qname.into(),
            value: "v".into(),
        }
    }

    #[test]
    fn attribute_order() {
        let mut attrs = vec![
            attr("urn:b", "a", "b:a"),
            attr("", "Version", "Version"),
            attr("urn:a", "z", "a:z"),
            attr("", "ID", "ID"),
        ];
        attrs.sort();
        let names: Vec<_> = attrs.iter().map(|a| a.qualified_name.as_str()).collect();
        assert_eq!(names, ["ID", "Version", "a:z", "b:a"]);
    }

    #[test]
    fn namespace_order_and_rendering() {
        let mut decls = vec![NsDecl::new("saml", "urn:s"), NsDecl::new("", "urn:d"), NsDecl::new("ds", "urn:x")];
        decls.sort();
        let mut out = Vec::new();
        write_start_tag(&mut out, "e", &decls, &[]);
        write_end_tag(&mut out, "e");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<e xmlns="urn:d" xmlns:ds="urn:x" xmlns:saml="urn:s"></e>"#
        );
    }
}

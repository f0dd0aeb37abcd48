#![forbid(unsafe_code)]

//! XML document wrapper over roxmltree with ID attribute registration.

use islogin_core::{ns, Error};
use std::collections::HashMap;

/// An owned XML document.  Stores the text exactly as received.
///
/// To work with the parsed tree, call [`XmlDocument::parse_doc`] which
/// returns a temporary `roxmltree::Document` borrowing from the text.
/// The text is never re-serialized, so signature checks run over the
/// bytes the issuer produced.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    /// Parse and validate XML from a string, taking ownership.
    pub fn parse(text: String) -> Result<Self, Error> {
        roxmltree::Document::parse_with_options(&text, crate::parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))?;
        Ok(Self { text })
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse the document and return a temporary `roxmltree::Document`.
    ///
    /// Call this once at the top of a processing step and pass the
    /// resulting document down through the call chain.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        roxmltree::Document::parse_with_options(&self.text, crate::parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))
    }
}

/// Build the ID → NodeId mapping for a parsed document.
///
/// Every value of an `ID`, `Id` or `id` attribute is registered.  A value
/// carried by two different elements is an error.
pub fn build_id_map(doc: &roxmltree::Document<'_>) -> Result<HashMap<String, roxmltree::NodeId>, Error> {
    let mut map = HashMap::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        for attr_name in ns::attr::ID_ATTRS {
            if let Some(val) = node.attribute(attr_name) {
                if let Some(previous) = map.insert(val.to_owned(), node.id()) {
                    if previous != node.id() {
                        return Err(Error::XmlStructure(format!("duplicate ID value: {val}")));
                    }
                }
            }
        }
    }
    Ok(map)
}

/// True when `node` is an element with the given namespace and local name.
pub fn is_element_named(node: roxmltree::Node<'_, '_>, ns_uri: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns_uri
}

/// Find the first child element with the given namespace and local name.
pub fn find_child_element<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent.children().find(|n| is_element_named(*n, ns_uri, local_name))
}

/// Find all child elements with the given namespace and local name.
pub fn find_child_elements<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| is_element_named(*n, ns_uri, local_name))
        .collect()
}

/// Find the single required child element, failing when it is absent or
/// repeated.
pub fn require_single_child<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    let mut matches = parent.children().filter(|n| is_element_named(*n, ns_uri, local_name));
    let first = matches
        .next()
        .ok_or_else(|| Error::MissingElement(local_name.to_owned()))?;
    if matches.next().is_some() {
        return Err(Error::XmlStructure(format!(
            "expected exactly one {local_name} under {}",
            parent.tag_name().name()
        )));
    }
    Ok(first)
}

/// Find the first required child element.
pub fn require_child<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    find_child_element(parent, ns_uri, local_name)
        .ok_or_else(|| Error::MissingElement(local_name.to_owned()))
}

/// Read a required attribute.
pub fn require_attribute<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Result<&'a str, Error> {
    node.attribute(name).ok_or_else(|| {
        Error::MissingAttribute(format!("{name} on {}", node.tag_name().name()))
    })
}

/// Concatenated text of an element with all whitespace removed.
///
/// Used for base64 payloads (`DigestValue`, `SignatureValue`,
/// `X509Certificate`) which issuers commonly wrap across lines.
pub fn collapsed_text(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .flat_map(|t| t.chars())
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_dtd() {
        let xml = r#"<!DOCTYPE r [<!ENTITY a "aaaa">]><r>&a;</r>"#;
        assert!(matches!(XmlDocument::parse(xml.into()), Err(Error::XmlParse(_))));
    }

    #[test]
    fn text_is_kept_verbatim() {
        let xml = "<r  b='1'   a=\"2\">\r\n x </r>";
        let doc = XmlDocument::parse(xml.into()).unwrap();
        assert_eq!(doc.text(), xml);
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let xml = r#"<r><a ID="x"/><b ID="x"/></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        assert!(matches!(build_id_map(&doc), Err(Error::XmlStructure(_))));
    }

    #[test]
    fn id_map_registers_all_id_spellings() {
        let xml = r#"<r><a ID="one"/><b Id="two"/><c id="three"/></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let map = build_id_map(&doc).unwrap();
        assert_eq!(map.len(), 3);
        let node = doc.get_node(map["two"]).unwrap();
        assert_eq!(node.tag_name().name(), "b");
    }

    #[test]
    fn require_single_child_rejects_repeats() {
        let xml = r#"<r xmlns="urn:x"><a/><a/><b/></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let root = doc.root_element();
        assert!(require_single_child(root, "urn:x", "b").is_ok());
        assert!(matches!(require_single_child(root, "urn:x", "a"), Err(Error::XmlStructure(_))));
        assert!(matches!(require_single_child(root, "urn:x", "c"), Err(Error::MissingElement(_))));
        assert!(find_child_element(root, "urn:other", "a").is_none());
    }

    #[test]
    fn collapsed_text_strips_line_wrapping() {
        let xml = "<v>QUJD\n  REVG\r\n</v>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        assert_eq!(collapsed_text(doc.root_element()), "QUJDREVG");
    }
}

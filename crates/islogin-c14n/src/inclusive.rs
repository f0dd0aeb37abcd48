#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - Outputs every in-scope namespace declaration not already output by
//!   the nearest visible ancestor, sorted by prefix (default first)
//! - Outputs attributes sorted by (namespace-URI, local-name)
//! - Escapes text and attribute values
//! - Optionally preserves or strips comments
//! - Supports document-subset canonicalization via NodeSet

use crate::escape::{self, Context};
use crate::qname;
use crate::render::{self, Attr, NsDecl};
use islogin_core::{ns, Error};
use islogin_xml::NodeSet;
use roxmltree::{Node, NodeType};
use std::collections::BTreeMap;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let ctx = C14nContext {
        with_comments,
        node_set,
    };
    let mut output = Vec::new();
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

/// Write a comment or PI, adding the line breaks that separate top-level
/// nodes from the document element.
pub(crate) fn write_top_level(node: Node<'_, '_>, output: &mut Vec<u8>, write: impl FnOnce(&mut Vec<u8>)) {
    let top_level = node.parent().is_some_and(|p| p.node_type() == NodeType::Root);
    if top_level && node.prev_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }
    write(output);
    if top_level && node.next_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }
}

/// Write `<?target data?>`.
pub(crate) fn write_pi(node: Node<'_, '_>, output: &mut Vec<u8>) {
    if let Some(pi) = node.pi() {
        output.extend_from_slice(b"<?");
        output.extend_from_slice(pi.target.as_bytes());
        if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
            output.push(b' ');
            escape::escape_into(output, value, Context::ProcessingInstruction);
        }
        output.extend_from_slice(b"?>");
    }
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(node))
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, inherited_ns)?;
                }
            }
            NodeType::Element => self.process_element(node, output, inherited_ns)?,
            NodeType::Text => {
                if self.is_visible(&node) {
                    escape::escape_into(output, node.text().unwrap_or(""), Context::Text);
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    write_top_level(node, output, |out| {
                        out.extend_from_slice(b"<!--");
                        out.extend_from_slice(node.text().unwrap_or("").as_bytes());
                        out.extend_from_slice(b"-->");
                    });
                }
            }
            NodeType::PI => {
                if self.is_visible(&node) {
                    write_top_level(node, output, |out| write_pi(node, out));
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            for child in node.children() {
                self.process_node(child, output, inherited_ns)?;
            }
            return Ok(());
        }

        let current_ns = qname::inscope_namespaces(&node);
        let mut ns_decls: Vec<NsDecl> = current_ns
            .iter()
            .filter(|(prefix, uri)| inherited_ns.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl::new(prefix.as_str(), uri.as_str()))
            .collect();
        if !current_ns.contains_key("") && inherited_ns.get("").is_some_and(|u| !u.is_empty()) {
            ns_decls.push(NsDecl::new("", ""));
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = node
            .attributes()
            .map(|attr| Attr {
                ns_uri: attr.namespace().unwrap_or("").to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name: qname::attribute_qname(&node, &attr),
                value: attr.value().to_owned(),
            })
            .collect();

        // xml:* attributes are inherited from ancestors when the parent
        // element is outside the node set.
        if self.node_set.is_some() {
            let parent_hidden = node
                .parent()
                .map_or(true, |p| !p.is_element() || !self.is_visible(&p));
            if parent_hidden {
                let extra = inherited_xml_attrs(&node, &attrs);
                attrs.extend(extra);
            }
        }
        attrs.sort();

        let elem_name = qname::element_qname(&node);
        render::write_start_tag(output, &elem_name, &ns_decls, &attrs);

        let mut child_ns = inherited_ns.clone();
        for decl in &ns_decls {
            child_ns.insert(decl.prefix.clone(), decl.uri.clone());
        }
        for child in node.children() {
            self.process_node(child, output, &child_ns)?;
        }

        render::write_end_tag(output, &elem_name);
        Ok(())
    }
}

/// Collect `xml:*` attributes from all ancestors (nearest wins), minus the
/// ones the element already carries.
fn inherited_xml_attrs(node: &Node<'_, '_>, existing: &[Attr]) -> Vec<Attr> {
    let mut inherited: BTreeMap<String, String> = BTreeMap::new();
    for ancestor in node.ancestors().filter(|a| a.is_element()) {
        for attr in ancestor.attributes().filter(|a| a.namespace() == Some(ns::XML)) {
            inherited
                .entry(attr.name().to_owned())
                .or_insert_with(|| attr.value().to_owned());
        }
    }
    inherited
        .into_iter()
        .filter(|(name, _)| {
            !existing
                .iter()
                .any(|a| a.ns_uri == ns::XML && a.local_name == *name)
        })
        .map(|(name, value)| Attr {
            ns_uri: ns::XML.to_owned(),
            qualified_name: format!("xml:{name}"),
            local_name: name,
            value,
        })
        .collect()
}

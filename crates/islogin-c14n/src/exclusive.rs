#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Only "visibly utilized" namespace declarations are output.  A namespace
//! is visibly utilized by an element if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList.
//!
//! A declaration is emitted only when the nearest output ancestor did not
//! already render the same binding.

use crate::escape::{self, Context};
use crate::qname;
use crate::render::{self, Attr, NsDecl};
use islogin_core::Error;
use islogin_xml::NodeSet;
use roxmltree::{Node, NodeType};
use std::collections::{BTreeMap, BTreeSet};

/// Canonicalize using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let prefixes = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes: prefixes,
    };
    let mut output = Vec::new();
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    /// PrefixList entries, `#default` mapped to `""`.
    inclusive_prefixes: BTreeSet<String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |ns| ns.contains(node))
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns)?;
                }
            }
            NodeType::Element => self.process_element(node, output, rendered_ns)?,
            NodeType::Text => {
                if self.is_visible(&node) {
                    escape::escape_into(output, node.text().unwrap_or(""), Context::Text);
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    crate::inclusive::write_top_level(node, output, |out| {
                        out.extend_from_slice(b"<!--");
                        out.extend_from_slice(node.text().unwrap_or("").as_bytes());
                        out.extend_from_slice(b"-->");
                    });
                }
            }
            NodeType::PI => {
                if self.is_visible(&node) {
                    crate::inclusive::write_top_level(node, output, |out| {
                        crate::inclusive::write_pi(node, out);
                    });
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Namespace declarations are only rendered on visible start
            // tags; descendants keep the nearest output ancestor's context.
            for child in node.children() {
                self.process_node(child, output, rendered_ns)?;
            }
            return Ok(());
        }

        let mut utilized: BTreeSet<String> = self.inclusive_prefixes.clone();
        utilized.insert(qname::element_prefix(&node).to_owned());

        let mut attrs: Vec<Attr> = Vec::new();
        for attr in node.attributes() {
            let prefix = qname::attribute_prefix(&node, &attr);
            if let Some(p) = &prefix {
                utilized.insert(p.clone());
            }
            attrs.push(Attr {
                ns_uri: attr.namespace().unwrap_or("").to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name: match prefix {
                    Some(p) if !p.is_empty() => format!("{p}:{}", attr.name()),
                    _ => attr.name().to_owned(),
                },
                value: attr.value().to_owned(),
            });
        }
        attrs.sort();

        let inscope = qname::inscope_namespaces(&node);
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in utilized.iter().filter(|p| p.as_str() != "xml") {
            match inscope.get(prefix) {
                Some(uri) if rendered_ns.get(prefix) != Some(uri) => {
                    ns_decls.push(NsDecl::new(prefix.as_str(), uri.as_str()));
                }
                Some(_) => {}
                None if prefix.is_empty() => {
                    // The default namespace is now empty but an output
                    // ancestor rendered a non-empty one.
                    if rendered_ns.get("").is_some_and(|uri| !uri.is_empty()) {
                        ns_decls.push(NsDecl::new("", ""));
                    }
                }
                None => {}
            }
        }
        ns_decls.sort();

        let elem_name = qname::element_qname(&node);
        render::write_start_tag(output, &elem_name, &ns_decls, &attrs);

        let mut child_rendered_ns = rendered_ns.clone();
        for decl in &ns_decls {
            child_rendered_ns.insert(decl.prefix.clone(), decl.uri.clone());
        }
        for child in node.children() {
            self.process_node(child, output, &child_rendered_ns)?;
        }

        render::write_end_tag(output, &elem_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exc(xml: &str, prefixes: &[&str]) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let prefixes: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
        String::from_utf8(canonicalize(&doc, false, None, &prefixes).unwrap()).unwrap()
    }

    #[test]
    fn unused_namespaces_are_dropped() {
        let xml = r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><a:c/></r>"#;
        assert_eq!(exc(xml, &[]), r#"<r><a:c xmlns:a="urn:a"></a:c></r>"#);
    }

    #[test]
    fn namespace_pushed_down_to_each_user() {
        let xml = r#"<r xmlns:s="urn:s"><s:a/><s:b/></r>"#;
        assert_eq!(
            exc(xml, &[]),
            r#"<r><s:a xmlns:s="urn:s"></s:a><s:b xmlns:s="urn:s"></s:b></r>"#
        );
    }

    #[test]
    fn rendered_binding_is_not_repeated() {
        let xml = r#"<s:r xmlns:s="urn:s"><s:a xmlns:s="urn:s"/></s:r>"#;
        assert_eq!(exc(xml, &[]), r#"<s:r xmlns:s="urn:s"><s:a></s:a></s:r>"#);
    }

    #[test]
    fn attribute_prefix_is_utilized() {
        let xml = r#"<v xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xs="urn:xs" xsi:type="xs:string">x</v>"#;
        assert_eq!(
            exc(xml, &[]),
            r#"<v xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="xs:string">x</v>"#
        );
        assert_eq!(
            exc(xml, &["xs"]),
            r#"<v xmlns:xs="urn:xs" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="xs:string">x</v>"#
        );
    }

    #[test]
    fn default_namespace_undeclared_under_output_ancestor() {
        let xml = r#"<r xmlns="urn:d"><c xmlns=""/></r>"#;
        assert_eq!(exc(xml, &[]), r#"<r xmlns="urn:d"><c xmlns=""></c></r>"#);
    }

    #[test]
    fn subset_excludes_removed_subtree() {
        let xml = r#"<r xmlns="urn:d" ID="x"><Sig xmlns="urn:sig"><V>1</V></Sig><a>t</a></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut set = NodeSet::tree_without_comments(doc.root_element());
        let sig = doc.root_element().first_element_child().unwrap();
        set.remove_subtree(sig);
        let out = canonicalize(&doc, false, Some(&set), &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<r xmlns="urn:d" ID="x"><a>t</a></r>"#
        );
    }

    #[test]
    fn comments_follow_mode() {
        let xml = "<r><!--c-->x</r>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let with = canonicalize(&doc, true, None, &[]).unwrap();
        let without = canonicalize(&doc, false, None, &[]).unwrap();
        assert_eq!(with, b"<r><!--c-->x</r>");
        assert_eq!(without, b"<r>x</r>");
    }
}

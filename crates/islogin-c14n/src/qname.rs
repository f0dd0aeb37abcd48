#![forbid(unsafe_code)]

//! Prefix recovery for elements and attributes.
//!
//! roxmltree resolves names to `(namespace, local)` pairs and drops the
//! prefix the document used.  Canonical output must reproduce the prefix,
//! so it is read back from the element's start tag in the input text.

use islogin_core::ns;

/// Return the start tag text (`<...>`) of an element.
fn start_tag<'a>(node: &roxmltree::Node<'a, '_>) -> &'a str {
    let input = node.document().input_text();
    let rest = &input[node.range().start..];
    let mut quote = None;
    for (i, ch) in rest.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return &rest[..=i],
            _ => {}
        }
    }
    rest
}

/// Split the start tag into the element qname and the attribute qnames,
/// in source order.  Namespace declarations are included.
fn start_tag_names<'a>(node: &roxmltree::Node<'a, '_>) -> (&'a str, Vec<&'a str>) {
    let tag = start_tag(node);
    let body = tag.strip_prefix('<').unwrap_or(tag);
    let is_delim = |c: char| c.is_ascii_whitespace() || c == '/' || c == '>' || c == '=';

    let name_end = body.find(is_delim).unwrap_or(body.len());
    let elem_qname = &body[..name_end];

    let mut attrs = Vec::new();
    let mut rest = &body[name_end..];
    loop {
        rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('>') {
            break;
        }
        let end = rest.find(is_delim).unwrap_or(rest.len());
        attrs.push(&rest[..end]);
        rest = &rest[end..];
        // Skip `= "value"`.
        let Some(open) = rest.find(['"', '\'']) else {
            break;
        };
        let q = rest.as_bytes()[open] as char;
        let after = &rest[open + 1..];
        let Some(close) = after.find(q) else {
            break;
        };
        rest = &after[close + 1..];
    }
    (elem_qname, attrs)
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Prefix of an element's tag name, `""` when unprefixed.
pub fn element_prefix<'a>(node: &roxmltree::Node<'a, '_>) -> &'a str {
    let (qname, _) = start_tag_names(node);
    split_qname(qname).0.unwrap_or("")
}

/// Qualified element name as written in the document.
pub fn element_qname(node: &roxmltree::Node<'_, '_>) -> String {
    match element_prefix(node) {
        "" => node.tag_name().name().to_owned(),
        prefix => format!("{prefix}:{}", node.tag_name().name()),
    }
}

/// Prefix of a namespaced attribute, `None` for unqualified attributes.
pub fn attribute_prefix(node: &roxmltree::Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> Option<String> {
    let ns_uri = attr.namespace()?;
    if ns_uri == ns::XML {
        return Some("xml".to_owned());
    }
    let (_, qnames) = start_tag_names(node);
    let from_source = qnames.into_iter().find_map(|q| match split_qname(q) {
        (Some("xmlns"), _) | (None, _) => None,
        (Some(prefix), local) => (local == attr.name()
            && node.lookup_namespace_uri(Some(prefix)) == Some(ns_uri))
        .then_some(prefix),
    });
    from_source
        .or_else(|| node.lookup_prefix(ns_uri))
        .map(str::to_owned)
}

/// Qualified attribute name as written in the document.
pub fn attribute_qname(node: &roxmltree::Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> String {
    match attribute_prefix(node, attr) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", attr.name()),
        _ => attr.name().to_owned(),
    }
}

/// All namespace bindings in scope at `node`, keyed by prefix (`""` for
/// the default namespace).  The implicit `xml` binding is left out.
pub fn inscope_namespaces(node: &roxmltree::Node<'_, '_>) -> std::collections::BTreeMap<String, String> {
    node.namespaces()
        .filter(|ns| ns.name() != Some("xml") && !ns.uri().is_empty())
        .map(|ns| (ns.name().unwrap_or("").to_owned(), ns.uri().to_owned()))
        .collect()
}

#![forbid(unsafe_code)]

//! Character escaping for canonical output.
//!
//! - Text nodes: `&` `<` `>` and carriage return
//! - Attribute values: `&` `<` `"` plus tab, line feed and carriage return
//! - PI data: carriage return only

/// Where an escaped string lands in the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Text,
    Attribute,
    ProcessingInstruction,
}

fn replacement(ch: char, ctx: Context) -> Option<&'static str> {
    match (ch, ctx) {
        ('\r', _) => Some("&#xD;"),
        (_, Context::ProcessingInstruction) => None,
        ('&', _) => Some("&amp;"),
        ('<', _) => Some("&lt;"),
        ('>', Context::Text) => Some("&gt;"),
        ('"', Context::Attribute) => Some("&quot;"),
        ('\t', Context::Attribute) => Some("&#x9;"),
        ('\n', Context::Attribute) => Some("&#xA;"),
        _ => None,
    }
}

/// Append `s` to `out`, escaped for `ctx`.
pub fn escape_into(out: &mut Vec<u8>, s: &str, ctx: Context) {
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        if let Some(rep) = replacement(ch, ctx) {
            out.extend_from_slice(s[start..i].as_bytes());
            out.extend_from_slice(rep.as_bytes());
            start = i + ch.len_utf8();
        }
    }
    out.extend_from_slice(s[start..].as_bytes());
}

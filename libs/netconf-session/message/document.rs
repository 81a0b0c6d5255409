//! Minimal structured-document support
//!
//! Message bodies are opaque XML documents. Only as much of the document is
//! inspected as negotiation needs: the root element name, and the text of a
//! few well-known elements of the hello message.

use crate::traits::{NetconfError, Result};
use std::fmt;

/// A protocol message carrying one complete document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetconfMessage {
    document: String,
}

impl NetconfMessage {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }

    /// Get the raw document text
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn into_document(self) -> String {
        self.document
    }

    /// Local name (without prefix) of the root element
    pub fn root_name(&self) -> Result<&str> {
        root_local_name(&self.document)
    }
}

impl fmt::Display for NetconfMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.document)
    }
}

/// Find the local name of the root element, skipping the prolog, comments
/// and doctype declarations.
pub(crate) fn root_local_name(document: &str) -> Result<&str> {
    let mut rest = document.trim_start_matches('\u{feff}').trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("<?") {
            rest = skip_past(after, "?>")?.trim_start();
        } else if let Some(after) = rest.strip_prefix("<!--") {
            rest = skip_past(after, "-->")?.trim_start();
        } else if let Some(after) = rest.strip_prefix("<!") {
            rest = skip_past(after, ">")?.trim_start();
        } else {
            break;
        }
    }

    let tag = rest
        .strip_prefix('<')
        .ok_or_else(|| malformed("document does not start with an element"))?;
    let name = tag_name(tag);
    if name.is_empty() {
        return Err(malformed("empty root element name"));
    }
    Ok(local_part(name))
}

/// Collect the text content of every element with the given local name.
///
/// Self-closing elements yield an empty string. Nested markup inside a
/// matching element is not supported and reported as malformed.
pub(crate) fn element_texts(document: &str, local_name: &str) -> Result<Vec<String>> {
    let mut texts = Vec::new();
    let mut rest = document;

    while let Some(start) = rest.find('<') {
        let tag = &rest[start + 1..];
        if tag.starts_with(['/', '?', '!']) {
            rest = tag;
            continue;
        }

        let name = tag_name(tag);
        let end_of_tag = tag
            .find('>')
            .ok_or_else(|| malformed(format!("unterminated start tag <{}", name)))?;

        if local_part(name) != local_name {
            rest = &tag[end_of_tag + 1..];
            continue;
        }

        if tag[..end_of_tag].ends_with('/') {
            texts.push(String::new());
            rest = &tag[end_of_tag + 1..];
            continue;
        }

        let body = &tag[end_of_tag + 1..];
        let close = body
            .find("</")
            .ok_or_else(|| malformed(format!("element <{}> is not closed", name)))?;
        let close_name = tag_name(&body[close + 2..]);
        if close_name != name {
            return Err(malformed(format!(
                "element <{}> closed by </{}>",
                name, close_name
            )));
        }

        let text = &body[..close];
        if text.contains('<') {
            return Err(malformed(format!("unexpected markup inside <{}>", name)));
        }
        texts.push(unescape(text.trim()));
        rest = &body[close + 2..];
    }

    Ok(texts)
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn skip_past<'a>(text: &'a str, terminator: &str) -> Result<&'a str> {
    text.find(terminator)
        .map(|i| &text[i + terminator.len()..])
        .ok_or_else(|| malformed(format!("missing '{}'", terminator)))
}

fn tag_name(tag: &str) -> &str {
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(tag.len());
    &tag[..end]
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn malformed(message: impl Into<String>) -> NetconfError {
    NetconfError::MalformedDocument(message.into())
}

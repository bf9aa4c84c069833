//! HTML5 parse/serialize adapter using html5ever
//!
//! The parser follows the WHATWG HTML5 tree-construction algorithm, so
//! unclosed tags, misnested markup and unknown elements all produce a tree
//! the same way a browser would build it. The rewritten tree is written back
//! out with html5ever's HTML serializer: text content and attribute values
//! are preserved, while whitespace inside tags, attribute quoting and
//! self-closing syntax are normalized.
//!
//! # Examples
//!
//! ```rust
//! use dom_optimiser::parser::{parse_document_str, serialize_document};
//!
//! let dom = parse_document_str("<p>Hello").expect("tolerant parse");
//! let html = serialize_document(&dom).expect("serializes");
//! assert_eq!(html, "<html><head></head><body><p>Hello</p></body></html>");
//! ```
//!
//! # Configuration
//!
//! - **Scripting**: Disabled (scripts are not executed)
//! - **Error Handling**: Parse errors are recovered, never surfaced
//! - **Tree Builder**: RcDom (strong child links, weak parent links)

use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{NodeData, RcDom, SerializableHandle};
use std::borrow::Cow;

use encoding_rs::Encoding;

use crate::charset::{
    decode_to_utf8, detect_charset, encode_from_utf8, has_unmappable, resolve_encoding,
};
use crate::dom::{effective_text, select_elements, tag_name};
use crate::error::OptimiseError;

/// Elements whose text the serializer writes without escaping
const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Parse a UTF-8 HTML document
///
/// # Errors
///
/// - `OptimiseError::InvalidInput`: input is empty
/// - `OptimiseError::ParseError`: the tree has no root element (not produced
///   by html5ever, which always synthesizes one)
pub fn parse_document_str(html: &str) -> Result<RcDom, OptimiseError> {
    if html.is_empty() {
        return Err(OptimiseError::InvalidInput(
            "HTML input is empty".to_string(),
        ));
    }

    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    ensure_usable(&dom)?;
    Ok(dom)
}

/// Decode HTML bytes to UTF-8 using the charset cascade
///
/// Returns the decoded text together with the encoding it was decoded from,
/// so the caller can re-encode the rewritten document the same way.
pub fn decode_input<'a>(
    html: &'a [u8],
    content_type: Option<&str>,
) -> Result<(Cow<'a, str>, &'static Encoding), OptimiseError> {
    if html.is_empty() {
        return Err(OptimiseError::InvalidInput(
            "HTML input is empty".to_string(),
        ));
    }

    let label = detect_charset(content_type, html);
    let encoding = resolve_encoding(&label)?;
    let text = decode_to_utf8(html, encoding)?;
    Ok((text, encoding))
}

/// Parse HTML bytes into a DOM tree with charset detection
///
/// # Errors
///
/// - `OptimiseError::EncodingError`: unsupported charset or bytes invalid for it
/// - `OptimiseError::InvalidInput`: input is empty
/// - `OptimiseError::ParseError`: no element could be built from the input
pub fn parse_html_with_charset(
    html: &[u8],
    content_type: Option<&str>,
) -> Result<RcDom, OptimiseError> {
    let (text, _) = decode_input(html, content_type)?;
    parse_document_str(&text)
}

/// Parse HTML bytes, relying on meta tags or defaulting to UTF-8
pub fn parse_html(html: &[u8]) -> Result<RcDom, OptimiseError> {
    parse_html_with_charset(html, None)
}

/// Serialize the whole document back to HTML text
///
/// # Errors
///
/// `OptimiseError::SerializationError` if the writer fails or the output is
/// not valid UTF-8. Callers must treat this as fatal for the call and fall
/// back to their original input rather than emit partial markup.
pub fn serialize_document(dom: &RcDom) -> Result<String, OptimiseError> {
    let mut buffer = Vec::new();
    let options = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    let root = SerializableHandle::from(dom.document.clone());

    serialize(&mut buffer, &root, options)
        .map_err(|e| OptimiseError::SerializationError(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| {
        OptimiseError::SerializationError(format!(
            "Serializer produced invalid UTF-8 at byte {}",
            e.utf8_error().valid_up_to()
        ))
    })
}

/// Serialize the document and encode it into `encoding`
///
/// Outside raw-text elements an unmappable character becomes a numeric
/// character reference. Inside `<script>`, `<style>` and the other raw-text
/// elements a reference would be taken literally, so such a character makes
/// the call fail instead.
///
/// # Errors
///
/// - `OptimiseError::EncodingError`: a raw-text element holds a character
///   `encoding` cannot represent
/// - `OptimiseError::SerializationError`: as for [`serialize_document`]
pub fn serialize_document_as(
    dom: &RcDom,
    encoding: &'static Encoding,
) -> Result<Vec<u8>, OptimiseError> {
    let raw_text = select_elements(dom, |node| {
        tag_name(node).is_some_and(|tag| RAW_TEXT_TAGS.contains(&tag))
    });
    for element in &raw_text {
        if has_unmappable(&effective_text(element), encoding) {
            return Err(OptimiseError::EncodingError(format!(
                "<{}> text is not representable in {}",
                tag_name(element).unwrap_or_default(),
                encoding.name()
            )));
        }
    }

    let output = serialize_document(dom)?;
    Ok(encode_from_utf8(&output, encoding))
}

/// Reject a tree without a root element
///
/// html5ever's tree builder always synthesizes `<html>`, so after a parse
/// this only fails if that stops holding.
fn ensure_usable(dom: &RcDom) -> Result<(), OptimiseError> {
    let has_element = dom
        .document
        .children
        .borrow()
        .iter()
        .any(|child| matches!(child.data, NodeData::Element { .. }));

    if has_element {
        Ok(())
    } else {
        Err(OptimiseError::ParseError(
            "Document has no root element".to_string(),
        ))
    }
}

//! Character encoding detection and transcoding for byte input
//!
//! Byte input goes through a three-level cascade before parsing:
//!
//! 1. **Content-Type header**: the `charset=` parameter, when the host knows it
//! 2. **HTML meta tags**: `<meta charset>` or `<meta http-equiv="Content-Type">`
//!    within the first 1024 bytes
//! 3. **Default**: UTF-8
//!
//! Decoding never substitutes replacement characters. A byte sequence that is
//! invalid for the resolved charset is reported as an encoding error so that
//! multi-byte characters are never silently corrupted.
//!
//! # Examples
//!
//! ```rust
//! use dom_optimiser::charset::detect_charset;
//!
//! let charset = detect_charset(Some("text/html; charset=iso-8859-1"), b"<html></html>");
//! assert_eq!(charset, "ISO-8859-1");
//!
//! let charset = detect_charset(None, b"<meta charset=\"utf-8\"><p>x</p>");
//! assert_eq!(charset, "UTF-8");
//! ```

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::error::OptimiseError;

/// Default charset when detection fails
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Maximum bytes to scan for meta charset tags
const META_SCAN_LIMIT: usize = 1024;

fn compiled<'a>(cell: &'a OnceLock<Option<Regex>>, pattern: &str) -> Option<&'a Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Detect the declared charset of an HTML payload
///
/// Returns the charset label upper-cased. Always returns a label, falling back
/// to [`DEFAULT_CHARSET`].
pub fn detect_charset(content_type: Option<&str>, html: &[u8]) -> String {
    content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(html))
        .map(|label| label.to_uppercase())
        .unwrap_or_else(|| DEFAULT_CHARSET.to_string())
}

/// Extract the `charset` parameter from a Content-Type header value
///
/// ```rust
/// use dom_optimiser::charset::charset_from_content_type;
///
/// assert_eq!(charset_from_content_type("text/html;charset=\"UTF-8\""), Some("UTF-8".to_string()));
/// assert_eq!(charset_from_content_type("text/html"), None);
/// ```
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    static PARAM: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = compiled(&PARAM, r#"(?i)charset\s*=\s*"?([^";,\s]+)"?"#)?;

    regex
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract a charset declared by a meta tag near the start of the document
pub fn charset_from_meta(html: &[u8]) -> Option<String> {
    let prefix = &html[..html.len().min(META_SCAN_LIMIT)];
    // Meta tags are ASCII, so a lossy view is enough to find them.
    let text = String::from_utf8_lossy(prefix);

    static META_CHARSET: OnceLock<Option<Regex>> = OnceLock::new();
    static META_HTTP_EQUIV: OnceLock<Option<Regex>> = OnceLock::new();

    let patterns = [
        (&META_CHARSET, r#"(?i)<meta\s+charset\s*=\s*["']?([^"';>\s]+)"#),
        (
            &META_HTTP_EQUIV,
            r#"(?i)<meta\s+http-equiv\s*=\s*["']?Content-Type["']?\s+content\s*=\s*["']?[^"'>]*charset\s*=\s*([^"';>\s]+)"#,
        ),
    ];

    patterns.into_iter().find_map(|(cell, pattern)| {
        compiled(cell, pattern)?
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Look up the encoding for a charset label
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, OptimiseError> {
    Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        OptimiseError::EncodingError(format!("Unsupported charset '{}' for HTML parsing", label))
    })
}

/// Decode bytes to UTF-8 text, rejecting malformed sequences
pub fn decode_to_utf8<'a>(
    html: &'a [u8],
    encoding: &'static Encoding,
) -> Result<Cow<'a, str>, OptimiseError> {
    if encoding == UTF_8 {
        return std::str::from_utf8(html).map(Cow::Borrowed).map_err(|e| {
            OptimiseError::EncodingError(format!(
                "Invalid UTF-8 at byte position {}: {}",
                e.valid_up_to(),
                e
            ))
        });
    }

    encoding
        .decode_without_bom_handling_and_without_replacement(html)
        .ok_or_else(|| {
            OptimiseError::EncodingError(format!(
                "Invalid byte sequence for charset '{}'",
                encoding.name()
            ))
        })
}

/// Encode UTF-8 text back into the document's charset
///
/// Characters the target charset cannot represent become HTML numeric
/// character references. Encodings without an output form (UTF-16) produce
/// UTF-8. References are not decoded inside raw-text elements such as
/// `<script>`; [`crate::parser::serialize_document_as`] refuses those.
pub fn encode_from_utf8(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return text.as_bytes().to_vec();
    }
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// Whether `encoding` cannot represent some character of `text`
pub fn has_unmappable(text: &str, encoding: &'static Encoding) -> bool {
    let (_, _, unmappable) = encoding.encode(text);
    unmappable
}

//! Comment stripping pass
//!
//! Every comment node goes, wherever it sits: `<head>`, `<body>`, before the
//! root element, or inside a template. Text inside `<script>` that looks
//! like a comment is script text, not a comment node, and is left alone.

use markup5ever_rcdom::RcDom;
use tracing::debug;

use crate::dom::{detach, select_comments};
use crate::error::OptimiseError;
use crate::optimiser::OptimiseContext;

/// Remove all comment nodes, returning how many were removed
pub fn strip_comments(dom: &RcDom, ctx: &mut OptimiseContext) -> Result<usize, OptimiseError> {
    let mut removed = 0;
    for comment in select_comments(dom).iter().rev() {
        ctx.increment_and_check()?;
        if detach(comment) {
            removed += 1;
        }
    }

    debug!(removed, "comment stripping finished");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_document_str, serialize_document};

    fn stripped(html: &str) -> (String, usize) {
        let dom = parse_document_str(html).expect("parse");
        let removed = strip_comments(&dom, &mut OptimiseContext::unbounded()).expect("no timeout");
        (serialize_document(&dom).expect("serialize"), removed)
    }

    #[test]
    fn test_comments_removed_everywhere() {
        let (html, removed) = stripped(
            "<!-- before --><html><head><!-- head --></head>\
             <body><!-- note --><p>Text<!-- inline --></p></body></html><!-- after -->",
        );
        assert_eq!(html, "<html><head></head><body><p>Text</p></body></html>");
        assert_eq!(removed, 5);
    }

    #[test]
    fn test_conditional_comment_removed() {
        let (html, removed) =
            stripped("<html><head><!--[if IE]><link rel=\"stylesheet\" href=\"ie.css\"><![endif]--></head><body></body></html>");
        assert!(!html.contains("<!--"));
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_script_text_untouched() {
        let script = "<script>var s = '<!-- not a node -->';</script>";
        let (html, removed) = stripped(&format!("<html><head>{script}</head><body></body></html>"));
        assert!(html.contains(script), "{html}");
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_template_comments_removed() {
        let (html, removed) = stripped("<template><!-- t --><p>x</p></template>");
        assert!(!html.contains("<!-- t -->"), "{html}");
        assert_eq!(removed, 1);
    }
}

//! Wrapper pruning pass
//!
//! The page builder nests content inside generic wrapper `<div>`s that carry
//! no styling of their own. This pass replaces each such wrapper with its
//! children, provided the safety predicate allows it.
//!
//! Candidates are selected by substring match on the `class` attribute and
//! handled innermost-first (reverse document order), so unwrapping a nested
//! wrapper never disturbs an ancestor that is still waiting its turn.

use markup5ever_rcdom::RcDom;
use tracing::{debug, trace};

use crate::dom::{class_contains, is_attached, select_elements, unwrap};
use crate::error::OptimiseError;
use crate::optimiser::OptimiseContext;
use crate::safety::PruneGuard;

/// Class fragments marking redundant builder wrappers
pub const WRAPPER_CLASSES: &[&str] = &[
    "elementor-column-wrap",
    "elementor-widget-wrap",
    "elementor-widget-container",
];

/// Unwrap every safe column, widget and widget-container wrapper
///
/// Returns the number of wrappers unwrapped.
pub fn prune_wrappers(
    dom: &RcDom,
    guard: &PruneGuard,
    ctx: &mut OptimiseContext,
) -> Result<usize, OptimiseError> {
    let unwrapped = unwrap_class_family(dom, WRAPPER_CLASSES, guard, ctx)?;
    debug!(unwrapped, "wrapper pruning finished");
    Ok(unwrapped)
}

/// Unwrap safe elements whose class contains any of `needles`
///
/// Each element is considered once, even when it matches several needles.
pub fn unwrap_class_family(
    dom: &RcDom,
    needles: &[&str],
    guard: &PruneGuard,
    ctx: &mut OptimiseContext,
) -> Result<usize, OptimiseError> {
    let candidates = select_elements(dom, |node| {
        needles.iter().any(|needle| class_contains(node, needle))
    });

    let mut unwrapped = 0;
    for node in candidates.iter().rev() {
        ctx.increment_and_check()?;

        if !is_attached(node) {
            continue;
        }

        let verdict = guard.check(node);
        if !verdict.is_safe() {
            trace!(?verdict, "wrapper kept");
            continue;
        }

        if unwrap(node) {
            unwrapped += 1;
        }
    }

    Ok(unwrapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_document_str, serialize_document};

    fn pruned(body: &str) -> (String, usize) {
        let dom = parse_document_str(&format!("<html><head></head><body>{body}</body></html>"))
            .expect("parse");
        let count = prune_wrappers(&dom, &PruneGuard::new(), &mut OptimiseContext::unbounded())
            .expect("no timeout");
        let html = serialize_document(&dom).expect("serialize");
        let inner = html
            .trim_start_matches("<html><head></head><body>")
            .trim_end_matches("</body></html>")
            .to_string();
        (inner, count)
    }

    #[test]
    fn test_nested_wrappers_collapse() {
        let (html, count) = pruned(
            "<section class=\"elementor-section\">\
             <div class=\"elementor-column-wrap\"><div class=\"elementor-widget-wrap\">\
             <div class=\"elementor-widget-container\"><h2>Title</h2>text</div></div></div></section>",
        );
        assert_eq!(html, "<section class=\"elementor-section\"><h2>Title</h2>text</section>");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_protected_wrapper_keeps_children_inside() {
        let body = "<div class=\"elementor-widget-container\" data-id=\"a1\"><p>x</p></div>";
        let (html, count) = pruned(body);
        assert_eq!(html, body);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_inner_unwrapped_even_when_outer_protected() {
        let (html, count) = pruned(
            "<div class=\"elementor-widget-wrap my-theme\">\
             <div class=\"elementor-widget-container\"><p>x</p></div></div>",
        );
        assert_eq!(html, "<div class=\"elementor-widget-wrap my-theme\"><p>x</p></div>");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_substring_match_still_guarded_by_prefix() {
        let body = "<div class=\"x-elementor-widget-wrap\"><p>x</p></div>";
        let (html, count) = pruned(body);
        assert_eq!(html, body);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_element_matching_two_needles_counted_once() {
        let (html, count) =
            pruned("<div class=\"elementor-column-wrap elementor-widget-wrap\"><b>x</b></div>");
        assert_eq!(html, "<b>x</b>");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_empty_wrapper_disappears() {
        let (html, count) = pruned("<p>a</p><div class=\"elementor-widget-wrap\"></div><p>b</p>");
        assert_eq!(html, "<p>a</p><p>b</p>");
        assert_eq!(count, 1);
    }
}

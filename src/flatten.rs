//! Aggressive flattening passes (opt-in)
//!
//! Two sub-passes, run after the conservative ones:
//!
//! 1. [`unwrap_inner_wrappers`] unwraps `elementor-inner` wrappers with the
//!    same selection and safety rules as wrapper pruning.
//! 2. [`flatten_containers`] looks at each `elementor-container` or
//!    `elementor-row` element and unwraps its *parent* when that parent holds
//!    nothing else. A container is only ever unwrapped as somebody's parent.
//!
//! Meaningful children are direct child elements plus direct text nodes that
//! are not blank, each counted as one. Comments do not count, which only
//! matters when comment stripping is disabled.
//!
//! One call makes a single walk. A second call can unwrap further ancestors
//! once the first has lifted a container, so the aggressive passes are not
//! idempotent.

use markup5ever_rcdom::{Handle, RcDom};
use tracing::{debug, trace};

use crate::dom::{
    class_contains, has_attr, is_attached, is_element, meaningful_child_count, parent_of,
    select_elements, unwrap,
};
use crate::error::OptimiseError;
use crate::optimiser::OptimiseContext;
use crate::safety::PruneGuard;
use crate::wrappers::unwrap_class_family;

/// Class fragment of the legacy inner wrapper
pub const INNER_WRAPPER_CLASS: &str = "elementor-inner";

/// Class fragments of structural containers whose parent may be flattened
pub const CONTAINER_CLASSES: &[&str] = &["elementor-container", "elementor-row"];

/// Unwrap safe `elementor-inner` wrappers
pub fn unwrap_inner_wrappers(
    dom: &RcDom,
    guard: &PruneGuard,
    ctx: &mut OptimiseContext,
) -> Result<usize, OptimiseError> {
    let unwrapped = unwrap_class_family(dom, &[INNER_WRAPPER_CLASS], guard, ctx)?;
    debug!(unwrapped, "inner wrapper unwrapping finished");
    Ok(unwrapped)
}

/// The container's parent, if it may be unwrapped around the container
fn flattenable_parent(container: &Handle, guard: &PruneGuard) -> Option<Handle> {
    let parent = parent_of(container)?;

    // The document root and the template fragment root are not elements.
    if !is_element(&parent) || has_attr(&parent, "id") {
        return None;
    }

    let verdict = guard.check(&parent);
    if !verdict.is_safe() {
        trace!(?verdict, "container parent kept");
        return None;
    }

    (meaningful_child_count(&parent) == 1).then_some(parent)
}

/// Unwrap the parent of every container that is its parent's only content
///
/// Returns the number of parents unwrapped.
pub fn flatten_containers(
    dom: &RcDom,
    guard: &PruneGuard,
    ctx: &mut OptimiseContext,
) -> Result<usize, OptimiseError> {
    let containers = select_elements(dom, |node| {
        CONTAINER_CLASSES
            .iter()
            .any(|needle| class_contains(node, needle))
    });

    let mut flattened = 0;
    for container in containers.iter().rev() {
        ctx.increment_and_check()?;

        if !is_attached(container) {
            continue;
        }

        if let Some(parent) = flattenable_parent(container, guard)
            && unwrap(&parent)
        {
            flattened += 1;
        }
    }

    debug!(flattened, "container flattening finished");
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_document_str, serialize_document};

    fn body_after<F>(body: &str, pass: F) -> (String, usize)
    where
        F: Fn(&RcDom, &PruneGuard, &mut OptimiseContext) -> Result<usize, OptimiseError>,
    {
        let dom = parse_document_str(&format!("<html><head></head><body>{body}</body></html>"))
            .expect("parse");
        let count =
            pass(&dom, &PruneGuard::new(), &mut OptimiseContext::unbounded()).expect("no timeout");
        let html = serialize_document(&dom).expect("serialize");
        let inner = html
            .trim_start_matches("<html><head></head><body>")
            .trim_end_matches("</body></html>")
            .to_string();
        (inner, count)
    }

    #[test]
    fn test_inner_wrapper_unwrapped() {
        let (html, count) = body_after(
            "<div class=\"elementor-column\"><div class=\"elementor-inner\"><p>x</p></div></div>",
            unwrap_inner_wrappers,
        );
        assert_eq!(html, "<div class=\"elementor-column\"><p>x</p></div>");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_inner_wrapper_with_foreign_class_kept() {
        let body = "<div class=\"elementor-inner theme-box\"><p>x</p></div>";
        assert_eq!(body_after(body, unwrap_inner_wrappers), (body.to_string(), 0));
    }

    #[test]
    fn test_single_child_parent_unwrapped() {
        let (html, count) = body_after(
            "<div class=\"elementor-section-wrap\">\n  \
             <div class=\"elementor-container\"><p>x</p></div>\n</div>",
            flatten_containers,
        );
        assert_eq!(html, "\n  <div class=\"elementor-container\"><p>x</p></div>\n");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_parent_with_sibling_kept() {
        let body = "<div class=\"elementor-section-wrap\">\
                    <div class=\"elementor-row\"></div><span>side</span></div>";
        assert_eq!(body_after(body, flatten_containers), (body.to_string(), 0));
    }

    #[test]
    fn test_text_sibling_counts_as_child() {
        let body = "<div class=\"elementor-section-wrap\">label<div class=\"elementor-row\"></div></div>";
        assert_eq!(body_after(body, flatten_containers), (body.to_string(), 0));
    }

    #[test]
    fn test_comment_sibling_does_not_count() {
        let (html, count) = body_after(
            "<div class=\"elementor-section-wrap\"><!-- c --><div class=\"elementor-row\"></div></div>",
            flatten_containers,
        );
        assert_eq!(html, "<!-- c --><div class=\"elementor-row\"></div>");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_protected_parent_kept() {
        for parent in [
            "<section id=\"hero\">",
            "<section class=\"elementor-section\" data-id=\"a1\">",
            "<section class=\"elementor-section my-theme\">",
        ] {
            let body = format!("{parent}<div class=\"elementor-container\"></div></section>");
            let (_, count) = body_after(&body, flatten_containers);
            assert_eq!(count, 0, "{parent}");
        }
    }

    #[test]
    fn test_classless_parent_is_flattened() {
        let (html, count) = body_after(
            "<div><div class=\"elementor-container\">x</div></div>",
            flatten_containers,
        );
        assert_eq!(html, "<div class=\"elementor-container\">x</div>");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_container_may_be_unwrapped_as_a_parent() {
        let (html, count) = body_after(
            "<div class=\"elementor-container\"><div class=\"elementor-row\"><p>x</p></div></div>",
            flatten_containers,
        );
        assert_eq!(html, "<div class=\"elementor-row\"><p>x</p></div>");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_body_is_never_flattened() {
        let body = "<div class=\"elementor-container\"><p>x</p></div>";
        assert_eq!(body_after(body, flatten_containers), (body.to_string(), 0));
    }
}

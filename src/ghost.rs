//! Ghost node removal pass
//!
//! Builder elements sometimes survive with nothing left to render: an
//! emptied widget, a spacer that lost its content. The pass deletes such an
//! element together with its subtree when every check holds:
//!
//! - no `id` and none of the protected attributes (`style` among them), on
//!   the element or anywhere below it
//! - no media element (`img`, `svg`, `input`, `iframe`, `video`), either as
//!   the element itself or below it
//! - no text once blank characters are trimmed
//!
//! Computed styles are out of reach, so a background or border set from a
//! stylesheet is not detected; the pass relies on the checks above alone.

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::{debug, trace};

use crate::dom::{
    class_contains, descendants, detach, has_attr, is_attached, is_blank, select_elements,
    tag_name,
};
use crate::error::OptimiseError;
use crate::optimiser::OptimiseContext;
use crate::safety::PROTECTED_ATTRIBUTES;

/// Class fragment shared by every builder element
pub const GHOST_CANDIDATE_CLASS: &str = "elementor-element";

/// Tags that render something even without text
pub const MEDIA_TAGS: &[&str] = &["img", "svg", "input", "iframe", "video"];

/// Why a candidate was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keep {
    Id,
    Attribute(&'static str),
    ProtectedDescendant,
    Media,
    Text,
}

fn protected_attribute(node: &Handle) -> Option<&'static str> {
    PROTECTED_ATTRIBUTES
        .iter()
        .copied()
        .find(|attr| has_attr(node, attr))
}

fn is_media(node: &Handle) -> bool {
    tag_name(node).is_some_and(|tag| MEDIA_TAGS.contains(&tag))
}

/// First reason to keep the candidate, gathered in one walk of its subtree
fn keep_reason(node: &Handle) -> Option<Keep> {
    if has_attr(node, "id") {
        return Some(Keep::Id);
    }
    if let Some(attr) = protected_attribute(node) {
        return Some(Keep::Attribute(attr));
    }

    let mut media = is_media(node);
    let mut text = false;
    for child in descendants(node) {
        match child.data {
            NodeData::Element { .. } => {
                // Deleting the subtree would take a protected descendant with it.
                if has_attr(&child, "id") || protected_attribute(&child).is_some() {
                    return Some(Keep::ProtectedDescendant);
                }
                media = media || is_media(&child);
            }
            NodeData::Text { ref contents } => {
                text = text || !is_blank(&contents.borrow());
            }
            _ => {}
        }
    }

    if media {
        Some(Keep::Media)
    } else if text {
        Some(Keep::Text)
    } else {
        None
    }
}

/// Whether the element renders nothing and may be deleted outright
pub fn is_ghost(node: &Handle) -> bool {
    keep_reason(node).is_none()
}

/// Delete every ghost builder element, returning how many were removed
///
/// Nested ghosts are counted individually: the innermost is removed first,
/// then its emptied ancestor on a later step of the same walk.
pub fn remove_ghost_nodes(dom: &RcDom, ctx: &mut OptimiseContext) -> Result<usize, OptimiseError> {
    let candidates = select_elements(dom, |node| class_contains(node, GHOST_CANDIDATE_CLASS));

    let mut removed = 0;
    for node in candidates.iter().rev() {
        ctx.increment_and_check()?;

        if !is_attached(node) {
            continue;
        }

        if let Some(reason) = keep_reason(node) {
            trace!(?reason, "ghost candidate kept");
            continue;
        }

        if detach(node) {
            removed += 1;
        }
    }

    debug!(removed, "ghost removal finished");
    Ok(removed)
}

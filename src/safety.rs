//! Safety predicate gating every unwrap and flatten
//!
//! The optimiser cannot see computed CSS or run scripts, so an element is
//! only treated as removable when nothing about it could be a hook for
//! styling, scripting or accessibility:
//!
//! 1. **No `id`**: anchors, `getElementById` and `#id` selectors all bind to it.
//!    Presence alone disqualifies, whatever the value.
//! 2. **No protected attribute**: `data-id`, `aria-label`, `role`, `tabindex`,
//!    `onclick`, `style`.
//! 3. **Only builder classes**: every class token must start with
//!    `elementor-`. One foreign token (a theme or user class) is enough to keep
//!    the element, since a stylesheet or script may target it.

use markup5ever_rcdom::Handle;

use crate::dom::{class_tokens, has_attr, is_element};

/// Attributes whose presence marks an element as load-bearing
pub const PROTECTED_ATTRIBUTES: &[&str] = &[
    "data-id",    // builder element identity, used by frontend scripts
    "aria-label", // accessibility
    "role",       // accessibility
    "tabindex",   // focus order
    "onclick",    // inline handler
    "style",      // inline presentation
];

/// Prefix shared by every class the page builder emits
pub const BUILDER_CLASS_PREFIX: &str = "elementor-";

/// Outcome of checking one element against the safety rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneVerdict {
    /// All rules pass; the element may be unwrapped
    Safe,
    /// Not an element node (document, text, comment)
    NotAnElement,
    /// The element carries an `id` attribute
    HasId,
    /// The element carries one of [`PROTECTED_ATTRIBUTES`]
    ProtectedAttribute(&'static str),
    /// The element carries a class outside the builder's namespace
    ForeignClass(String),
}

impl PruneVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, PruneVerdict::Safe)
    }
}

/// Applies the safety rules to candidate elements
#[derive(Debug, Clone)]
pub struct PruneGuard {
    protected_attributes: &'static [&'static str],
    class_prefix: &'static str,
}

impl PruneGuard {
    pub fn new() -> Self {
        Self {
            protected_attributes: PROTECTED_ATTRIBUTES,
            class_prefix: BUILDER_CLASS_PREFIX,
        }
    }

    /// Check an element and report the first rule it fails
    ///
    /// # Examples
    ///
    /// ```
    /// use dom_optimiser::dom::select_elements;
    /// use dom_optimiser::parser::parse_document_str;
    /// use dom_optimiser::safety::{PruneGuard, PruneVerdict};
    ///
    /// let dom = parse_document_str(
    ///     "<div class=\"elementor-widget-wrap\"></div><div class=\"elementor-widget-wrap hero\"></div>",
    /// ).expect("parse");
    /// let divs = select_elements(&dom, |n| dom_optimiser::dom::tag_name(n) == Some("div"));
    ///
    /// let guard = PruneGuard::new();
    /// assert_eq!(guard.check(&divs[0]), PruneVerdict::Safe);
    /// assert_eq!(guard.check(&divs[1]), PruneVerdict::ForeignClass("hero".to_string()));
    /// ```
    pub fn check(&self, node: &Handle) -> PruneVerdict {
        if !is_element(node) {
            return PruneVerdict::NotAnElement;
        }

        if has_attr(node, "id") {
            return PruneVerdict::HasId;
        }

        if let Some(attr) = self
            .protected_attributes
            .iter()
            .copied()
            .find(|attr| has_attr(node, attr))
        {
            return PruneVerdict::ProtectedAttribute(attr);
        }

        if let Some(token) = class_tokens(node)
            .into_iter()
            .find(|token| !self.is_builder_class(token))
        {
            return PruneVerdict::ForeignClass(token);
        }

        PruneVerdict::Safe
    }

    /// Whether the element may be removed or unwrapped
    pub fn is_safe_to_prune(&self, node: &Handle) -> bool {
        self.check(node).is_safe()
    }

    /// Whether a single class token belongs to the page builder
    pub fn is_builder_class(&self, token: &str) -> bool {
        token.starts_with(self.class_prefix)
    }
}

impl Default for PruneGuard {
    fn default() -> Self {
        Self::new()
    }
}

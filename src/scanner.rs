//! Inline script reference scanner
//!
//! Collects element IDs that inline scripts look up by literal string, via
//! `getElementById("x")` or a jQuery-style `$("#x")`. Matching is lexical:
//! IDs built at runtime are missed, and a string that merely looks like a
//! lookup inside unrelated code is still collected.
//!
//! No pass consults the result today. The `id` rule of the safety predicate
//! already keeps every element that has an id, so the set is reported for
//! diagnostics and kept for a future id-aware pruning mode.

use markup5ever_rcdom::RcDom;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::dom::{effective_text, select_elements, tag_name};

static GET_ELEMENT_BY_ID: OnceLock<Option<Regex>> = OnceLock::new();
static JQUERY_ID_SELECTOR: OnceLock<Option<Regex>> = OnceLock::new();

fn patterns() -> impl Iterator<Item = &'static Regex> {
    [
        GET_ELEMENT_BY_ID.get_or_init(|| {
            Regex::new(r#"getElementById\s*\(\s*["']([^"']+)["']\s*\)"#).ok()
        }),
        JQUERY_ID_SELECTOR
            .get_or_init(|| Regex::new(r#"\$\s*\(\s*["']#([^"']+)["']\s*\)"#).ok()),
    ]
    .into_iter()
    .filter_map(Option::as_ref)
}

/// Scans `<script>` bodies for literal ID lookups
#[derive(Debug, Clone, Default)]
pub struct ScriptReferenceScanner;

impl ScriptReferenceScanner {
    pub fn new() -> Self {
        Self
    }

    /// Collect the IDs referenced by every inline script in the document
    ///
    /// Each call starts from an empty set; nothing is carried between
    /// documents.
    pub fn scan(&self, dom: &RcDom) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for script in select_elements(dom, |node| tag_name(node) == Some("script")) {
            let source = effective_text(&script);
            if source.is_empty() {
                continue;
            }
            self.collect_from_source(&source, &mut ids);
        }
        ids
    }

    /// Add the IDs referenced in one script body to `ids`
    pub fn collect_from_source(&self, source: &str, ids: &mut BTreeSet<String>) {
        for regex in patterns() {
            ids.extend(
                regex
                    .captures_iter(source)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
            );
        }
    }
}

//! Tree primitives over the rcdom document
//!
//! The rcdom tree owns children through strong `Rc` links and refers to the
//! parent through a `Weak` link, so detaching a subtree from its parent drops
//! ownership of the whole subtree and no cycle keeps it alive.
//!
//! Passes never mutate while iterating a live child list. They take a
//! snapshot of matching handles in document order first (see
//! [`select_elements`]) and then mutate while walking the snapshot backwards.
//! A handle in the snapshot may refer to a node that an earlier mutation
//! already detached; [`is_attached`] lets a pass skip such nodes.

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::rc::Rc;

/// Characters stripped when deciding whether text is blank.
///
/// Non-breaking spaces are deliberately not in this set: `&nbsp;` is
/// commonly used as visible spacing.
const BLANK_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Whether the text is empty once surrounding blank characters are trimmed
pub fn is_blank(text: &str) -> bool {
    text.trim_matches(BLANK_CHARS).is_empty()
}

/// Lowercase local tag name of an element node
pub fn tag_name(node: &Handle) -> Option<&str> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(&*name.local),
        _ => None,
    }
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// Elements that make up the document skeleton
const SKELETON_TAGS: &[&str] = &["html", "head", "body"];

fn is_template(node: &Handle) -> bool {
    match node.data {
        NodeData::Element {
            ref template_contents,
            ..
        } => template_contents.borrow().is_some(),
        _ => false,
    }
}

/// Value of an attribute, matched on its local name
pub fn attr_value(node: &Handle, attr_name: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Whether the attribute is present at all (an empty value still counts)
pub fn has_attr(node: &Handle, attr_name: &str) -> bool {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .any(|attr| &*attr.name.local == attr_name),
        _ => false,
    }
}

/// Substring match on the raw `class` attribute value
///
/// This mirrors an XPath `contains(@class, ...)` selector: a class such as
/// `my-elementor-widget-wrap-extra` matches `elementor-widget-wrap`.
pub fn class_contains(node: &Handle, needle: &str) -> bool {
    attr_value(node, "class").is_some_and(|class| class.contains(needle))
}

/// Non-empty whitespace-separated tokens of the `class` attribute
pub fn class_tokens(node: &Handle) -> Vec<String> {
    attr_value(node, "class")
        .map(|class| class.split_ascii_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Parent of a node, if it is still linked to one
pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

fn parent_and_index(node: &Handle) -> Option<(Handle, usize)> {
    let parent = parent_of(node)?;
    let index = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))?;
    Some((parent, index))
}

/// Whether the node is still reachable from a document (or template) root
pub fn is_attached(node: &Handle) -> bool {
    let mut current = node.clone();
    while let Some(parent) = parent_of(&current) {
        current = parent;
    }
    matches!(current.data, NodeData::Document)
}

fn push_children_reversed(stack: &mut Vec<Handle>, node: &Handle) {
    if let NodeData::Element {
        ref template_contents,
        ..
    } = node.data
        && let Some(ref fragment) = *template_contents.borrow()
    {
        stack.extend(fragment.children.borrow().iter().rev().cloned());
    }
    stack.extend(node.children.borrow().iter().rev().cloned());
}

/// All descendants of `node` in document order, excluding `node` itself
///
/// Template contents are visited after the template's own children.
pub fn descendants(node: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    let mut stack = Vec::new();
    push_children_reversed(&mut stack, node);

    while let Some(current) = stack.pop() {
        push_children_reversed(&mut stack, &current);
        out.push(current);
    }
    out
}

/// Snapshot of elements matching `predicate`, in document order
pub fn select_elements<F>(dom: &RcDom, predicate: F) -> Vec<Handle>
where
    F: Fn(&Handle) -> bool,
{
    descendants(&dom.document)
        .into_iter()
        .filter(|node| is_element(node) && predicate(node))
        .collect()
}

/// Snapshot of every comment node in document order
pub fn select_comments(dom: &RcDom) -> Vec<Handle> {
    descendants(&dom.document)
        .into_iter()
        .filter(|node| matches!(node.data, NodeData::Comment { .. }))
        .collect()
}

/// Concatenation of all descendant text (comments do not contribute)
pub fn effective_text(node: &Handle) -> String {
    let mut text = String::new();
    for descendant in descendants(node) {
        if let NodeData::Text { ref contents } = descendant.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

/// Whether any descendant element has one of the given tag names
pub fn has_descendant_tag(node: &Handle, tags: &[&str]) -> bool {
    descendants(node)
        .iter()
        .filter_map(tag_name)
        .any(|tag| tags.contains(&tag))
}

/// Direct child elements plus direct non-blank text nodes, each counted once
pub fn meaningful_child_count(node: &Handle) -> usize {
    node.children
        .borrow()
        .iter()
        .filter(|child| match child.data {
            NodeData::Element { .. } => true,
            NodeData::Text { ref contents } => !is_blank(&contents.borrow()),
            _ => false,
        })
        .count()
}

/// Remove a node (and its subtree) from its parent
///
/// Returns `false` without touching anything if the node has no parent.
pub fn detach(node: &Handle) -> bool {
    let Some((parent, index)) = parent_and_index(node) else {
        return false;
    };
    parent.children.borrow_mut().remove(index);
    node.parent.set(None);
    true
}

/// Replace an element with its children, in place
///
/// The children keep their relative order and take the element's position
/// among its siblings; nothing about the children themselves changes.
/// Returns `false` and leaves the tree untouched if the node has no parent,
/// is a `<template>` (whose content lives outside its child list), or is one
/// of `html`, `head` and `body`.
pub fn unwrap(node: &Handle) -> bool {
    if is_template(node) || tag_name(node).is_some_and(|tag| SKELETON_TAGS.contains(&tag)) {
        return false;
    }
    let Some((parent, index)) = parent_and_index(node) else {
        return false;
    };

    let children = node.children.take();
    for child in &children {
        child.parent.set(Some(Rc::downgrade(&parent)));
    }
    parent
        .children
        .borrow_mut()
        .splice(index..=index, children)
        .for_each(drop);
    node.parent.set(None);
    true
}

//! # Work Plan Builder
//!
//! Turns locally authored descriptions into a validated, ordered batch of
//! [`WorkItem`]s.
//!
//! ## Overview
//!
//! - Category trees are flattened depth-first in pre-order, so a parent
//!   always receives a smaller `local_index` than any of its children.
//! - Product lists become independent items with no parent reference.
//! - An indented text outline (two spaces per level) can be parsed into a
//!   tree first.
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::plan::{parse_outline, WorkPlan};
//! use bridge_traits::EntityKind;
//!
//! let roots = parse_outline("Fashion\n  Men\n  Women\n");
//! let plan = WorkPlan::from_tree(EntityKind::Category, roots)?;
//! assert_eq!(plan.items()[1].parent_ref, Some(0));
//! ```

use bridge_traits::EntityKind;
use serde_json::{Map, Value};

use crate::error::PlanError;
use crate::item::WorkItem;

/// Spaces per indentation level in a text outline
const OUTLINE_INDENT: usize = 2;

/// One node of a locally authored category tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryNode {
    pub name: String,
    /// Explicit slug; derived from the name when absent
    pub slug: Option<String>,
    pub description: Option<String>,
    pub payload: Map<String, Value>,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: CategoryNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(CategoryNode::node_count).sum::<usize>()
    }
}

/// One independent entry of a flat list, typically a product.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanEntry {
    pub name: String,
    pub slug: Option<String>,
    pub payload: Map<String, Value>,
}

impl PlanEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }
}

/// A validated, ordered batch of items of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkPlan {
    kind: EntityKind,
    items: Vec<WorkItem>,
}

impl WorkPlan {
    /// Validate and wrap pre-built items.
    ///
    /// # Errors
    ///
    /// - [`PlanError::EmptyName`] for a blank name
    /// - [`PlanError::IndexMismatch`] when `local_index` differs from the position
    /// - [`PlanError::ForwardParent`] when `parent_ref` is not an earlier item
    /// - [`PlanError::NotHierarchical`] when a non-hierarchical kind carries a parent
    pub fn new(kind: EntityKind, items: Vec<WorkItem>) -> Result<Self, PlanError> {
        for (position, item) in items.iter().enumerate() {
            if item.local_index != position {
                return Err(PlanError::IndexMismatch {
                    position,
                    local_index: item.local_index,
                });
            }

            if item.name.trim().is_empty() {
                return Err(PlanError::EmptyName {
                    local_index: item.local_index,
                });
            }

            if let Some(parent_ref) = item.parent_ref {
                if !kind.is_hierarchical() {
                    return Err(PlanError::NotHierarchical {
                        kind,
                        local_index: item.local_index,
                    });
                }
                if parent_ref >= item.local_index {
                    return Err(PlanError::ForwardParent {
                        local_index: item.local_index,
                        parent_ref,
                    });
                }
            }
        }

        Ok(Self { kind, items })
    }

    /// Flatten a category forest in pre-order.
    pub fn from_tree(kind: EntityKind, roots: Vec<CategoryNode>) -> Result<Self, PlanError> {
        let mut items = Vec::with_capacity(roots.iter().map(CategoryNode::node_count).sum());
        for root in roots {
            flatten(root, None, &mut items);
        }
        Self::new(kind, items)
    }

    /// Independent items in list order.
    pub fn from_flat(
        kind: EntityKind,
        entries: impl IntoIterator<Item = PlanEntry>,
    ) -> Result<Self, PlanError> {
        let items = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let slug = entry.slug.unwrap_or_default();
                WorkItem::new(index, entry.name)
                    .with_slug(slug)
                    .with_payload(entry.payload)
            })
            .collect();
        Self::new(kind, items)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when no item references another item of the batch.
    pub fn is_independent(&self) -> bool {
        self.dependent_count() == 0
    }

    /// Number of items carrying a parent reference
    pub fn dependent_count(&self) -> usize {
        self.items.iter().filter(|i| i.parent_ref.is_some()).count()
    }
}

fn flatten(node: CategoryNode, parent_ref: Option<usize>, items: &mut Vec<WorkItem>) {
    let local_index = items.len();
    let slug = match node.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => slugify(&node.name),
    };

    let mut payload = node.payload;
    if let Some(description) = node.description.filter(|d| !d.trim().is_empty()) {
        payload.insert("description".into(), Value::from(description.trim()));
    }

    let mut item = WorkItem::new(local_index, node.name.trim())
        .with_slug(slug)
        .with_payload(payload);
    item.parent_ref = parent_ref;
    items.push(item);

    for child in node.children {
        flatten(child, Some(local_index), items);
    }
}

/// Parse an indented outline into a category forest.
///
/// Each non-blank line is one category; two leading spaces make one level.
/// A line indented more than one level below its predecessor attaches to
/// the nearest shallower line.
pub fn parse_outline(text: &str) -> Vec<CategoryNode> {
    let mut roots = Vec::new();
    let mut open: Vec<CategoryNode> = Vec::new();

    for line in text.lines() {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }

        let indent = line.chars().take_while(|c| c.is_whitespace()).count();
        let level = indent / OUTLINE_INDENT;
        while open.len() > level {
            close_top(&mut open, &mut roots);
        }
        open.push(CategoryNode::new(name));
    }

    while !open.is_empty() {
        close_top(&mut open, &mut roots);
    }
    roots
}

fn close_top(open: &mut Vec<CategoryNode>, roots: &mut Vec<CategoryNode>) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

/// Slug for a name with no explicit one.
///
/// Lower-cases, turns spaces into `-`, drops anything outside `[a-z0-9-]`,
/// collapses runs of `-` and trims them from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c == ' ' { '-' } else { c };
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            continue;
        }
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('-').to_string()
}

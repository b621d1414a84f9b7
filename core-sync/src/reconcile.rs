//! # Remote Reconciliation
//!
//! Classifies each work item as reuse-or-create against one snapshot of the
//! remote collection, so a batch issues a single listing call no matter how
//! many items it holds.
//!
//! Keys are trimmed, lower-cased names and slugs sharing one key space.
//! Names are indexed before slugs, and the first entity seen for a key keeps
//! it, so a name match always wins over a slug match.

use bridge_traits::{RemoteEntity, RemoteId};
use std::collections::HashMap;
use tracing::debug;

use crate::item::WorkItem;

/// Outcome of matching one item against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionDecision {
    /// An entity with the same name or slug already exists
    Reuse(RemoteId),
    /// Nothing matches; the item must be created
    Create,
}

/// Name/slug lookup over one remote snapshot.
#[derive(Debug, Default, Clone)]
pub struct RemoteIndex {
    by_key: HashMap<String, RemoteId>,
    by_id: HashMap<RemoteId, RemoteEntity>,
}

impl RemoteIndex {
    /// Build an index from a full remote listing.
    pub fn build(entities: Vec<RemoteEntity>) -> Self {
        let mut index = Self::default();

        for entity in &entities {
            let key = normalize(&entity.name);
            if !key.is_empty() {
                index.by_key.entry(key).or_insert(entity.id);
            }
        }
        for entity in &entities {
            let slug = normalize(&entity.slug);
            if !slug.is_empty() && slug != normalize(&entity.name) {
                index.by_key.entry(slug).or_insert(entity.id);
            }
        }
        for entity in entities {
            index.by_id.entry(entity.id).or_insert(entity);
        }

        debug!(
            entities = index.by_id.len(),
            keys = index.by_key.len(),
            "Built remote index"
        );
        index
    }

    /// Name lookup, then slug lookup.
    pub fn resolve(&self, item: &WorkItem) -> ResolutionDecision {
        [normalize(&item.name), normalize(&item.slug)]
            .iter()
            .filter(|key| !key.is_empty())
            .find_map(|key| self.by_key.get(key).copied())
            .map_or(ResolutionDecision::Create, ResolutionDecision::Reuse)
    }

    /// Snapshot entry for an id, used to backfill local records.
    pub fn entity(&self, id: RemoteId) -> Option<&RemoteEntity> {
        self.by_id.get(&id)
    }

    /// Make an entity created during this batch visible to later items.
    ///
    /// Existing keys are left alone.
    pub fn register(&mut self, entity: RemoteEntity) {
        for key in [normalize(&entity.name), normalize(&entity.slug)] {
            if !key.is_empty() {
                self.by_key.entry(key).or_insert(entity.id);
            }
        }
        self.by_id.entry(entity.id).or_insert(entity);
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Convenience wrapper over [`RemoteIndex::build`].
pub fn build_index(entities: Vec<RemoteEntity>) -> RemoteIndex {
    RemoteIndex::build(entities)
}

/// Convenience wrapper over [`RemoteIndex::resolve`].
pub fn resolve(item: &WorkItem, index: &RemoteIndex) -> ResolutionDecision {
    index.resolve(item)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RemoteIndex {
        build_index(vec![
            RemoteEntity::new(10, "Shoes", "shoes"),
            RemoteEntity::new(11, "Running Gear", "run"),
            RemoteEntity::new(12, "run", "running-2"),
        ])
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let index = snapshot();
        let item = WorkItem::new(0, "  sHoEs ");
        assert_eq!(index.resolve(&item), ResolutionDecision::Reuse(RemoteId(10)));
    }

    #[test]
    fn test_slug_match_when_name_differs() {
        let index = snapshot();
        let item = WorkItem::new(0, "Footwear").with_slug("SHOES");
        assert_eq!(resolve(&item, &index), ResolutionDecision::Reuse(RemoteId(10)));
    }

    #[test]
    fn test_name_beats_slug() {
        let index = snapshot();
        // "run" is entity 11's slug but entity 12's name
        let item = WorkItem::new(0, "Run");
        assert_eq!(index.resolve(&item), ResolutionDecision::Reuse(RemoteId(12)));
    }

    #[test]
    fn test_item_name_checked_before_item_slug() {
        let index = snapshot();
        let item = WorkItem::new(0, "Running Gear").with_slug("shoes");
        assert_eq!(index.resolve(&item), ResolutionDecision::Reuse(RemoteId(11)));
    }

    #[test]
    fn test_no_match_creates() {
        let index = snapshot();
        let item = WorkItem::new(0, "Hats").with_slug("hats");
        assert_eq!(index.resolve(&item), ResolutionDecision::Create);
        assert_eq!(
            RemoteIndex::default().resolve(&WorkItem::new(0, "Shoes")),
            ResolutionDecision::Create
        );
    }

    #[test]
    fn test_duplicate_items_resolve_to_same_entity() {
        let index = snapshot();
        let first = index.resolve(&WorkItem::new(0, "Shoes"));
        let second = index.resolve(&WorkItem::new(1, "shoes"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_first_listed_entity_keeps_key() {
        let index = build_index(vec![
            RemoteEntity::new(1, "Sale", "sale"),
            RemoteEntity::new(2, "Sale", "sale-2"),
        ]);
        assert_eq!(
            index.resolve(&WorkItem::new(0, "sale")),
            ResolutionDecision::Reuse(RemoteId(1))
        );
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_register_makes_created_entity_visible() {
        let mut index = snapshot();
        let item = WorkItem::new(3, "Hats");
        assert_eq!(index.resolve(&item), ResolutionDecision::Create);

        index.register(RemoteEntity::new(40, "Hats", "hats"));

        assert_eq!(index.resolve(&item), ResolutionDecision::Reuse(RemoteId(40)));
        assert_eq!(index.entity(RemoteId(40)).map(|e| e.slug.as_str()), Some("hats"));
    }

    #[test]
    fn test_entity_lookup() {
        let index = snapshot();
        assert_eq!(index.entity(RemoteId(11)).map(|e| e.name.as_str()), Some("Running Gear"));
        assert!(index.entity(RemoteId(99)).is_none());
    }
}

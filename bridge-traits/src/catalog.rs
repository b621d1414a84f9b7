//! Remote Catalog Abstraction
//!
//! Contract for the remote commerce service the engine mirrors into. The
//! engine only needs two operations: one full listing per batch and one
//! create call per entity that does not already exist.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{BridgeError, Result};

/// Kind of catalog entity being mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Hierarchical product category
    Category,
    /// Independent product record
    Product,
}

impl EntityKind {
    /// Convert kind to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
        }
    }

    /// Whether entities of this kind may reference a parent.
    pub fn is_hierarchical(&self) -> bool {
        matches!(self, Self::Category)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "category" => Ok(Self::Category),
            "product" => Ok(Self::Product),
            _ => Err(BridgeError::OperationFailed(format!(
                "unknown entity kind: {}",
                s
            ))),
        }
    }
}

/// Identifier assigned by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub u64);

impl RemoteId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RemoteId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// An entity as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntity {
    pub id: RemoteId,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub parent_id: Option<RemoteId>,
    /// Remaining fields returned by the service, kept for local backfill
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteEntity {
    pub fn new(id: impl Into<RemoteId>, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            parent_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<RemoteId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }
}

/// Payload for a single remote create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRequest {
    pub name: String,
    /// `None` lets the service derive the slug
    pub slug: Option<String>,
    pub parent: Option<RemoteId>,
    /// Kind-specific fields (description, price, images, ...)
    pub payload: Map<String, Value>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            parent: None,
            payload: Map::new(),
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        self.slug = if slug.is_empty() { None } else { Some(slug) };
        self
    }

    pub fn with_parent(mut self, parent: Option<RemoteId>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }
}

/// Remote catalog trait
///
/// Implementations wrap a concrete commerce API. Transport retries and
/// authentication are the implementation's concern; a returned error is
/// final for that call.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::{CreateRequest, EntityKind, RemoteCatalog};
///
/// async fn ensure_root(catalog: &dyn RemoteCatalog) -> Result<()> {
///     let existing = catalog.list_entities(EntityKind::Category).await?;
///     if !existing.iter().any(|e| e.name == "Shoes") {
///         catalog
///             .create_entity(EntityKind::Category, CreateRequest::new("Shoes"))
///             .await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Fetch every entity of the given kind.
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<RemoteEntity>>;

    /// Create one entity and return it as stored by the service.
    async fn create_entity(&self, kind: EntityKind, request: CreateRequest)
        -> Result<RemoteEntity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_round_trip_through_str() {
        for kind in [EntityKind::Category, EntityKind::Product] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("tag".parse::<EntityKind>().is_err());
        assert!(EntityKind::Category.is_hierarchical());
        assert!(!EntityKind::Product.is_hierarchical());
    }

    #[test]
    fn test_remote_entity_keeps_unknown_fields() {
        let entity: RemoteEntity = serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": "Shoes",
            "slug": "shoes",
            "description": "All shoes",
            "count": 3
        }))
        .unwrap();

        assert_eq!(entity.id, RemoteId(42));
        assert_eq!(entity.parent_id, None);
        assert_eq!(entity.extra.get("description"), Some(&Value::from("All shoes")));
        assert_eq!(entity.extra.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn test_create_request_empty_slug_is_none() {
        let request = CreateRequest::new("Boots").with_slug("");
        assert_eq!(request.slug, None);

        let request = CreateRequest::new("Boots").with_slug("boots");
        assert_eq!(request.slug.as_deref(), Some("boots"));
    }
}

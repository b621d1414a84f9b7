//! WooCommerce API wire types
//!
//! Data structures for deserializing WooCommerce REST API v3 responses.

use bridge_traits::catalog::{RemoteEntity, RemoteId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A product or product category resource.
///
/// Categories report their parent as `parent`, products as `parent_id`;
/// both use `0` for "no parent".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WooEntity {
    pub id: u64,

    pub name: String,

    #[serde(default)]
    pub slug: String,

    #[serde(default, alias = "parent_id")]
    pub parent: u64,

    /// Everything else (description, count, images, prices...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<WooEntity> for RemoteEntity {
    fn from(entity: WooEntity) -> Self {
        RemoteEntity {
            id: RemoteId(entity.id),
            name: entity.name,
            slug: entity.slug,
            parent_id: (entity.parent != 0).then_some(RemoteId(entity.parent)),
            extra: entity.extra,
        }
    }
}

/// Error body returned with non-2xx responses
///
/// See: https://woocommerce.github.io/woocommerce-rest-api-docs/#errors
#[derive(Debug, Default, Deserialize)]
pub struct WooErrorBody {
    /// Machine-readable code, e.g. `term_exists`
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub data: Option<WooErrorData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WooErrorData {
    #[serde(default)]
    pub status: Option<u16>,

    /// Per-parameter validation messages
    #[serde(default)]
    pub params: Option<Value>,
}

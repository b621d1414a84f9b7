//! Request body cleaning
//!
//! WooCommerce rejects or misfiles loosely typed input (string ids, a zero
//! parent, image references without a media id), so create bodies are
//! normalized before they are sent.

use bridge_traits::catalog::{CreateRequest, EntityKind};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{Result, WooCommerceError};

/// Build the JSON body for a create call.
pub(crate) fn build_create_body(kind: EntityKind, request: &CreateRequest) -> Result<Value> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(WooCommerceError::InvalidData {
            entity: kind.to_string(),
            message: "name must not be empty".to_string(),
        });
    }

    let body = match kind {
        EntityKind::Category => category_body(name, request),
        EntityKind::Product => product_body(name, request),
    };
    Ok(Value::Object(body))
}

fn category_body(name: &str, request: &CreateRequest) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("name".into(), Value::from(name));

    let slug = match request.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_lowercase(),
        _ => derive_slug(name),
    };
    body.insert("slug".into(), Value::from(slug));

    if let Some(parent) = request.parent.filter(|p| p.get() != 0) {
        body.insert("parent".into(), Value::from(parent.get()));
    }

    let payload = &request.payload;
    if let Some(description) = payload.get("description").and_then(Value::as_str) {
        let description = description.trim();
        if !description.is_empty() {
            body.insert("description".into(), Value::from(description));
        }
    }

    match payload.get("image") {
        Some(Value::String(src)) if !src.is_empty() => {
            body.insert("image".into(), json!({ "src": src }));
        }
        Some(image @ Value::Object(_)) => {
            body.insert("image".into(), image.clone());
        }
        _ => {}
    }

    if let Some(display) = payload.get("display").and_then(Value::as_str) {
        body.insert("display".into(), Value::from(display));
    }

    if let Some(order) = payload.get("menu_order").and_then(as_u64) {
        body.insert("menu_order".into(), Value::from(order));
    }

    body
}

fn product_body(name: &str, request: &CreateRequest) -> Map<String, Value> {
    let mut body = request.payload.clone();
    body.remove("parent");
    body.remove("parent_id");
    body.insert("name".into(), Value::from(name));

    if let Some(slug) = request.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        body.insert("slug".into(), Value::from(slug.to_lowercase()));
    }

    if let Some(categories) = body.remove("categories") {
        body.insert("categories".into(), Value::Array(category_refs(&categories)));
    }

    if let Some(images) = body.remove("images") {
        let valid = image_refs(&images);
        if valid.is_empty() {
            warn!(product = name, "No valid images found, creating product without images");
        } else {
            body.insert("images".into(), Value::Array(valid));
        }
    }

    body
}

/// Normalize category references to `[{"id": n}]`.
///
/// Accepts a single id or a list of ids, each given as a number, a numeric
/// string, or an object carrying `id`. Unparseable and zero ids are dropped.
fn category_refs(value: &Value) -> Vec<Value> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    items
        .into_iter()
        .filter_map(|item| {
            let id = match item {
                Value::Object(obj) => obj.get("id").and_then(as_u64),
                other => as_u64(other),
            };
            if id.is_none() {
                warn!(category = %item, "Invalid category ID");
            }
            id
        })
        .filter(|id| *id != 0)
        .map(|id| json!({ "id": id }))
        .collect()
}

/// Keep images that reference an uploaded media item by positive id and src.
fn image_refs(value: &Value) -> Vec<Value> {
    let Some(images) = value.as_array() else {
        return Vec::new();
    };

    let mut valid = Vec::new();
    for image in images {
        let id = image.get("id").and_then(Value::as_u64).filter(|id| *id > 0);
        let src = image.get("src").and_then(Value::as_str).filter(|s| !s.is_empty());
        match (id, src) {
            (Some(id), Some(src)) => {
                let position = valid.len();
                valid.push(json!({
                    "id": id,
                    "src": src,
                    "name": image.get("name").and_then(Value::as_str).unwrap_or_default(),
                    "alt": image.get("alt").and_then(Value::as_str).unwrap_or_default(),
                    "position": position,
                }));
            }
            _ => warn!(image = %image, "Skipping invalid image reference"),
        }
    }
    valid
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Slug WooCommerce would accept for a name with no explicit slug.
fn derive_slug(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::catalog::RemoteId;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_category_body_trims_and_derives_slug() {
        let request = CreateRequest::new("  Winter Boots! ").with_payload(payload(json!({
            "description": "  Warm ones ",
            "image": "https://cdn.example/boots.jpg",
            "menu_order": "3",
            "unrelated": true
        })));

        let body = build_create_body(EntityKind::Category, &request).unwrap();

        assert_eq!(
            body,
            json!({
                "name": "Winter Boots!",
                "slug": "winter-boots",
                "description": "Warm ones",
                "image": {"src": "https://cdn.example/boots.jpg"},
                "menu_order": 3
            })
        );
    }

    #[test]
    fn test_category_body_parent_only_when_nonzero() {
        let request = CreateRequest::new("Boots").with_slug("BOOTS").with_parent(Some(RemoteId(0)));
        let body = build_create_body(EntityKind::Category, &request).unwrap();
        assert!(body.get("parent").is_none());
        assert_eq!(body["slug"], "boots");

        let request = CreateRequest::new("Boots").with_parent(Some(RemoteId(15)));
        let body = build_create_body(EntityKind::Category, &request).unwrap();
        assert_eq!(body["parent"], 15);
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let result = build_create_body(EntityKind::Product, &CreateRequest::new("   "));
        assert!(matches!(result, Err(WooCommerceError::InvalidData { .. })));
    }

    #[test]
    fn test_product_categories_normalized() {
        let request = CreateRequest::new("Red Boot").with_payload(payload(json!({
            "regular_price": "49.00",
            "categories": [12, "13", {"id": 14}, "abc", 0]
        })));

        let body = build_create_body(EntityKind::Product, &request).unwrap();

        assert_eq!(body["regular_price"], "49.00");
        assert_eq!(
            body["categories"],
            json!([{"id": 12}, {"id": 13}, {"id": 14}])
        );
        assert!(body.get("slug").is_none());
    }

    #[test]
    fn test_product_single_category_id() {
        let request =
            CreateRequest::new("Red Boot").with_payload(payload(json!({ "categories": "7" })));
        let body = build_create_body(EntityKind::Product, &request).unwrap();
        assert_eq!(body["categories"], json!([{"id": 7}]));
    }

    #[test]
    fn test_product_images_filtered() {
        let request = CreateRequest::new("Red Boot").with_payload(payload(json!({
            "images": [
                {"id": 0, "src": "https://cdn.example/a.jpg"},
                {"id": 31, "src": "https://cdn.example/b.jpg", "alt": "side"},
                {"src": "https://cdn.example/c.jpg"}
            ]
        })));

        let body = build_create_body(EntityKind::Product, &request).unwrap();
        assert_eq!(
            body["images"],
            json!([{
                "id": 31,
                "src": "https://cdn.example/b.jpg",
                "name": "",
                "alt": "side",
                "position": 0
            }])
        );

        let request = CreateRequest::new("Red Boot")
            .with_payload(payload(json!({ "images": [{"id": "x"}] })));
        let body = build_create_body(EntityKind::Product, &request).unwrap();
        assert!(body.get("images").is_none());
    }

    #[test]
    fn test_derive_slug() {
        assert_eq!(derive_slug("Men's  Shoes"), "mens-shoes");
        assert_eq!(derive_slug("Giày Nam"), "giy-nam");
    }
}

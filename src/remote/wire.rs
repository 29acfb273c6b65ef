/// Wire format normalization
///
/// Servers in the wild spell the same field several ways (`lat` vs
/// `latitude`, `_id` vs `id`, numeric vs string ids). Everything is
/// resolved here, once, into the canonical `Tree`; nothing downstream
/// ever looks at the raw JSON.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::RemoteError;
use crate::state::{Tree, TreeId};

const ID_KEYS: &[&str] = &["id", "_id", "tree_id", "treeId"];
const SPECIES_KEYS: &[&str] = &["species", "treeName", "name"];
const PHOTO_KEYS: &[&str] = &["photoRef", "photo_url", "image", "photo"];
const LATITUDE_KEYS: &[&str] = &["latitude", "lat"];
const LONGITUDE_KEYS: &[&str] = &["longitude", "lon", "lng"];
const UPLOADER_KEYS: &[&str] = &["uploadedBy", "uploader", "user_name", "username"];
const PLANTER_KEYS: &[&str] = &["planterName"];
const USER_ID_KEYS: &[&str] = &["userId", "user_id"];
const PLANTED_KEYS: &[&str] = &["plantedAt", "createdAt", "created_at"];
const LOCATION_KEYS: &[&str] = &["location", "place"];

/// First present, non-null value among alternate keys
fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// String field; numbers are accepted and rendered as text
fn pick_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match pick(obj, keys)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric field; numeric strings are accepted
fn pick_f64(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match pick(obj, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

fn pick_bool(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "true" || s == "1",
        _ => false,
    }
}

fn pick_timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    match pick(obj, keys)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

/// Normalize one server record into the canonical schema
pub fn tree_from_value(value: &Value) -> Result<Tree, RemoteError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RemoteError::InvalidResponse(format!("expected tree object, got {}", value)))?;

    let id = pick_string(obj, ID_KEYS)
        .ok_or_else(|| RemoteError::InvalidResponse("tree without id".to_string()))?;

    let confidence = pick_f64(obj, &["confidence"])
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    Ok(Tree {
        id: TreeId::Canonical(id),
        species: pick_string(obj, SPECIES_KEYS).unwrap_or_else(|| "Unknown".to_string()),
        photo_ref: pick_string(obj, PHOTO_KEYS).unwrap_or_default(),
        latitude: pick_f64(obj, LATITUDE_KEYS),
        longitude: pick_f64(obj, LONGITUDE_KEYS),
        description: pick_string(obj, &["description"]).unwrap_or_default(),
        confidence,
        verified: pick_bool(obj, "verified"),
        planted_at: pick_timestamp(obj, PLANTED_KEYS).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        uploaded_by: pick_string(obj, UPLOADER_KEYS),
        planter_name: pick_string(obj, PLANTER_KEYS),
        location: pick_string(obj, LOCATION_KEYS),
        user_id: pick_string(obj, USER_ID_KEYS),
    })
}

/// Normalize a list response: a bare array, `{trees: [...]}` or `{data: [...]}`
///
/// Records that can't be normalized are logged and skipped.
pub fn trees_from_list(body: &Value) -> Result<Vec<Tree>, RemoteError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(obj) => ["trees", "data"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .ok_or_else(|| RemoteError::InvalidResponse("list response without trees".to_string()))?,
        other => {
            return Err(RemoteError::InvalidResponse(format!("unexpected list response: {}", other)))
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| match tree_from_value(item) {
            Ok(tree) => Some(tree),
            Err(e) => {
                warn!("Skipping unusable tree record: {}", e);
                None
            }
        })
        .collect())
}

/// Normalize a create response: the tree itself or `{tree: {...}}`
pub fn tree_from_create(body: &Value) -> Result<Tree, RemoteError> {
    match body.get("tree") {
        Some(inner) if inner.is_object() => tree_from_value(inner),
        _ => tree_from_value(body),
    }
}

/// Human-readable message from an error body
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    pick_string(value.as_object()?, &["error", "message"])
}

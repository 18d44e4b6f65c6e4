//! Context items and normalization of raw provider output.
//!
//! Providers hand back loosely-typed JSON ([`RawItem`]). Before anything
//! downstream sees it, each value is validated and repaired into a
//! [`ContextItem`]:
//!
//! - values that are not a supported record shape are dropped,
//! - a missing or unsafe `id` is replaced with a generated one,
//! - an `importance` outside `0..=100` (or not an integer) drops the item,
//! - `type` defaults to `Trait`.
//!
//! [`normalize_all`] additionally de-duplicates ids across one provider's
//! result set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Unvalidated item as produced by a resolver.
pub type RawItem = Value;

/// Upper bound (inclusive) of a valid importance.
pub const MAX_IMPORTANCE: u64 = 100;

/// Item type used when a raw item omits `type`.
pub const DEFAULT_ITEM_TYPE: &str = "Trait";

/// Typed payload of a context item, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ItemBody {
    /// A named fact about the code base (e.g. "TypeScript version": "5.4").
    Trait { name: String, value: String },
    /// A snippet of code from another file.
    #[serde(rename_all = "camelCase")]
    CodeSnippet {
        uri: String,
        value: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        additional_uris: Vec<String>,
    },
}

/// A validated context item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextItem {
    /// Identifier, unique within one provider's result set.
    pub id: String,
    /// Optional importance in `0..=100`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
    #[serde(flatten)]
    pub body: ItemBody,
}

impl ContextItem {
    /// The item type name (`Trait`, `CodeSnippet`).
    pub fn type_name(&self) -> &'static str {
        match self.body {
            ItemBody::Trait { .. } => "Trait",
            ItemBody::CodeSnippet { .. } => "CodeSnippet",
        }
    }
}

/// Whether `id` is safe to use as an item identifier.
///
/// Safe ids are non-empty and made of ASCII letters, digits, `-` and `_`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Generate a fresh item id.
pub fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

fn importance_of(obj: &Map<String, Value>) -> Result<Option<u8>, ()> {
    match obj.get("importance") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            // Whole floats such as `50.0` count as integers.
            let whole = n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && (0.0..=MAX_IMPORTANCE as f64).contains(f))
                    .map(|f| f as u64)
            });
            match whole {
                Some(i) if i <= MAX_IMPORTANCE => u8::try_from(i).map(Some).map_err(|_| ()),
                _ => Err(()),
            }
        }
        Some(_) => Err(()),
    }
}

/// Normalize a single raw item, or `None` when it must be dropped.
pub fn normalize(raw: &RawItem) -> Option<ContextItem> {
    let Value::Object(obj) = raw else {
        debug!("Dropping context item that is not an object");
        return None;
    };

    let Ok(importance) = importance_of(obj) else {
        debug!(importance = ?obj.get("importance"), "Dropping context item with invalid importance");
        return None;
    };

    let mut body_fields = obj.clone();
    body_fields.remove("id");
    body_fields.remove("importance");
    if !matches!(body_fields.get("type"), Some(Value::String(_))) {
        body_fields.insert("type".to_string(), Value::from(DEFAULT_ITEM_TYPE));
    }

    let body = match serde_json::from_value::<ItemBody>(Value::Object(body_fields)) {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Dropping context item with unsupported schema");
            return None;
        }
    };

    let id = match obj.get("id") {
        Some(Value::String(id)) if is_valid_id(id) => id.clone(),
        _ => generate_id(),
    };

    Some(ContextItem {
        id,
        importance,
        body,
    })
}

/// Normalize one provider's full result set.
///
/// Invalid items are dropped; the first occurrence of an id keeps it, later
/// duplicates get a freshly generated id.
pub fn normalize_all(raw: Vec<RawItem>) -> Vec<ContextItem> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(normalize)
        .map(|mut item| {
            while !seen.insert(item.id.clone()) {
                item.id = generate_id();
            }
            item
        })
        .collect()
}

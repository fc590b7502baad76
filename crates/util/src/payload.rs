//! JSON payload helpers: dotted-path selection, collection extraction, and
//! response limiting.

use serde_json::{Map, Value};

/// Wrapper keys probed, in order, when a payload is an object around a list.
const RESPONSE_ARRAY_PRIORITY_KEYS: &[&str] = &[
    "items", "results", "data", "values", "entries", "records", "list", "accounts", "users", "members",
];

/// Select a nested JSON value by a minimal dot path with optional numeric indices.
///
/// Supports segments like `a`, `a.b`, and array indices `a[0].b[1]`. Returns `None`
/// when any segment is missing or applied to the wrong JSON type. When `path` is
/// `None` or blank, the input `value` is cloned and returned as-is.
pub fn select_path(value: &Value, path: Option<&str>) -> Option<Value> {
    let Some(path) = path else {
        return Some(value.clone());
    };
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Some(value.clone());
    }

    let mut current = value;
    for segment in trimmed.split('.') {
        if segment.is_empty() {
            continue;
        }
        let (key, indices) = split_indices(segment);
        if !key.is_empty() {
            current = match current {
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                other => other.get(key)?,
            };
        }
        for index in indices {
            current = current.get(index)?;
        }
    }
    Some(current.clone())
}

fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    let Some(key_end) = segment.find('[') else {
        return (segment, Vec::new());
    };
    let key = &segment[..key_end];
    let mut indices = Vec::new();
    let mut rest = &segment[key_end..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            break;
        };
        if let Ok(index) = stripped[..close].trim().parse::<usize>() {
            indices.push(index);
        }
        rest = &stripped[close + 1..];
    }
    (key, indices)
}

/// Items of a top-level array or of a well-known wrapper key (`items`, `data`, ...).
pub fn list_items(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items.clone()),
        Value::Object(map) => RESPONSE_ARRAY_PRIORITY_KEYS.iter().find_map(|key| match map.get(*key) {
            Some(Value::Array(items)) => Some(items.clone()),
            _ => None,
        }),
        _ => None,
    }
}

/// Extract list-like collection items from payloads.
///
/// Extraction order:
/// 1. Use the explicit `list_path` if provided and it resolves to an array.
/// 2. Use a top-level array payload directly.
/// 3. Apply deterministic wrapper-key heuristics.
/// 4. Fall back to a single array-valued field in wrapper objects.
pub fn extract_collection_items(payload: &Value, list_path: Option<&str>) -> Option<Vec<Value>> {
    if let Some(path) = list_path {
        return match select_path(payload, Some(path))? {
            Value::Array(items) => Some(items),
            _ => None,
        };
    }

    if let Some(items) = list_items(payload) {
        return Some(items);
    }
    match payload {
        Value::Object(map) => {
            let mut arrays = map.values().filter_map(|value| match value {
                Value::Array(items) => Some(items.clone()),
                _ => None,
            });
            let first = arrays.next()?;
            if arrays.next().is_none() {
                return Some(first);
            }
            None
        }
        _ => None,
    }
}

/// Result of limiting a payload to a maximum number of list items.
#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedPayload {
    pub payload: Value,
    pub total_count: usize,
    pub returned_count: usize,
    pub truncated: bool,
}

impl TruncatedPayload {
    /// Human-readable note describing the cut, when one happened.
    pub fn note(&self) -> Option<String> {
        self.truncated.then(|| {
            format!(
                "Response limited to {} items out of {} total items",
                self.returned_count, self.total_count
            )
        })
    }
}

/// Limit list payloads (top-level arrays or well-known wrapper fields) to `max_items`.
///
/// A `max_items` of zero disables limiting.
pub fn truncate_collection(payload: Value, max_items: usize) -> TruncatedPayload {
    match payload {
        Value::Array(mut items) => {
            let total_count = items.len();
            let truncated = max_items > 0 && total_count > max_items;
            if truncated {
                items.truncate(max_items);
            }
            TruncatedPayload {
                returned_count: items.len(),
                payload: Value::Array(items),
                total_count,
                truncated,
            }
        }
        Value::Object(map) => truncate_wrapper_fields(map, max_items),
        other => TruncatedPayload {
            payload: other,
            total_count: 1,
            returned_count: 1,
            truncated: false,
        },
    }
}

fn truncate_wrapper_fields(mut map: Map<String, Value>, max_items: usize) -> TruncatedPayload {
    let mut total_count = 1;
    let mut returned_count = 1;
    let mut truncated = false;
    for key in RESPONSE_ARRAY_PRIORITY_KEYS {
        let Some(Value::Array(items)) = map.get_mut(*key) else {
            continue;
        };
        total_count = items.len();
        if max_items > 0 && items.len() > max_items {
            items.truncate(max_items);
            truncated = true;
        }
        returned_count = items.len();
        break;
    }
    TruncatedPayload {
        payload: Value::Object(map),
        total_count,
        returned_count,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_path_supports_indices_and_nested_keys() {
        let value = json!({ "items": [{ "id": "acc_1" }, { "id": "acc_2", "owner": { "name": "Jane" } }] });
        assert_eq!(select_path(&value, Some("items[0].id")), Some(json!("acc_1")));
        assert_eq!(select_path(&value, Some("items.1.owner.name")), Some(json!("Jane")));
        assert_eq!(select_path(&value, Some("items[5].id")), None);
        assert_eq!(select_path(&value, None), Some(value.clone()));
    }

    #[test]
    fn extract_prefers_explicit_path_then_wrapper_keys() {
        let payload = json!({ "meta": { "rows": [1, 2] }, "data": [3] });
        assert_eq!(extract_collection_items(&payload, Some("meta.rows")), Some(vec![json!(1), json!(2)]));
        assert_eq!(extract_collection_items(&payload, None), Some(vec![json!(3)]));
        assert_eq!(extract_collection_items(&payload, Some("meta")), None);
        assert_eq!(extract_collection_items(&json!({ "a": [1], "b": [2] }), None), None);
        assert_eq!(extract_collection_items(&json!({ "only": [7] }), None), Some(vec![json!(7)]));
        assert_eq!(list_items(&json!({ "id": "acc_1", "tags": ["a"] })), None);
    }

    #[test]
    fn truncate_limits_arrays_and_wrapper_fields() {
        let limited = truncate_collection(json!([1, 2, 3, 4]), 2);
        assert!(limited.truncated);
        assert_eq!(limited.payload, json!([1, 2]));
        assert_eq!((limited.total_count, limited.returned_count), (4, 2));
        assert!(limited.note().is_some_and(|note| note.contains("2 items out of 4")));

        let wrapped = truncate_collection(json!({ "items": [1, 2, 3], "status": "ok" }), 1);
        assert!(wrapped.truncated);
        assert_eq!(wrapped.payload, json!({ "items": [1], "status": "ok" }));

        let untouched = truncate_collection(json!({ "id": "acc_1" }), 1);
        assert!(!untouched.truncated);
        assert!(untouched.note().is_none());
    }
}

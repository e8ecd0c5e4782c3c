// Merges values produced by independent reader calls into one result tree.
// A single required-tree query fans out into many small reads (one per
// leaf), each producing a fragment keyed by its own path; this module is
// what stitches those fragments back into the shape the caller asked for.

use serde_json::{Map, Value};

/// The sentinel written in place of a list/dict that exceeded
/// `max_list_size`/`max_dict_size`, carrying the reference a caller can
/// re-request explicitly to page through it.
pub const INTERNAL_REF_PREFIX: &str = "__INTERNAL__:";

pub fn internal_ref_sentinel(reference: &str) -> Value {
    Value::String(format!("{INTERNAL_REF_PREFIX}{reference}"))
}

pub fn strip_internal_ref_prefix(value: &str) -> Option<&str> {
    value.strip_prefix(INTERNAL_REF_PREFIX)
}

/// Write `value` into `root` at `path`, creating intermediate containers as
/// needed and merging with anything already present at the destination
/// rather than overwriting it.
///
/// `path_like` controls how purely-numeric path segments are interpreted:
/// when true (the segment came from a bracketed list index, e.g. `run[0]`),
/// numeric segments address array positions; when false (the segment is an
/// ordinary dict key that happens to look like a number, e.g. a user id),
/// they are treated as object keys instead.
pub fn populate_result(root: &mut Value, path: &[String], value: Value, path_like: bool) {
    if path.is_empty() {
        merge_values(root, value);
        return;
    }

    let (head, rest) = (&path[0], &path[1..]);

    if path_like {
        if let Ok(index) = head.parse::<usize>() {
            let list = ensure_list(root);
            if list.len() <= index {
                list.resize(index + 1, Value::Null);
            }
            populate_result(&mut list[index], rest, value, path_like);
            return;
        }
    }

    let map = ensure_object(root);
    let entry = map.entry(head.clone()).or_insert(Value::Null);
    populate_result(entry, rest, value, path_like);
}

/// Walk `path` from `root`, returning a mutable reference to whatever sits
/// there. Every segment addresses an object key; unlike [`populate_result`]
/// this never creates missing containers, so it is only meaningful after a
/// prior `populate_result` call has built the path out.
pub fn get_path_mut<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut().expect("just coerced to object")
}

fn ensure_list(slot: &mut Value) -> &mut Vec<Value> {
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut().expect("just coerced to array")
}

/// Recursively merge `incoming` into `existing`. Objects merge key by key;
/// arrays merge position by position, padding the shorter side with `null`
/// rather than truncating; any other clash (including a scalar meeting a
/// container) lets `incoming` win, matching how a more specific, later
/// write is expected to refine an earlier, coarser one.
pub fn merge_values(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match existing_map.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        existing_map.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(existing_list), Value::Array(incoming_list)) => {
            if existing_list.len() < incoming_list.len() {
                existing_list.resize(incoming_list.len(), Value::Null);
            }
            for (slot, value) in existing_list.iter_mut().zip(incoming_list) {
                merge_values(slot, value);
            }
        }
        (slot, incoming) => {
            if !incoming.is_null() {
                *slot = incoming;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_populate_nested_object_path() {
        let mut root = Value::Object(Map::new());
        populate_result(
            &mut root,
            &["entries".to_string(), "e1".to_string(), "name".to_string()],
            json!("sample"),
            false,
        );
        assert_eq!(root["entries"]["e1"]["name"], json!("sample"));
    }

    #[test]
    fn test_populate_list_index_with_padding() {
        let mut root = Value::Object(Map::new());
        populate_result(
            &mut root,
            &["run".to_string(), "2".to_string()],
            json!({"method": "dft"}),
            true,
        );
        let run = root["run"].as_array().expect("array");
        assert_eq!(run.len(), 3);
        assert_eq!(run[0], Value::Null);
        assert_eq!(run[2]["method"], json!("dft"));
    }

    #[test]
    fn test_numeric_segment_not_path_like_stays_object_key() {
        let mut root = Value::Object(Map::new());
        populate_result(
            &mut root,
            &["users".to_string(), "42".to_string(), "name".to_string()],
            json!("ada"),
            false,
        );
        assert!(root["users"].is_object());
        assert_eq!(root["users"]["42"]["name"], json!("ada"));
    }

    #[test]
    fn test_merge_values_combines_disjoint_keys() {
        let mut existing = json!({"a": 1});
        merge_values(&mut existing, json!({"b": 2}));
        assert_eq!(existing, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_merge_values_recurses_into_shared_keys() {
        let mut existing = json!({"a": {"x": 1}});
        merge_values(&mut existing, json!({"a": {"y": 2}}));
        assert_eq!(existing, json!({"a": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_merge_values_arrays_merge_by_position() {
        let mut existing = json!([1, null, 3]);
        merge_values(&mut existing, json!([null, 2, null]));
        assert_eq!(existing, json!([1, 2, 3]));
    }

    #[test]
    fn test_merge_values_is_commutative_on_disjoint_data() {
        let a = json!({"a": 1});
        let b = json!({"b": 2});

        let mut merged_ab = a.clone();
        merge_values(&mut merged_ab, b.clone());

        let mut merged_ba = b;
        merge_values(&mut merged_ba, a);

        assert_eq!(merged_ab, merged_ba);
    }

    #[test]
    fn test_internal_ref_sentinel_roundtrip() {
        let sentinel = internal_ref_sentinel("#/entries/e1/archive/run");
        let s = sentinel.as_str().expect("string sentinel");
        assert_eq!(
            strip_internal_ref_prefix(s),
            Some("#/entries/e1/archive/run")
        );
    }
}

//! JSON tree semantics shared by every store backend.
//!
//! Stored form holds only objects and scalar leaves: arrays become objects
//! keyed `"0"`, `"1"`, ...; nulls and empty objects disappear. Reads convert
//! objects keyed exactly `0..n` back into arrays.

use serde_json::{Map, Value};

/// Converts a value to stored form. `None` means "nothing to store".
pub(crate) fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let map: Map<String, Value> = items
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| normalize(v).map(|v| (i.to_string(), v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        leaf => Some(leaf),
    }
}

/// Converts stored form to the shape callers see.
pub(crate) fn to_wire(value: &Value) -> Value {
    match value {
        Value::Object(map) => match as_array(map) {
            Some(items) => Value::Array(items),
            None => Value::Object(map.iter().map(|(k, v)| (k.clone(), to_wire(v))).collect()),
        },
        other => other.clone(),
    }
}

fn as_array(map: &Map<String, Value>) -> Option<Vec<Value>> {
    if map.is_empty() {
        return None;
    }
    let mut items = vec![Value::Null; map.len()];
    for (key, value) in map {
        let index: usize = key.parse().ok()?;
        if index >= items.len() || *key != index.to_string() {
            return None;
        }
        items[index] = to_wire(value);
    }
    Some(items)
}

pub(crate) fn get<'a>(root: &'a Map<String, Value>, segs: &[String]) -> Option<&'a Value> {
    let (first, rest) = segs.split_first()?;
    rest.iter()
        .try_fold(root.get(first)?, |node, seg| node.as_object()?.get(seg))
}

/// Replaces the subtree at `segs`. `None` removes it; emptied parents go too.
///
/// `segs` must not be empty and `value` must already be normalized.
pub(crate) fn put(root: &mut Map<String, Value>, segs: &[String], value: Option<Value>) {
    let Some((first, rest)) = segs.split_first() else {
        return;
    };
    if rest.is_empty() {
        match value {
            Some(v) => {
                root.insert(first.clone(), v);
            }
            None => {
                root.remove(first);
            }
        }
        return;
    }

    if value.is_none() && !root.get(first).is_some_and(Value::is_object) {
        return;
    }
    let child = root
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    let emptied = match child {
        Value::Object(map) => {
            put(map, rest, value);
            map.is_empty()
        }
        _ => false,
    };
    if emptied {
        root.remove(first);
    }
}

/// Flattens a stored-form value into `(path, json leaf)` rows.
pub(crate) fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&crate::paths::join(prefix, key), child, out);
            }
        }
        leaf => out.push((prefix.to_string(), leaf.to_string())),
    }
}

/// Rebuilds the stored-form subtree at `base` from flattened rows.
pub(crate) fn unflatten(base: &[String], rows: Vec<(Vec<String>, Value)>) -> Option<Value> {
    let mut root = Map::new();
    for (segs, leaf) in rows {
        let Some(relative) = segs.get(base.len()..) else {
            continue;
        };
        if relative.is_empty() {
            return Some(leaf);
        }
        put(&mut root, relative, Some(leaf));
    }
    (!root.is_empty()).then_some(Value::Object(root))
}

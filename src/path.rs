//! Dot-delimited access into `serde_json::Value` trees.
//!
//! Form values and nested error groups are both addressed with paths such as
//! `"address.city"`. Segments are plain object keys; no index or escape syntax
//! is interpreted.

use serde_json::{Map, Value};

pub const DELIMITER: char = '.';

pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(DELIMITER)
}

pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{DELIMITER}{key}")
    }
}

/// Returns the value at `path`, or `None` if any segment is missing or walks
/// through a non-object.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at `path`, creating intermediate objects. Intermediates that
/// hold a non-object value are replaced. A non-object root is replaced with an
/// empty object first.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let mut parts = segments(path).peekable();
    let mut current = root;
    while let Some(segment) = parts.next() {
        let map = ensure_object(current);
        if parts.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

pub fn remove(root: &mut Value, path: &str) -> Option<Value> {
    let (parent, leaf) = match path.rsplit_once(DELIMITER) {
        Some((parent, leaf)) => (get_mut(root, parent)?, leaf),
        None => (root, path),
    };
    parent.as_object_mut()?.remove(leaf)
}

pub fn get_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments(path) {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

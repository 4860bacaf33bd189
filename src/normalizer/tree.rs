//! Path-addressed access to a parsed JSON payload.
//!
//! Paths are dot-separated segments such as `request.contents.0.role`. A
//! numeric segment indexes an array when the current node is an array and
//! names a key otherwise. On [`set`], the segment `-1` appends to an array.
//!
//! The tree is a `serde_json::Value` built with `preserve_order`, so keys the
//! engine does not touch keep their position, and with `arbitrary_precision`,
//! so numbers are carried through verbatim.

use serde_json::{Map, Value};

use crate::core::NormalizeError;

/// Array segment that appends a new element on [`set`].
pub const APPEND_SEGMENT: &str = "-1";

fn segments(path: &str) -> Result<Vec<&str>, NormalizeError> {
    if path.is_empty() {
        return Err(NormalizeError::InvalidPath(path.to_string()));
    }
    let segs: Vec<&str> = path.split('.').collect();
    if segs.iter().any(|s| s.is_empty()) {
        return Err(NormalizeError::InvalidPath(path.to_string()));
    }
    Ok(segs)
}

fn not_a_container(path: &str, segment: &str) -> NormalizeError {
    NormalizeError::NotAContainer {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

/// Read the node at `path`, or `None` when any segment is missing.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segs = segments(path).ok()?;
    segs.into_iter().try_fold(root, child)
}

/// Mutable access to the node at `path`.
pub fn get_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let segs = segments(path).ok()?;
    let mut node = root;
    for seg in segs {
        node = child_mut(node, seg)?;
    }
    Some(node)
}

pub fn exists(root: &Value, path: &str) -> bool {
    get(root, path).is_some()
}

/// Length of the array at `path`; zero when absent or not an array.
pub fn array_len(root: &Value, path: &str) -> usize {
    get(root, path)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

fn descend_or_create<'a>(
    node: &'a mut Value,
    segment: &str,
    path: &str,
) -> Result<&'a mut Value, NormalizeError> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            if segment == APPEND_SEGMENT {
                let idx = items.len();
                items.push(Value::Object(Map::new()));
                return Ok(&mut items[idx]);
            }
            match segment.parse::<usize>() {
                Ok(i) if i < items.len() => Ok(&mut items[i]),
                _ => Err(not_a_container(path, segment)),
            }
        }
        _ => Err(not_a_container(path, segment)),
    }
}

fn assign(node: &mut Value, segment: &str, value: Value, path: &str) -> Result<(), NormalizeError> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            map.insert(segment.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if segment == APPEND_SEGMENT {
                items.push(value);
                return Ok(());
            }
            match segment.parse::<usize>() {
                Ok(i) if i < items.len() => {
                    items[i] = value;
                    Ok(())
                }
                Ok(i) if i == items.len() => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(not_a_container(path, segment)),
            }
        }
        _ => Err(not_a_container(path, segment)),
    }
}

/// Write `value` at `path`, creating missing intermediate objects.
///
/// An existing key keeps its position in the parent object; a new key is
/// appended at the end.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<(), NormalizeError> {
    let segs = segments(path)?;
    let Some((last, parents)) = segs.split_last() else {
        return Err(NormalizeError::InvalidPath(path.to_string()));
    };

    let mut node = root;
    for seg in parents {
        node = descend_or_create(node, seg, path)?;
    }
    assign(node, last, value, path)
}

/// Remove the node at `path`, returning it. Sibling order is preserved.
pub fn delete(root: &mut Value, path: &str) -> Option<Value> {
    let segs = segments(path).ok()?;
    let (last, parents) = segs.split_last()?;

    let mut node = root;
    for seg in parents {
        node = child_mut(node, seg)?;
    }
    match node {
        Value::Object(map) => map.shift_remove(*last),
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => Some(items.remove(i)),
            _ => None,
        },
        _ => None,
    }
}

/// Move the value at `from` to `to` without touching the value itself.
///
/// Returns `Ok(false)` when `from` does not exist.
pub fn rename(root: &mut Value, from: &str, to: &str) -> Result<bool, NormalizeError> {
    let Some(value) = delete(root, from) else {
        return Ok(false);
    };
    set(root, to, value)?;
    Ok(true)
}

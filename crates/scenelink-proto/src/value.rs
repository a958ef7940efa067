// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Path helpers for reading and writing text-keyed CBOR maps.

use crate::Value;

/// Field `name` of a map value.
pub fn map_get<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| k.as_text() == Some(name))
        .map(|(_, v)| v)
}

/// Nested field lookup (`["world", "background"]`).
pub fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |cur, name| map_get(cur, name))
}

/// Text content of a value.
pub fn text(value: &Value) -> Option<&str> {
    value.as_text()
}

/// Write `new` at `path`, turning non-map intermediates (including the
/// target itself) into empty maps as needed. Other fields are untouched.
pub fn set_path(target: &mut Value, path: &[&str], new: Value) {
    let Some((first, rest)) = path.split_first() else {
        *target = new;
        return;
    };
    if !target.is_map() {
        *target = Value::Map(Vec::new());
    }
    let Value::Map(entries) = target else {
        return;
    };
    let idx = match entries.iter().position(|(k, _)| k.as_text() == Some(*first)) {
        Some(i) => i,
        None => {
            entries.push((Value::Text((*first).to_owned()), Value::Null));
            entries.len() - 1
        }
    };
    set_path(&mut entries[idx].1, rest, new);
}

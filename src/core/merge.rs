//! Deep merge for validation config documents.

use serde_yml::Value;

/// Merges `overlay` onto `base`.
///
/// Maps merge recursively. Any other overlay value, arrays included,
/// replaces the base value outright. Base keys absent from the overlay are kept
/// in their original position.
pub fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => {
                        let current = std::mem::replace(existing, Value::Null);
                        *existing = merge(current, value);
                    }
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

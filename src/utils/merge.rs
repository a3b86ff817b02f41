use serde_json::{Map, Value};

/// Recursively merge `override_map` into a copy of `base`.
///
/// For every key in the override: when both sides hold a mapping the merge
/// descends into it, otherwise the override value replaces the base value.
/// Neither input is modified; the result shares no structure with them.
pub fn merge_maps(base: &Map<String, Value>, override_map: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.clone();
    for (key, value) in override_map {
        match (result.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                let merged = merge_maps(existing, incoming);
                result.insert(key.clone(), Value::Object(merged));
            }
            _ => {
                result.insert(key.clone(), value.clone());
            }
        }
    }
    result
}

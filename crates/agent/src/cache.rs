//! Tool result cache.
//!
//! Memoizes successful tool outcomes by `(tool name, input)` within a
//! session. Keys are built from a canonical rendering of the input with
//! object keys sorted at every level, so inputs that differ only in key
//! order share an entry.

use std::collections::HashMap;

use botty_core::ToolUpdate;
use serde_json::Value;

/// Everything needed to replay a tool call without running it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutcome {
    /// Every update the tool yielded, terminal one included
    pub updates: Vec<ToolUpdate>,
    pub result: Value,
}

#[derive(Debug, Default)]
pub struct ToolResultCache {
    entries: HashMap<String, CachedOutcome>,
}

impl ToolResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CachedOutcome> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: String, outcome: CachedOutcome) {
        self.entries.insert(key, outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Deterministic cache key for a tool call.
pub fn cache_key(tool_name: &str, input: &Value) -> String {
    let mut key = String::with_capacity(tool_name.len() + 32);
    key.push_str(tool_name);
    key.push(':');
    write_canonical(&mut key, input);
    key
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(out, v);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_ignores_object_key_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": [3, {"q": 1, "p": 0}]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": [3, {"p": 0, "q": 1}], "y": 2}, "b": 1}"#).unwrap();
        assert_eq!(cache_key("geocode", &a), cache_key("geocode", &b));
    }

    #[test]
    fn key_is_canonical_json() {
        let input = json!({"operation": "add", "first_number": 1, "second_number": 2.5});
        assert_eq!(
            cache_key("calculator", &input),
            r#"calculator:{"first_number":1,"operation":"add","second_number":2.5}"#
        );
    }

    #[test]
    fn key_distinguishes_tools_and_values() {
        let input = json!({"address": "Porto"});
        assert_ne!(cache_key("geocode", &input), cache_key("place_details", &input));
        assert_ne!(
            cache_key("geocode", &input),
            cache_key("geocode", &json!({"address": "Lisbon"}))
        );
        // Array order is significant
        assert_ne!(cache_key("t", &json!([1, 2])), cache_key("t", &json!([2, 1])));
    }

    #[test]
    fn put_and_get() {
        let mut cache = ToolResultCache::new();
        assert!(cache.get("k").is_none());
        cache.put(
            "k".into(),
            CachedOutcome {
                updates: vec![ToolUpdate::done("✅ done", json!(42))],
                result: json!(42),
            },
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").unwrap().result, json!(42));
        cache.clear();
        assert!(cache.is_empty());
    }
}

//! Field-by-field merging of configuration tiers.
//!
//! Objects merge recursively; every other value in the overlay replaces the
//! base outright. A null overlay means "not specified" and keeps the base.

use serde_json::Value;

/// Merge `overlay` on top of `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let next = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, next);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold tiers lowest-priority first.
pub fn deep_merge_all(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, deep_merge)
}

/// Dotted paths of the leaf values a tier sets, e.g. `import.default_role`.
pub fn leaf_paths(value: &Value) -> Vec<String> {
    fn walk(value: &Value, prefix: &str, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(child, &path, out);
                }
            }
            Value::Null => {}
            _ if !prefix.is_empty() => out.push(prefix.to_string()),
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(value, "", &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_override_keeps_siblings() {
        let base = json!({"import": {"default_role": "Author", "new_user_status": "locked"}});
        let overlay = json!({"import": {"default_role": "Editor"}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"import": {"default_role": "Editor", "new_user_status": "locked"}})
        );
    }

    #[test]
    fn test_lists_are_replaced() {
        let base = json!({"import": {"protected_settings": ["a", "b"]}});
        let overlay = json!({"import": {"protected_settings": ["c"]}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"import": {"protected_settings": ["c"]}})
        );
    }

    #[test]
    fn test_null_keeps_base() {
        let base = json!({"database": {"path": "a.db"}});
        let overlay = json!({"database": {"path": null}});
        assert_eq!(deep_merge(base, overlay), json!({"database": {"path": "a.db"}}));
    }

    #[test]
    fn test_merge_all_order() {
        let merged = deep_merge_all(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]);
        assert_eq!(merged, json!({"a": 3}));
    }

    #[test]
    fn test_leaf_paths() {
        let tier = json!({"database": {"path": "x.db"}, "import": {"default_role": "Editor", "x": null}});
        let mut paths = leaf_paths(&tier);
        paths.sort();
        assert_eq!(paths, vec!["database.path", "import.default_role"]);
    }
}

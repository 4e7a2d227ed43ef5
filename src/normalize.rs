//! Flattening of nested JSON payloads.
//!
//! GitHub returns commits as nested objects (`author.login`,
//! `commit.author.date`, ...). The ingestion engine flattens them into a single
//! level keyed by the underscore-joined path, so that a push-event summary and
//! the commit detail for the same SHA can be merged into one map before
//! fields are picked out.
//!
//! ```text
//! {"author": {"name": "a", "email": "b"}, "sha": "x"}
//!   → {"author_name": "a", "author_email": "b", "sha": "x"}
//! ```
//!
//! Arrays and `null` are leaves: they are copied through untouched.

use serde_json::{Map, Value};

/// A flattened payload. Ordering carries no meaning; fields are read by name.
pub type FlatMap = Map<String, Value>;

/// Flatten a JSON object into a single-level map.
pub fn flatten(object: &Map<String, Value>) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into(&mut out, None, object);
    out
}

/// Flatten any JSON value. Non-object values yield an empty map.
pub fn flatten_value(value: &Value) -> FlatMap {
    match value {
        Value::Object(object) => flatten(object),
        _ => FlatMap::new(),
    }
}

fn flatten_into(out: &mut FlatMap, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = match prefix {
            Some(p) => format!("{}_{}", p, key),
            None => key.clone(),
        };
        match value {
            Value::Object(child) => flatten_into(out, Some(&path), child),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Merge two flattened maps. Keys present in `overlay` replace those in `base`.
pub fn merge(mut base: FlatMap, overlay: FlatMap) -> FlatMap {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_author_example() {
        let input = json!({"author": {"name": "a", "email": "b"}, "sha": "x"});
        let flat = flatten_value(&input);
        assert_eq!(
            Value::Object(flat),
            json!({"author_name": "a", "author_email": "b", "sha": "x"})
        );
    }

    #[test]
    fn test_flatten_deep_nesting() {
        let input = json!({"commit": {"author": {"date": "2024-01-01T00:00:00Z"}}});
        let flat = flatten_value(&input);
        assert_eq!(flat["commit_author_date"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn test_arrays_and_nulls_are_leaves() {
        let input = json!({"parents": [{"sha": "p1"}], "author": null, "stats": {}});
        let flat = flatten_value(&input);
        assert_eq!(flat["parents"], json!([{"sha": "p1"}]));
        assert_eq!(flat["author"], Value::Null);
        // An empty object contributes no keys.
        assert!(!flat.contains_key("stats"));
    }

    #[test]
    fn test_non_object_flattens_to_empty() {
        assert!(flatten_value(&json!([1, 2, 3])).is_empty());
        assert!(flatten_value(&json!("sha")).is_empty());
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = flatten_value(&json!({"sha": "a", "message": "summary"}));
        let overlay = flatten_value(&json!({"sha": "a", "html_url": "https://github.com/o/r/commit/a"}));
        let merged = merge(base, overlay);
        assert_eq!(merged["message"], json!("summary"));
        assert_eq!(merged["html_url"], json!("https://github.com/o/r/commit/a"));
        assert_eq!(merged.len(), 3);
    }
}

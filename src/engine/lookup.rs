// SPDX-License-Identifier: MIT

//! Attribute path resolution over loosely-typed value trees
//!
//! Paths are dot-separated segments with an optional array-flatten marker:
//! - `details.owner` descends nested maps
//! - `members.[].email` collects `email` from every element of the array
//!   at `members`

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("cannot flatten non-array value at: {0}")]
    NotAnArray(String),
}

/// Resolve a path against a value tree.
///
/// Returns a clone of the resolved value. An empty path resolves to the
/// root itself. Flattened segments (`[]`) require every array element to
/// carry the remaining path.
pub fn lookup(root: &Value, path: &str) -> Result<Value, LookupError> {
    if path.is_empty() {
        return Ok(root.clone());
    }
    let segments: Vec<&str> = path.split('.').collect();
    resolve(root, &segments, path)
}

fn resolve(current: &Value, segments: &[&str], full_path: &str) -> Result<Value, LookupError> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(current.clone());
    };

    if *head == "[]" {
        let Value::Array(items) = current else {
            return Err(LookupError::NotAnArray(full_path.to_string()));
        };
        let mut collected = Vec::with_capacity(items.len());
        for item in items {
            collected.push(resolve(item, rest, full_path)?);
        }
        return Ok(Value::Array(collected));
    }

    match current.get(*head) {
        Some(next) => resolve(next, rest, full_path),
        None => Err(LookupError::PathNotFound(full_path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_top_level() {
        let value = json!({"owner": "ops@example.com"});
        assert_eq!(lookup(&value, "owner").unwrap(), json!("ops@example.com"));
    }

    #[test]
    fn test_lookup_nested() {
        let value = json!({"details": {"is_pii": true, "tier": 2}});
        assert_eq!(lookup(&value, "details.is_pii").unwrap(), json!(true));
        assert_eq!(lookup(&value, "details.tier").unwrap(), json!(2));
    }

    #[test]
    fn test_lookup_empty_path_returns_root() {
        let value = json!({"a": 1});
        assert_eq!(lookup(&value, "").unwrap(), value);
    }

    #[test]
    fn test_lookup_missing_path() {
        let value = json!({"details": {"owner": "x"}});
        let err = lookup(&value, "details.missing").unwrap_err();
        assert!(matches!(err, LookupError::PathNotFound(_)));
        assert!(err.to_string().contains("details.missing"));
    }

    #[test]
    fn test_flatten_collects_subfield() {
        let value = json!({
            "leads": [
                {"email": "a@example.com", "name": "a"},
                {"email": "b@example.com", "name": "b"},
            ]
        });
        assert_eq!(
            lookup(&value, "leads.[].email").unwrap(),
            json!(["a@example.com", "b@example.com"])
        );
    }

    #[test]
    fn test_flatten_on_non_array_fails() {
        let value = json!({"leads": {"email": "a@example.com"}});
        let err = lookup(&value, "leads.[].email").unwrap_err();
        assert!(matches!(err, LookupError::NotAnArray(_)));
    }

    #[test]
    fn test_flatten_element_missing_subfield_fails() {
        let value = json!({"leads": [{"email": "a@example.com"}, {"name": "b"}]});
        let err = lookup(&value, "leads.[].email").unwrap_err();
        assert!(matches!(err, LookupError::PathNotFound(_)));
    }

    #[test]
    fn test_flatten_terminal_marker_returns_elements() {
        let value = json!({"emails": ["a@example.com", "b@example.com"]});
        assert_eq!(
            lookup(&value, "emails.[]").unwrap(),
            json!(["a@example.com", "b@example.com"])
        );
    }
}

//! Canonical JSON encoding for receipt signatures.
//!
//! Receipts are signed over the canonical JSON form of the payload:
//! object keys sorted bytewise ascending, no insignificant whitespace,
//! standard JSON escapes. Any client that reproduces this encoding can
//! verify a receipt against the published Ed25519 key.

use serde_json::Value;

/// Serialize a JSON value canonically.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Value::String handles all JSON string escaping
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_value(out, &map[*key]);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        // Null, Bool, Number, String: serde_json's compact form is canonical
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_stable() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let v = json!({"z": {"b": 1, "a": [1, {"y": 2, "x": 3}]}, "a": null});
        assert_eq!(
            canonical_json(&v),
            r#"{"a":null,"z":{"a":[1,{"x":3,"y":2}],"b":1}}"#
        );
    }

    #[test]
    fn test_no_whitespace() {
        let v = json!({"type": "timestamp", "utc": 1700000000000i64});
        let s = canonical_json(&v);
        assert!(!s.contains(' '), "canonical JSON must not contain spaces");
        assert_eq!(s, r#"{"type":"timestamp","utc":1700000000000}"#);
    }

    #[test]
    fn test_string_escapes() {
        let v = json!({"k": "line\nbreak \"quoted\""});
        assert_eq!(canonical_json(&v), r#"{"k":"line\nbreak \"quoted\""}"#);
    }
}

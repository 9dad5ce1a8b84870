//! Approximate in-memory size of a JSON payload

use serde_json::Value;

const BOOL_BYTES: u64 = 4;
const NUMBER_BYTES: u64 = 8;

/// Estimate the byte size of a value
///
/// Strings count two bytes per UTF-16 code unit. Arrays and objects sum the
/// size of each key plus its value, arrays using their decimal index as the
/// key.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use cacheflow_domain::utils::estimate_size;
///
/// assert_eq!(estimate_size(&json!("ab")), 4);
/// assert_eq!(estimate_size(&json!({ "id": 1 })), 4 + 8);
/// ```
pub fn estimate_size(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => BOOL_BYTES,
        Value::Number(_) => NUMBER_BYTES,
        Value::String(s) => string_size(s),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| string_size(&index.to_string()) + estimate_size(item))
            .sum(),
        Value::Object(fields) => {
            fields.iter().map(|(key, item)| string_size(key) + estimate_size(item)).sum()
        }
    }
}

fn string_size(s: &str) -> u64 {
    2 * s.encode_utf16().count() as u64
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(estimate_size(&Value::Null), 0);
        assert_eq!(estimate_size(&json!(true)), 4);
        assert_eq!(estimate_size(&json!(3.5)), 8);
        assert_eq!(estimate_size(&json!("users")), 10);
    }

    #[test]
    fn test_string_counts_utf16_units() {
        // U+1F600 is a surrogate pair
        assert_eq!(estimate_size(&json!("\u{1F600}")), 4);
        assert_eq!(estimate_size(&json!("é")), 2);
    }

    #[test]
    fn test_array_uses_index_keys() {
        // "0" + "u1", "1" + "u2"
        assert_eq!(estimate_size(&json!(["u1", "u2"])), (2 + 4) * 2);
    }

    #[test]
    fn test_nested_object() {
        let value = json!({ "user": { "id": 7, "active": false } });
        let inner = (4 + 8) + (12 + 4);
        assert_eq!(estimate_size(&value), 8 + inner);
    }
}

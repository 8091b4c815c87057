//! The salvage rule: when an object's field loop parses nothing at all
//! but bytes remain, extract whatever is recognizable instead of handing
//! back an empty object.

use crate::value::{hex_encode, OrderedMap, Value};

const MIN_STRING_LENGTH: usize = 4;

/// Populates `result` (assumed empty) with `_raw_hex`, `_raw_length`, and
/// either `_strings` or a `_json` object (with its top-level keys hoisted)
/// extracted from `data`.
pub fn salvage(data: &[u8], result: &mut OrderedMap) {
    result.insert("_raw_hex".to_string(), Value::String(hex_encode(data)));
    result.insert("_raw_length".to_string(), Value::I64(data.len() as i64));

    match extract_strings(data, MIN_STRING_LENGTH) {
        Some(Extracted::Json(obj)) => {
            for (key, value) in obj.iter() {
                result.insert(key.clone(), value.clone());
            }
            result.insert("_json".to_string(), Value::Map(obj));
        }
        Some(Extracted::Joined(s)) => {
            result.insert("_strings".to_string(), Value::String(s));
        }
        None => {}
    }
}

enum Extracted {
    Json(OrderedMap),
    Joined(String),
}

/// Scans `data` for runs of printable ASCII at least `min_length` long.
/// If any run looks like a JSON object (`{...}`) and parses as one,
/// returns that object; otherwise returns the runs comma-joined.
fn extract_strings(data: &[u8], min_length: usize) -> Option<Extracted> {
    let mut strings = Vec::new();
    let mut current = String::new();

    for &byte in data {
        if (32..127).contains(&byte) {
            current.push(byte as char);
        } else {
            if current.chars().count() >= min_length {
                strings.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.chars().count() >= min_length {
        strings.push(current);
    }

    for candidate in &strings {
        let Some(start) = candidate.find('{') else {
            continue;
        };
        let Some(end) = candidate.rfind('}') else {
            continue;
        };
        if end < start {
            continue;
        }
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&candidate[start..=end]) {
            if let serde_json::Value::Object(map) = json {
                return Some(Extracted::Json(json_object_to_ordered_map(map)));
            }
        }
    }

    if strings.is_empty() {
        None
    } else {
        Some(Extracted::Joined(strings.join(", ")))
    }
}

fn json_object_to_ordered_map(map: serde_json::Map<String, serde_json::Value>) -> OrderedMap {
    map.into_iter()
        .map(|(k, v)| (k, json_to_value(v)))
        .collect()
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::I64(i)
            } else {
                Value::F64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Seq(items.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Map(json_object_to_ordered_map(map)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salvages_plain_strings() {
        let mut data = b"\x01\x02".to_vec();
        data.extend_from_slice(b"Hello");
        data.push(0x00);
        let mut result = OrderedMap::new();
        salvage(&data, &mut result);
        assert_eq!(
            result.get("_strings"),
            Some(&Value::String("Hello".to_string()))
        );
        assert_eq!(result.get("_raw_length"), Some(&Value::I64(data.len() as i64)));
    }

    #[test]
    fn salvages_embedded_json() {
        let data = br#"junk{"a":1,"b":"x"}junk"#;
        let mut result = OrderedMap::new();
        salvage(data, &mut result);
        assert_eq!(result.get("a"), Some(&Value::I64(1)));
        assert_eq!(result.get("b"), Some(&Value::String("x".to_string())));
        assert!(result.contains_key("_json"));
    }

    #[test]
    fn no_salvage_when_nothing_printable() {
        let data = [0x01, 0x02, 0x03];
        let mut result = OrderedMap::new();
        salvage(&data, &mut result);
        assert!(!result.contains_key("_strings"));
        assert!(!result.contains_key("_json"));
    }
}

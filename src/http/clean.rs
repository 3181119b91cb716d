//! Parameter cleaning.
//!
//! # Responsibilities
//! - Decide which query values count as absent
//! - Rebuild read-only query strings without absent values
//! - Deep clean JSON bodies before mutating calls
//!
//! # Design Decisions
//! - Query fragments split on `,` become repeated keys
//! - JSON cleaning only removes `null` and `""`; `0`, `false`, `{}` and `[]`
//!   are real values
//! - Scalars inside arrays are kept; objects inside arrays are cleaned

use serde_json::Value;
use url::form_urlencoded;

/// Query values treated as "not provided".
pub fn is_absent_param(value: &str) -> bool {
    matches!(value, "" | "null" | "undefined")
}

/// Rebuild an encoded query string. Returns `None` when nothing survives.
///
/// ```
/// use console_gateway::http::clean::clean_query;
///
/// assert_eq!(clean_query("k=a,b&x=null&y="), Some("k=a&k=b".to_string()));
/// assert_eq!(clean_query("x=undefined"), None);
/// ```
pub fn clean_query(query: &str) -> Option<String> {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut kept = 0usize;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if is_absent_param(&value) {
            continue;
        }
        for fragment in value.split(',').filter(|f| !f.is_empty()) {
            serializer.append_pair(&key, fragment);
            kept += 1;
        }
    }

    if kept == 0 {
        None
    } else {
        Some(serializer.finish())
    }
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Recursively drop object keys whose value is `null` or `""`.
pub fn clean_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !is_empty_json(v));
            for v in map.values_mut() {
                clean_value(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                clean_value(item);
            }
        }
        _ => {}
    }
}

/// Owned variant of [`clean_value`].
pub fn cleaned(mut value: Value) -> Value {
    clean_value(&mut value);
    value
}

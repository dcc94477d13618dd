//! Helpers for reading unknown-shaped JSON.

use serde_json::Value;

/// Follow a dotted key path (`"SearchRequestStore.results.listings"`).
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// The non-empty array at `path`, if any.
pub fn array_at<'a>(value: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
    lookup_path(value, path)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
}

/// First non-blank string among `keys`; numbers are stringified.
pub fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match lookup_path(value, key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Coerce a value into a non-negative whole number.
///
/// Numbers are rounded; strings keep their digits only, after dropping any
/// fractional part ("18,995.00" -> 18995).
pub fn as_whole_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => {
            let integral = s.split('.').next().unwrap_or(s);
            super::digits_only(integral)
        }
        _ => None,
    }
}

/// First key among `keys` holding something coercible to a whole number.
pub fn first_whole_number(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| lookup_path(value, key).and_then(as_whole_number))
}

/// First key among `keys` holding a finite number (or numeric string).
pub fn first_float(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match lookup_path(value, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
    .filter(|f| f.is_finite())
}

//! Global template functions

use minijinja::{Error, ErrorKind, Value};

/// Abort rendering with `message`
///
/// Usage: {{ fail("replicas must be positive") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// Build a mapping from alternating keys and values
///
/// Usage: {{ dict("app", release.name, "tier", "web") | toyaml }}
pub fn dict(args: Vec<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict requires an even number of arguments (key-value pairs)",
        ));
    }

    let mut map = serde_json::Map::new();
    for pair in args.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        let value = serde_json::to_value(&pair[1])
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        map.insert(key.to_string(), value);
    }

    Ok(Value::from_serialize(serde_json::Value::Object(map)))
}

pub fn list(args: Vec<Value>) -> Value {
    Value::from(args)
}

/// Attribute lookup with a fallback
///
/// Usage: {{ get(values.labels, "team", "platform") }}
pub fn get(obj: Value, key: String, default: Option<Value>) -> Value {
    match obj.get_attr(&key) {
        Ok(v) if !v.is_undefined() && !v.is_none() => v,
        _ => default.unwrap_or(Value::UNDEFINED),
    }
}

/// First argument that is neither undefined, none, nor an empty string
pub fn coalesce(args: Vec<Value>) -> Value {
    args.into_iter()
        .find(|v| !v.is_undefined() && !v.is_none() && v.as_str() != Some(""))
        .unwrap_or(Value::UNDEFINED)
}

/// Usage: {{ ternary("yes", "no", values.enabled) }}
pub fn ternary(true_val: Value, false_val: Value, condition: Value) -> Value {
    if condition.is_true() { true_val } else { false_val }
}

pub fn tostring(value: Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

pub fn toint(value: Value) -> Result<i64, Error> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_str() {
        Some(s) => s.trim().parse::<i64>().map_err(|_| {
            Error::new(ErrorKind::InvalidOperation, format!("cannot convert '{s}' to int"))
        }),
        None => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot convert {value} to int"),
        )),
    }
}

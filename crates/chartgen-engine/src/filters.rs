//! Template filters for Kubernetes manifests
//!
//! Registered under lowercase names, e.g. `{{ values.resources | toyaml | nindent(10) }}`.

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| invalid(e.to_string()))
}

/// Serialize to YAML without the document marker or trailing newline
pub fn toyaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

pub fn tojson(value: Value) -> Result<String, Error> {
    serde_json::to_string(&to_json(&value)?).map_err(|e| invalid(e.to_string()))
}

pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.trim().as_bytes())
        .map_err(|e| invalid(format!("base64 decode error: {e}")))?;
    String::from_utf8(bytes).map_err(|e| invalid(format!("decoded value is not UTF-8: {e}")))
}

fn plain(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None if value.is_none() || value.is_undefined() => String::new(),
        None => value.to_string(),
    }
}

/// Double-quote a scalar, escaping backslashes and quotes
pub fn quote(value: Value) -> String {
    format!("\"{}\"", plain(&value).replace('\\', "\\\\").replace('"', "\\\""))
}

/// Single-quote a scalar YAML style
pub fn squote(value: Value) -> String {
    format!("'{}'", plain(&value).replace('\'', "''"))
}

/// Indent every non-empty line by `spaces`
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like [`indent`], prefixed with a newline
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Fail the render when the value is missing or an empty string
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined() || value.is_none() || value.as_str() == Some("");
    if missing {
        Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ))
    } else {
        Ok(value)
    }
}

/// Truncate to `length` characters
pub fn trunc(value: String, length: usize) -> String {
    value.chars().take(length).collect()
}

pub fn trimprefix(value: String, prefix: String) -> String {
    value.strip_prefix(prefix.as_str()).unwrap_or(&value).to_string()
}

pub fn trimsuffix(value: String, suffix: String) -> String {
    value.strip_suffix(suffix.as_str()).unwrap_or(&value).to_string()
}

/// Hex-encoded SHA-256 digest
pub fn sha256(value: String) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_toyaml() {
        let value = Value::from_serialize(json!({"cpu": "100m", "memory": "128Mi"}));
        assert_eq!(toyaml(value).unwrap(), "cpu: 100m\nmemory: 128Mi");
    }

    #[test]
    fn test_tojson() {
        let value = Value::from_serialize(json!({"a": [1, 2]}));
        assert_eq!(tojson(value).unwrap(), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_b64_roundtrip_and_error() {
        assert_eq!(b64encode("admin".to_string()), "YWRtaW4=");
        assert_eq!(b64decode("YWRtaW4=".to_string()).unwrap(), "admin");
        assert!(b64decode("%%%".to_string()).is_err());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote(Value::from("say \"hi\"")), r#""say \"hi\"""#);
        assert_eq!(quote(Value::from(8080)), "\"8080\"");
        assert_eq!(squote(Value::from("it's")), "'it''s'");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a: 1\n\nb: 2".to_string(), 2), "  a: 1\n\n  b: 2");
        assert_eq!(nindent("a: 1".to_string(), 4), "\n    a: 1");
    }

    #[test]
    fn test_required() {
        assert!(required(Value::UNDEFINED, None).is_err());
        assert!(required(Value::from(""), Some("name is required".to_string())).is_err());
        assert_eq!(required(Value::from(0), None).unwrap(), Value::from(0));
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(trunc("abcdef".to_string(), 3), "abc");
        assert_eq!(trunc("ab".to_string(), 3), "ab");
        assert_eq!(trimprefix("v1.2".to_string(), "v".to_string()), "1.2");
        assert_eq!(trimsuffix("a.yaml".to_string(), ".yaml".to_string()), "a");
    }

    #[test]
    fn test_sha256() {
        assert_eq!(
            sha256("hello".to_string()),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}

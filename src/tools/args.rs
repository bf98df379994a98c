//! Validated tool arguments.

use serde_json::{Map, Value};

use crate::types::{Error, Result};

/// Argument keys whose values never appear in logs.
pub const SENSITIVE_KEYS: &[&str] = &["access_token", "otp", "phone_number"];

/// Arguments after validation, coercion and default filling.
///
/// Accessors return `InvalidArgument` for a missing or mistyped key rather
/// than panicking, though a prepared argument set never triggers that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        self.opt_str(name).ok_or_else(|| missing(name, "string"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn f64(&self, name: &str) -> Result<f64> {
        self.0
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(name, "number"))
    }

    pub fn i64(&self, name: &str) -> Result<i64> {
        self.0
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| missing(name, "integer"))
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        self.0
            .get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(name, "boolean"))
    }

    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }

    /// Copy with sensitive values replaced, safe for debug logging.
    pub fn masked(&self) -> Value {
        mask(&Value::Object(self.0.clone()))
    }
}

/// Replace the values of sensitive keys at any depth.
pub fn mask(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if SENSITIVE_KEYS.contains(&k.as_str()) {
                        Value::String("***".to_string())
                    } else {
                        mask(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask).collect()),
        other => other.clone(),
    }
}

fn missing(name: &str, expected: &str) -> Error {
    Error::invalid_argument(name, format!("expected {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> ToolArgs {
        match v {
            Value::Object(map) => ToolArgs::new(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_typed_accessors() {
        let a = args(json!({"name": "Asha", "lat": 12.5, "page": 2, "on": true, "f": {}}));
        assert_eq!(a.str("name").unwrap(), "Asha");
        assert_eq!(a.f64("lat").unwrap(), 12.5);
        assert_eq!(a.f64("page").unwrap(), 2.0);
        assert_eq!(a.i64("page").unwrap(), 2);
        assert!(a.bool("on").unwrap());
        assert!(a.object("f").is_some());
        assert!(a.opt_str("missing").is_none());
    }

    #[test]
    fn test_accessor_errors_name_field() {
        let a = args(json!({"lat": "north"}));
        let err = a.f64("lat").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref field, .. } if field == "lat"));
    }

    #[test]
    fn test_masking_hides_sensitive_values() {
        let a = args(json!({
            "access_token": "tok",
            "otp": "1234",
            "phone_number": "555",
            "user_id": "u1",
            "updates": {"access_token": "nested"}
        }));
        let masked = a.masked();
        assert_eq!(masked["access_token"], "***");
        assert_eq!(masked["otp"], "***");
        assert_eq!(masked["phone_number"], "***");
        assert_eq!(masked["user_id"], "u1");
        assert_eq!(masked["updates"]["access_token"], "***");
    }
}

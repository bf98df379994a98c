//! Tool catalog: typed parameter metadata, validation, coercion, schemas.
//!
//! Owns tool *metadata* only. Request builders and result shapers live with
//! the tool groups and are wired together by the dispatcher.

use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::collections::HashMap;

use super::args::ToolArgs;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    Object,
    Enum(Vec<String>),
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Check a JSON value against this type, converting lenient encodings
    /// (numeric strings, `"true"`/`"false"`, numbers where a string is
    /// expected) into the canonical form.
    pub fn coerce(&self, value: &Value) -> std::result::Result<Value, String> {
        match self {
            ParamType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("expected string, got {}", value_type_name(other))),
            },
            ParamType::Int => coerce_int(value),
            ParamType::Float => coerce_float(value),
            ParamType::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                other => Err(format!("expected boolean, got {}", value_type_name(other))),
            },
            ParamType::Object => {
                if value.is_object() {
                    Ok(value.clone())
                } else {
                    Err(format!("expected object, got {}", value_type_name(value)))
                }
            }
            ParamType::Enum(variants) => {
                let Some(s) = value.as_str() else {
                    return Err(format!(
                        "expected string for enum, got {}",
                        value_type_name(value)
                    ));
                };
                variants
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(s.trim()))
                    .map(|v| Value::String(v.clone()))
                    .ok_or_else(|| {
                        format!(
                            "invalid enum value '{}', expected one of: {}",
                            s,
                            variants.join(", ")
                        )
                    })
            }
            ParamType::Optional(inner) => {
                if value.is_null() {
                    Ok(Value::Null)
                } else {
                    inner.coerce(value)
                }
            }
        }
    }

    /// JSON Schema fragment for this type.
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Int => json!({"type": "integer"}),
            ParamType::Float => json!({"type": "number"}),
            ParamType::Bool => json!({"type": "boolean"}),
            ParamType::Object => json!({"type": "object"}),
            ParamType::Enum(variants) => json!({"type": "string", "enum": variants}),
            ParamType::Optional(inner) => inner.json_schema(),
        }
    }
}

fn coerce_int(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(Value::Number(Number::from(f as i64)))
            }
            _ => Err(format!("expected integer, got {n}")),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| Value::Number(Number::from(i)))
            .map_err(|_| format!("expected integer, got string '{s}'")),
        other => Err(format!("expected integer, got {}", value_type_name(other))),
    }
}

fn coerce_float(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected number, got string '{s}'")),
        other => Err(format!("expected number, got {}", value_type_name(other))),
    }
}

pub(crate) fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Constraints
// =============================================================================

/// Value constraint checked after coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
    /// String must contain a non-whitespace character.
    NonEmpty,
    /// Object whose values are all strings, numbers or booleans.
    ScalarValues,
}

impl Constraint {
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        match self {
            Constraint::Range { min, max } => match value.as_f64() {
                Some(v) if v >= *min && v <= *max => Ok(()),
                Some(v) => Err(format!("must be between {min} and {max}, got {v}")),
                None => Ok(()),
            },
            Constraint::NonEmpty => match value.as_str() {
                Some(s) if s.trim().is_empty() => Err("must not be empty".to_string()),
                _ => Ok(()),
            },
            Constraint::ScalarValues => {
                let Some(map) = value.as_object() else {
                    return Ok(());
                };
                match map.iter().find(|(_, v)| v.is_array() || v.is_object()) {
                    Some((key, v)) => Err(format!(
                        "value for '{key}' must be a string, number or boolean, got {}",
                        value_type_name(v)
                    )),
                    None => Ok(()),
                }
            }
        }
    }

    fn annotate(&self, schema: &mut Map<String, Value>) {
        match self {
            Constraint::Range { min, max } => {
                schema.insert("minimum".into(), json!(min));
                schema.insert("maximum".into(), json!(max));
            }
            Constraint::NonEmpty => {
                schema.insert("minLength".into(), json!(1));
            }
            Constraint::ScalarValues => {
                schema.insert(
                    "additionalProperties".into(),
                    json!({"type": ["string", "number", "boolean"]}),
                );
            }
        }
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

impl ParamDef {
    pub fn new(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            default: None,
            constraints: Vec::new(),
        }
    }

    /// Optional parameter with no default.
    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self::new(name, ParamType::Optional(Box::new(param_type)), description)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn in_range(self, min: f64, max: f64) -> Self {
        self.with_constraint(Constraint::Range { min, max })
    }

    pub fn non_empty(self) -> Self {
        self.with_constraint(Constraint::NonEmpty)
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.param_type, ParamType::Optional(_))
    }

    /// Coerce and constraint-check a provided value. Errors name this parameter.
    pub fn accept(&self, value: &Value) -> Result<Value> {
        let coerced = self
            .param_type
            .coerce(value)
            .map_err(|msg| Error::invalid_argument(&self.name, msg))?;
        for constraint in &self.constraints {
            constraint
                .check(&coerced)
                .map_err(|msg| Error::invalid_argument(&self.name, msg))?;
        }
        Ok(coerced)
    }

    pub fn json_schema(&self) -> Value {
        let mut schema = match self.param_type.json_schema() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        schema.insert("description".into(), json!(self.description));
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        for constraint in &self.constraints {
            constraint.annotate(&mut schema);
        }
        Value::Object(schema)
    }
}

// =============================================================================
// Tool entry
// =============================================================================

/// Complete tool metadata entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolEntry {
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON Schema object describing the tool arguments.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// MCP `tools/list` descriptor.
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// Validate raw arguments, coerce them and fill defaults.
    ///
    /// Fails with the first offending field: unknown keys are reported
    /// before per-parameter checks, which run in declaration order.
    pub fn prepare(&self, args: Value) -> Result<ToolArgs> {
        let mut provided = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(Error::invalid_argument(
                    "arguments",
                    format!("expected object, got {}", value_type_name(&other)),
                ))
            }
        };

        let mut unknown: Vec<&String> = provided
            .keys()
            .filter(|key| self.param(key).is_none())
            .collect();
        unknown.sort();
        if let Some(key) = unknown.first() {
            return Err(Error::invalid_argument(key.as_str(), "unknown parameter"));
        }

        let mut accepted = Map::new();
        for def in &self.parameters {
            match provided.remove(&def.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    accepted.insert(def.name.clone(), def.accept(&value)?);
                }
                None => {
                    if let Some(default) = &def.default {
                        accepted.insert(def.name.clone(), default.clone());
                    } else if def.is_required() {
                        return Err(Error::invalid_argument(
                            &def.name,
                            "missing required parameter",
                        ));
                    }
                }
            }
        }
        Ok(ToolArgs::new(accepted))
    }
}

// =============================================================================
// Tool catalog
// =============================================================================

/// In-memory tool catalog. Owns metadata, not implementations.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: HashMap<String, ToolEntry>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool entry. Names are unique.
    pub fn register(&mut self, entry: ToolEntry) -> Result<()> {
        if entry.name.is_empty() {
            return Err(Error::config("tool name cannot be empty"));
        }
        if self.entries.contains_key(&entry.name) {
            return Err(Error::config(format!(
                "tool '{}' registered twice",
                entry.name
            )));
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// All tool entries, sorted by name.
    pub fn list_entries(&self) -> Vec<&ToolEntry> {
        let mut entries: Vec<&ToolEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Resolve the tool and prepare its arguments.
    pub fn prepare(&self, name: &str, args: Value) -> Result<ToolArgs> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::unknown_tool(name))?
            .prepare(args)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_entry() -> ToolEntry {
        ToolEntry {
            name: "search".to_string(),
            description: "Search nearby providers".to_string(),
            parameters: vec![
                ParamDef::new("latitude", ParamType::Float, "Latitude").in_range(-90.0, 90.0),
                ParamDef::new("keyword", ParamType::String, "Keyword").with_default(json!("")),
                ParamDef::new("limit", ParamType::Int, "Max results")
                    .with_default(json!(100))
                    .in_range(1.0, 100.0),
                ParamDef::optional("category", ParamType::String, "Category"),
                ParamDef::new(
                    "priority",
                    ParamType::Enum(vec!["low".into(), "medium".into(), "high".into()]),
                    "Priority",
                )
                .with_default(json!("medium")),
            ],
        }
    }

    fn field_of(err: Error) -> String {
        match err {
            Error::InvalidArgument { field, .. } => field,
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();

        assert!(catalog.has_tool("search"));
        assert!(!catalog.has_tool("nonexistent"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.list_names(), vec!["search".to_string()]);
    }

    #[test]
    fn test_register_duplicate_or_empty_fails() {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();
        assert!(catalog.register(sample_entry()).is_err());

        let mut entry = sample_entry();
        entry.name = String::new();
        assert!(catalog.register(entry).is_err());
    }

    #[test]
    fn test_prepare_fills_defaults() {
        let args = sample_entry().prepare(json!({"latitude": 12.9})).unwrap();
        assert_eq!(args.get("keyword"), Some(&json!("")));
        assert_eq!(args.get("limit"), Some(&json!(100)));
        assert_eq!(args.get("priority"), Some(&json!("medium")));
        assert_eq!(args.get("category"), None);
    }

    #[test]
    fn test_prepare_keeps_explicit_values() {
        let args = sample_entry()
            .prepare(json!({"latitude": 1.0, "limit": 5, "category": "food"}))
            .unwrap();
        assert_eq!(args.get("limit"), Some(&json!(5)));
        assert_eq!(args.get("category"), Some(&json!("food")));
    }

    #[test]
    fn test_prepare_missing_required() {
        let err = sample_entry().prepare(json!({})).unwrap_err();
        assert_eq!(field_of(err), "latitude");

        let err = sample_entry().prepare(json!({"latitude": null})).unwrap_err();
        assert_eq!(field_of(err), "latitude");
    }

    #[test]
    fn test_prepare_unknown_param() {
        let err = sample_entry()
            .prepare(json!({"latitude": 1.0, "bogus": true}))
            .unwrap_err();
        assert_eq!(field_of(err), "bogus");
    }

    #[test]
    fn test_prepare_rejects_non_object() {
        let err = sample_entry().prepare(json!([1, 2])).unwrap_err();
        assert_eq!(field_of(err), "arguments");
    }

    #[test]
    fn test_prepare_range_violation_names_field() {
        let err = sample_entry().prepare(json!({"latitude": 91.0})).unwrap_err();
        assert_eq!(err.to_string(), "invalid argument 'latitude': must be between -90 and 90, got 91");

        let err = sample_entry()
            .prepare(json!({"latitude": 0, "limit": 0}))
            .unwrap_err();
        assert_eq!(field_of(err), "limit");
    }

    #[test]
    fn test_coercion() {
        let args = sample_entry()
            .prepare(json!({"latitude": "12.5", "limit": "7", "keyword": 42, "priority": "HIGH"}))
            .unwrap();
        assert_eq!(args.get("latitude"), Some(&json!(12.5)));
        assert_eq!(args.get("limit"), Some(&json!(7)));
        assert_eq!(args.get("keyword"), Some(&json!("42")));
        assert_eq!(args.get("priority"), Some(&json!("high")));

        assert_eq!(ParamType::Bool.coerce(&json!("false")), Ok(json!(false)));
        assert_eq!(ParamType::Int.coerce(&json!(3.0)), Ok(json!(3)));
        assert!(ParamType::Int.coerce(&json!(3.5)).is_err());
        assert!(ParamType::Float.coerce(&json!("north")).is_err());
        assert!(ParamType::Bool.coerce(&json!("yes")).is_err());
        assert!(ParamType::Object.coerce(&json!("{}")).is_err());
    }

    #[test]
    fn test_enum_rejects_unknown_variant() {
        let err = sample_entry()
            .prepare(json!({"latitude": 0, "priority": "urgent"}))
            .unwrap_err();
        assert_eq!(field_of(err), "priority");
    }

    #[test]
    fn test_constraints() {
        assert!(Constraint::NonEmpty.check(&json!("  ")).is_err());
        assert!(Constraint::NonEmpty.check(&json!("x")).is_ok());
        assert!(Constraint::ScalarValues
            .check(&json!({"status": "open", "page": 2, "flag": true}))
            .is_ok());
        assert!(Constraint::ScalarValues.check(&json!({"tags": ["a"]})).is_err());
    }

    #[test]
    fn test_input_schema() {
        let schema = sample_entry().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["latitude"]));
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(
            schema["properties"]["latitude"],
            json!({"type": "number", "description": "Latitude", "minimum": -90.0, "maximum": 90.0})
        );
        assert_eq!(
            schema["properties"]["priority"]["enum"],
            json!(["low", "medium", "high"])
        );
        assert_eq!(schema["properties"]["limit"]["default"], json!(100));
    }

    #[test]
    fn test_descriptor_shape() {
        let descriptor = sample_entry().descriptor();
        assert_eq!(descriptor["name"], "search");
        assert!(descriptor["inputSchema"].is_object());
    }
}

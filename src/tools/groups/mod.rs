//! Built-in tool groups. Each group is a table of `ToolSpec`s.

pub mod auth;
pub mod search;
pub mod user;
pub mod whistle;

use serde_json::Value;

use super::args::ToolArgs;
use super::catalog::{ParamDef, ParamType};
use super::dispatcher::ToolSpec;
use crate::http::DescriptorBuilder;

/// Every built-in tool.
pub fn all() -> Vec<ToolSpec> {
    let mut specs = search::tools();
    specs.extend(auth::tools());
    specs.extend(whistle::tools());
    specs.extend(user::tools());
    specs
}

pub(crate) fn latitude() -> ParamDef {
    ParamDef::new("latitude", ParamType::Float, "Latitude in decimal degrees")
        .in_range(-90.0, 90.0)
}

pub(crate) fn longitude() -> ParamDef {
    ParamDef::new("longitude", ParamType::Float, "Longitude in decimal degrees")
        .in_range(-180.0, 180.0)
}

pub(crate) fn user_id() -> ParamDef {
    ParamDef::new("user_id", ParamType::String, "User id returned by sign_in").non_empty()
}

pub(crate) fn access_token() -> ParamDef {
    ParamDef::optional(
        "access_token",
        ParamType::String,
        "User authentication token from sign_in or verify_otp",
    )
}

/// Forward a caller-supplied token as the `Authorization` header, verbatim.
pub(crate) fn authorize(builder: DescriptorBuilder, args: &ToolArgs) -> DescriptorBuilder {
    match args.opt_str("access_token") {
        Some(token) if !token.trim().is_empty() => builder.header("Authorization", token),
        _ => builder,
    }
}

/// Drop top-level `null` fields so absent optionals stay absent.
pub(crate) fn compact(body: Value) -> Value {
    match body {
        Value::Object(map) => {
            Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_tool_names_unique() {
        let specs = all();
        let names: HashSet<&str> = specs.iter().map(|s| s.entry.name.as_str()).collect();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn test_compact_drops_nulls() {
        assert_eq!(compact(json!({"a": 1, "b": null})), json!({"a": 1}));
    }
}

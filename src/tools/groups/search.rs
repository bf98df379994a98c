//! Proximity search.

use serde_json::{json, Value};

use super::{latitude, longitude};
use crate::http::{RequestDescriptor, Response};
use crate::tools::args::ToolArgs;
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::dispatcher::ToolSpec;
use crate::types::Result;

/// Envelope keys the backend has used for the result list, in preference order.
const LIST_KEYS: &[&str] = &["providers", "matchingWhistles", "results"];

pub fn tools() -> Vec<ToolSpec> {
    vec![ToolSpec::new(
        ToolEntry {
            name: "search".to_string(),
            description: "Search for providers near a location, optionally filtered by keyword and category.".to_string(),
            parameters: vec![
                latitude(),
                longitude(),
                ParamDef::new("keyword", ParamType::String, "Keyword to search for, e.g. \"mechanic\"")
                    .with_default(json!("")),
                ParamDef::new("radius_km", ParamType::Float, "Search radius in kilometers")
                    .with_default(json!(2.0))
                    .in_range(0.1, 100.0),
                ParamDef::new("limit", ParamType::Int, "Maximum number of results")
                    .with_default(json!(100))
                    .in_range(1.0, 100.0),
                ParamDef::optional("category", ParamType::String, "Category filter, e.g. \"service\""),
            ],
        },
        build,
        shape,
    )]
}

fn build(args: &ToolArgs) -> Result<RequestDescriptor> {
    let lat = args.f64("latitude")?;
    let lng = args.f64("longitude")?;
    let body = json!({
        "category": args.opt_str("category"),
        "keyword": args.opt_str("keyword").unwrap_or_default(),
        "limit": args.i64("limit")?,
        "location": [lng, lat],
        "provider": true,
        "radius": args.f64("radius_km")?,
        "visible": true,
    });
    Ok(RequestDescriptor::post("/searchAround").body(body).build())
}

fn shape(response: Response, args: &ToolArgs) -> Result<Value> {
    let providers = extract_list(response.body);
    Ok(json!({
        "total_count": providers.len(),
        "providers": providers,
        "search_radius": args.f64("radius_km")?,
        "search_location": {
            "latitude": args.f64("latitude")?,
            "longitude": args.f64("longitude")?,
        },
    }))
}

/// The result list, unmodified: a top-level array or the first non-empty
/// list under a known envelope key.
fn extract_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => LIST_KEYS
            .iter()
            .filter_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .find(|items| !items.is_empty())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prepared(args: Value) -> ToolArgs {
        tools()[0].entry.prepare(args).unwrap()
    }

    #[test]
    fn test_body_matches_backend_contract() {
        let args = prepared(json!({"latitude": 12.97, "longitude": 77.59, "keyword": "burger"}));
        let request = build(&args).unwrap();
        assert_eq!(request.path(), "/searchAround");
        assert_eq!(
            request.body().unwrap(),
            &json!({
                "category": null,
                "keyword": "burger",
                "limit": 100,
                "location": [77.59, 12.97],
                "provider": true,
                "radius": 2.0,
                "visible": true,
            })
        );
    }

    #[test]
    fn test_radius_bounds() {
        let entry = &tools()[0].entry;
        assert!(entry
            .prepare(json!({"latitude": 0, "longitude": 0, "radius_km": 0.05}))
            .is_err());
        assert!(entry
            .prepare(json!({"latitude": 0, "longitude": 0, "radius_km": 100}))
            .is_ok());
        assert!(entry
            .prepare(json!({"latitude": 0, "longitude": 181}))
            .is_err());
    }

    #[test]
    fn test_shape_keeps_items_unmodified() {
        let args = prepared(json!({"latitude": 1.5, "longitude": 2.5, "radius_km": 5}));
        let items = json!([{"item": {"_id": "a"}, "dis": 0.4}, {"id": "b", "extra": [1]}]);
        let response = Response {
            status: 200,
            body: json!({"matchingWhistles": items.clone()}),
        };
        let data = shape(response, &args).unwrap();
        assert_eq!(data["providers"], items);
        assert_eq!(data["total_count"], 2);
        assert_eq!(data["search_radius"], 5.0);
        assert_eq!(data["search_location"], json!({"latitude": 1.5, "longitude": 2.5}));
    }

    #[test]
    fn test_extract_list_envelopes() {
        assert_eq!(extract_list(json!([1, 2])).len(), 2);
        assert_eq!(extract_list(json!({"providers": [], "results": [3]})), vec![json!(3)]);
        assert!(extract_list(json!({"message": "none"})).is_empty());
        assert!(extract_list(Value::Null).is_empty());
    }
}

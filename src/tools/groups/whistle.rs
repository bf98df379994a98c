//! Whistle CRUD.

use serde_json::json;

use super::{access_token, authorize, latitude, longitude};
use crate::http::{path_segment, RequestDescriptor};
use crate::tools::args::ToolArgs;
use crate::tools::catalog::{Constraint, ParamDef, ParamType, ToolEntry};
use crate::tools::dispatcher::{passthrough, ToolSpec};
use crate::types::Result;

fn whistle_id() -> ParamDef {
    ParamDef::new("whistle_id", ParamType::String, "Id of the whistle").non_empty()
}

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            ToolEntry {
                name: "create_whistle".to_string(),
                description: "Create a new whistle at a location.".to_string(),
                parameters: vec![
                    ParamDef::new("title", ParamType::String, "Whistle title").non_empty(),
                    ParamDef::new("description", ParamType::String, "Detailed description"),
                    latitude(),
                    longitude(),
                    ParamDef::new("category", ParamType::String, "Whistle category").non_empty(),
                    ParamDef::new(
                        "priority",
                        ParamType::Enum(vec!["low".into(), "medium".into(), "high".into()]),
                        "Priority level",
                    )
                    .with_default(json!("medium")),
                    ParamDef::new("is_anonymous", ParamType::Bool, "Create without showing the author")
                        .with_default(json!(false)),
                    access_token(),
                ],
            },
            build_create,
            passthrough,
        ),
        ToolSpec::new(
            ToolEntry {
                name: "update_whistle".to_string(),
                description: "Update fields of an existing whistle.".to_string(),
                parameters: vec![
                    whistle_id(),
                    ParamDef::new("updates", ParamType::Object, "Fields to update"),
                    access_token(),
                ],
            },
            build_update,
            passthrough,
        ),
        ToolSpec::new(
            ToolEntry {
                name: "delete_whistle".to_string(),
                description: "Delete a whistle.".to_string(),
                parameters: vec![whistle_id(), access_token()],
            },
            build_delete,
            passthrough,
        ),
        ToolSpec::new(
            ToolEntry {
                name: "list_whistles".to_string(),
                description: "List whistles with pagination and optional filters.".to_string(),
                parameters: vec![
                    ParamDef::new("page", ParamType::Int, "Page number, starting at 1")
                        .with_default(json!(1))
                        .in_range(1.0, i64::MAX as f64),
                    ParamDef::new("limit", ParamType::Int, "Whistles per page")
                        .with_default(json!(10))
                        .in_range(1.0, 100.0),
                    ParamDef::optional("filters", ParamType::Object, "Extra query filters")
                        .with_constraint(Constraint::ScalarValues),
                    access_token(),
                ],
            },
            build_list,
            passthrough,
        ),
    ]
}

fn build_create(args: &ToolArgs) -> Result<RequestDescriptor> {
    let body = json!({
        "title": args.str("title")?,
        "description": args.str("description")?,
        "location": {
            "lat": args.f64("latitude")?,
            "lng": args.f64("longitude")?,
        },
        "category": args.str("category")?,
        "priority": args.str("priority")?,
        "is_anonymous": args.bool("is_anonymous")?,
    });
    Ok(authorize(RequestDescriptor::post("/whistles").body(body), args).build())
}

fn build_update(args: &ToolArgs) -> Result<RequestDescriptor> {
    let path = format!("/whistles/{}", path_segment(args.str("whistle_id")?));
    let updates = args.get("updates").cloned().unwrap_or_else(|| json!({}));
    Ok(authorize(RequestDescriptor::put(path).body(updates), args).build())
}

fn build_delete(args: &ToolArgs) -> Result<RequestDescriptor> {
    let path = format!("/whistles/{}", path_segment(args.str("whistle_id")?));
    Ok(authorize(RequestDescriptor::delete(path), args).build())
}

/// Filters are merged into the query; `page` and `limit` win on conflict.
fn build_list(args: &ToolArgs) -> Result<RequestDescriptor> {
    let mut builder = RequestDescriptor::get("/whistles");
    if let Some(filters) = args.object("filters") {
        for (key, value) in filters {
            builder = builder.query_value(key.as_str(), value)?;
        }
    }
    builder = builder
        .query("page", args.i64("page")?)
        .query("limit", args.i64("limit")?);
    Ok(authorize(builder, args).build())
}

//! User preference toggles and profile lookup.

use serde_json::{json, Value};

use super::{access_token, authorize, user_id};
use crate::http::{RequestDescriptor, Response};
use crate::tools::args::ToolArgs;
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::dispatcher::{passthrough, BuildFn, ToolSpec};
use crate::types::{Error, Result};

fn toggle(name: &str, description: &str, build: BuildFn) -> ToolSpec {
    ToolSpec::new(
        ToolEntry {
            name: name.to_string(),
            description: description.to_string(),
            parameters: vec![
                user_id(),
                ParamDef::new("enabled", ParamType::Bool, "New value of the setting"),
                access_token(),
            ],
        },
        build,
        passthrough,
    )
}

pub fn tools() -> Vec<ToolSpec> {
    vec![
        toggle(
            "toggle_visibility",
            "Show or hide the user on the map.",
            build_visibility,
        ),
        toggle(
            "toggle_live_tracking",
            "Turn live location tracking on or off.",
            build_live_tracking,
        ),
        toggle(
            "toggle_whistle_sound",
            "Turn the whistle alert sound on or off.",
            build_whistle_sound,
        ),
        ToolSpec::new(
            ToolEntry {
                name: "get_user_profile".to_string(),
                description: "Fetch the signed-in user's profile and whistles.".to_string(),
                parameters: vec![ParamDef::new(
                    "access_token",
                    ParamType::String,
                    "User authentication token from sign_in or verify_otp",
                )
                .non_empty()],
            },
            build_profile,
            shape_profile,
        ),
    ]
}

fn update_setting(args: &ToolArgs, setting: &str) -> Result<RequestDescriptor> {
    let body = json!({
        "userId": args.str("user_id")?,
        setting: args.bool("enabled")?,
    });
    Ok(authorize(RequestDescriptor::put("/user").body(body), args).build())
}

fn build_visibility(args: &ToolArgs) -> Result<RequestDescriptor> {
    update_setting(args, "visible")
}

fn build_live_tracking(args: &ToolArgs) -> Result<RequestDescriptor> {
    update_setting(args, "liveTracking")
}

fn build_whistle_sound(args: &ToolArgs) -> Result<RequestDescriptor> {
    update_setting(args, "whistleSound")
}

fn build_profile(args: &ToolArgs) -> Result<RequestDescriptor> {
    Ok(authorize(RequestDescriptor::get("/user"), args).build())
}

/// Normalize the `user` object: `Whistles` -> `whistles`, `_id` -> `id`,
/// missing `expiry` -> `"never"`. No `user` means the backend found nobody.
fn shape_profile(response: Response, _args: &ToolArgs) -> Result<Value> {
    let user = match response.body {
        Value::Object(mut map) => map.remove("user").filter(Value::is_object),
        _ => None,
    };
    let Some(Value::Object(mut user)) = user else {
        return Err(Error::UpstreamRejected {
            status: 404,
            message: "user not found".to_string(),
            body: Value::Null,
        });
    };

    if let Some(Value::Array(whistles)) = user.remove("Whistles") {
        let whistles: Vec<Value> = whistles.into_iter().map(normalize_whistle).collect();
        user.insert("whistles".to_string(), Value::Array(whistles));
    }
    Ok(Value::Object(user))
}

fn normalize_whistle(whistle: Value) -> Value {
    let Value::Object(mut map) = whistle else {
        return whistle;
    };
    if let Some(id) = map.remove("_id") {
        map.insert("id".to_string(), id);
    }
    let expiry_missing = map
        .get("expiry")
        .map_or(true, |e| e.is_null() || e.as_str() == Some(""));
    if expiry_missing {
        map.insert("expiry".to_string(), json!("never"));
    }
    Value::Object(map)
}

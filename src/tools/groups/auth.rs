//! Phone sign-in and OTP verification.
//!
//! OTP and session semantics belong to the backend; these tools only carry
//! the payloads.

use serde_json::{json, Value};

use super::{compact, latitude, longitude, user_id};
use crate::http::{RequestDescriptor, Response};
use crate::tools::args::ToolArgs;
use crate::tools::catalog::{ParamDef, ParamType, ToolEntry};
use crate::tools::dispatcher::{passthrough, ToolSpec};
use crate::types::Result;

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            ToolEntry {
                name: "sign_in".to_string(),
                description: "Start sign-in for a phone number. The backend sends an OTP; \
                              pass the returned user_id to verify_otp."
                    .to_string(),
                parameters: vec![
                    ParamDef::new("phone_number", ParamType::String, "Phone number without country code")
                        .non_empty(),
                    ParamDef::new("name", ParamType::String, "Display name").non_empty(),
                    latitude(),
                    longitude(),
                    ParamDef::optional("country_code", ParamType::String, "Dialing code, e.g. \"+91\""),
                ],
            },
            build_sign_in,
            shape_sign_in,
        ),
        ToolSpec::new(
            ToolEntry {
                name: "verify_otp".to_string(),
                description: "Verify the OTP sent after sign_in.".to_string(),
                parameters: vec![
                    user_id(),
                    ParamDef::new("otp", ParamType::String, "One-time password").non_empty(),
                ],
            },
            build_verify_otp,
            passthrough,
        ),
        ToolSpec::new(
            ToolEntry {
                name: "resend_otp".to_string(),
                description: "Ask the backend to send a fresh OTP.".to_string(),
                parameters: vec![user_id()],
            },
            build_resend_otp,
            passthrough,
        ),
    ]
}

fn build_sign_in(args: &ToolArgs) -> Result<RequestDescriptor> {
    let body = compact(json!({
        "phone": args.str("phone_number")?,
        "countryCode": args.opt_str("country_code"),
        "name": args.str("name")?,
        "location": [args.f64("latitude")?, args.f64("longitude")?],
    }));
    Ok(RequestDescriptor::post("/auth/signin").body(body).build())
}

/// Backend payload plus a top-level `user_id` lifted from `user.id` / `user._id`.
fn shape_sign_in(response: Response, _args: &ToolArgs) -> Result<Value> {
    let mut body = response.body;
    let user_id = body
        .get("user")
        .and_then(|user| user.get("id").or_else(|| user.get("_id")))
        .filter(|id| id.is_string())
        .cloned();
    if let (Some(id), Some(map)) = (user_id, body.as_object_mut()) {
        map.insert("user_id".to_string(), id);
    }
    Ok(body)
}

fn build_verify_otp(args: &ToolArgs) -> Result<RequestDescriptor> {
    let body = json!({
        "id": args.str("user_id")?,
        "otp": args.str("otp")?,
    });
    Ok(RequestDescriptor::post("/auth/verify-otp").body(body).build())
}

fn build_resend_otp(args: &ToolArgs) -> Result<RequestDescriptor> {
    let body = json!({ "userid": args.str("user_id")? });
    Ok(RequestDescriptor::post("/auth/resend-otp").body(body).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Error;
    use pretty_assertions::assert_eq;

    fn spec(name: &str) -> ToolSpec {
        tools()
            .into_iter()
            .find(|s| s.entry.name == name)
            .unwrap()
    }

    fn request(name: &str, args: Value) -> RequestDescriptor {
        let spec = spec(name);
        (spec.build)(&spec.entry.prepare(args).unwrap()).unwrap()
    }

    #[test]
    fn test_sign_in_body() {
        let req = request(
            "sign_in",
            json!({"phone_number": "9876543210", "name": "Asha", "latitude": 12.9, "longitude": 77.6}),
        );
        assert_eq!(req.path(), "/auth/signin");
        assert_eq!(
            req.body().unwrap(),
            &json!({"phone": "9876543210", "name": "Asha", "location": [12.9, 77.6]})
        );

        let req = request(
            "sign_in",
            json!({"phone_number": 9876543210u64, "name": "Asha", "latitude": 0, "longitude": 0, "country_code": "+91"}),
        );
        assert_eq!(req.body().unwrap()["countryCode"], "+91");
        assert_eq!(req.body().unwrap()["phone"], "9876543210");
    }

    #[test]
    fn test_sign_in_lifts_user_id() {
        let args = ToolArgs::default();
        let response = Response {
            status: 200,
            body: json!({"message": "otp sent", "user": {"_id": "u-42"}}),
        };
        let data = shape_sign_in(response, &args).unwrap();
        assert_eq!(data["user_id"], "u-42");
        assert_eq!(data["message"], "otp sent");

        let response = Response {
            status: 200,
            body: json!({"message": "otp sent"}),
        };
        assert!(shape_sign_in(response, &args).unwrap().get("user_id").is_none());
    }

    #[test]
    fn test_otp_bodies() {
        let req = request("verify_otp", json!({"user_id": "u1", "otp": "123456"}));
        assert_eq!(req.path(), "/auth/verify-otp");
        assert_eq!(req.body().unwrap(), &json!({"id": "u1", "otp": "123456"}));

        let req = request("resend_otp", json!({"user_id": "u1"}));
        assert_eq!(req.path(), "/auth/resend-otp");
        assert_eq!(req.body().unwrap(), &json!({"userid": "u1"}));
    }

    #[test]
    fn test_empty_otp_rejected() {
        let err = spec("verify_otp")
            .entry
            .prepare(json!({"user_id": "u1", "otp": " "}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref field, .. } if field == "otp"));
    }
}

//! Rendering contexts: the namespaces templates are rendered against.
//!
//! Two shapes exist. The OTP context is fixed:
//!
//! ```text
//! user.{email,name,firstName,phone}  otp.{code,expiresIn}  app.{name,url}
//! ```
//!
//! The automation context exposes the raw payload at the top level (so a
//! template can say `{{reason}}`), plus `event.name`, `app.*`, `data.*` and a
//! best-effort `user.*`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::recipient::resolve_email;
use crate::user::{User, first_name};

/// Product identity exposed to templates as `app.*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub url: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "Kadernim".to_string(),
            url: "https://kadernim.com.br".to_string(),
        }
    }
}

/// Default OTP lifetime, in minutes, when the event does not say.
pub const DEFAULT_OTP_EXPIRES_IN: u64 = 10;

/// The payload of an `auth.otp.requested` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRequest {
    pub email: String,
    pub code: String,
    /// Minutes until the code expires.
    pub expires_in: u64,
}

impl OtpRequest {
    /// Read an OTP request from an event payload.
    ///
    /// Returns `None` when `email` or `otp` is missing. The code may be a
    /// string or a number; `expiresIn` defaults to [`DEFAULT_OTP_EXPIRES_IN`].
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let email = payload
            .get("email")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())?
            .to_string();
        let code = match payload.get("otp")? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let expires_in = match payload.get("expiresIn") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .unwrap_or(DEFAULT_OTP_EXPIRES_IN);
        Some(Self {
            email,
            code,
            expires_in,
        })
    }
}

/// Build the OTP rendering context.
///
/// `user` is the account looked up by the request email, if one exists.
#[must_use]
pub fn otp_context(request: &OtpRequest, user: Option<&User>, app: &AppInfo) -> Value {
    let name = user.and_then(|u| u.name.clone()).unwrap_or_default();
    json!({
        "user": {
            "email": request.email,
            "firstName": first_name(&name),
            "name": name,
            "phone": user.and_then(|u| u.phone.clone()),
        },
        "otp": {
            "code": request.code,
            "expiresIn": request.expires_in,
        },
        "app": app,
    })
}

/// Build the generic automation context for `event_name`.
///
/// Pure, total and deterministic: any payload, including non-objects,
/// yields a context object. Payload keys win over the derived namespaces.
#[must_use]
pub fn automation_context(payload: &Value, event_name: &str, app: &AppInfo) -> Value {
    let mut context = match payload {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    context
        .entry("event")
        .or_insert_with(|| json!({"name": event_name}));
    context.entry("app").or_insert_with(|| json!(app));
    context.entry("data").or_insert_with(|| payload.clone());

    let user = derive_user(payload);
    match context.get_mut("user") {
        Some(Value::Object(existing)) => {
            if !existing.contains_key("firstName") {
                if let Some(name) = existing.get("name").and_then(Value::as_str) {
                    let first = first_name(name).to_string();
                    existing.insert("firstName".to_string(), Value::String(first));
                }
            }
        }
        Some(_) => {}
        None => {
            context.insert("user".to_string(), user);
        }
    }
    Value::Object(context)
}

const NAME_FIELDS: &[&str] = &["name", "userName", "authorName"];

fn derive_user(payload: &Value) -> Value {
    let name = NAME_FIELDS
        .iter()
        .find_map(|field| payload.get(field).and_then(Value::as_str))
        .unwrap_or_default();
    json!({
        "email": resolve_email(payload),
        "name": name,
        "firstName": first_name(name),
    })
}

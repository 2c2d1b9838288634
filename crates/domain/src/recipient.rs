//! Recipient resolution: finding who an event is about.
//!
//! Payload shapes differ per event, so recipients are found through a
//! priority-ordered list of conventional field names. Resolution never
//! fails: it either finds something or reports that nothing was found.

use serde_json::Value;

use crate::id::UserId;

/// Fields that may carry the recipient email, in priority order.
pub const EMAIL_FIELDS: &[&str] = &["email", "authorEmail", "userEmail", "recipientEmail"];

/// Fields that may carry the recipient phone, in priority order.
pub const PHONE_FIELDS: &[&str] = &["phone", "whatsapp"];

/// Fields that reference the user whose stored phone should be used.
pub const USER_REFERENCE_FIELDS: &[&str] = &["userId", "authorId"];

/// Where a phone number can come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneSource {
    /// The payload carries the phone directly.
    Direct(String),
    /// The payload references a user whose stored phone must be fetched.
    User(UserId),
    /// Nothing in the payload can lead to a phone.
    Missing,
}

/// Extract the recipient email from `payload`.
///
/// Top-level fields are tried in [`EMAIL_FIELDS`] order, then a nested
/// `user.email`.
#[must_use]
pub fn resolve_email(payload: &Value) -> Option<String> {
    EMAIL_FIELDS
        .iter()
        .find_map(|field| text(payload.get(field)))
        .or_else(|| text(payload.get("user").and_then(|u| u.get("email"))))
}

/// Decide where the recipient phone comes from.
#[must_use]
pub fn resolve_phone(payload: &Value) -> PhoneSource {
    if let Some(phone) = PHONE_FIELDS
        .iter()
        .find_map(|field| text_or_number(payload.get(field)))
    {
        return PhoneSource::Direct(phone);
    }
    USER_REFERENCE_FIELDS
        .iter()
        .find_map(|field| text_or_number(payload.get(field)))
        .map_or(PhoneSource::Missing, |id| PhoneSource::User(UserId::new(id)))
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Phones and user ids sometimes arrive as JSON numbers.
fn text_or_number(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        other => text(Some(other)),
    }
}

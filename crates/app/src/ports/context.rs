//! Context mapping port.

use serde_json::Value;

/// Turns a raw event payload into the namespace templates render against.
///
/// Implementations must be pure, total and deterministic: the same payload
/// and event name always produce the same context, and no input panics.
pub trait ContextMapper: Send + Sync {
    fn build_context(&self, payload: &Value, event_name: &str) -> Value;
}

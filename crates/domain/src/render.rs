//! Template rendering: `{{namespace.path}}` substitution over a JSON context.
//!
//! Rendering is pure and total. A token whose path resolves is replaced by
//! the stringified value; a token whose path does not resolve becomes the
//! empty string. Anything that does not look like a token (`{{}}`,
//! `{{a b}}`, an unterminated `{{`) is copied through verbatim.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

const TOKEN_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)*)\s*\}\}";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(TOKEN_PATTERN).expect("valid regex"));

/// Replace every `{{path}}` token in `template` with its value in `context`.
#[must_use]
pub fn render(template: &str, context: &Value) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures<'_>| {
            lookup(context, &caps[1]).map_or(Cow::Borrowed(""), stringify)
        })
        .into_owned()
}

/// Render an optional template, keeping `None` as `None`.
#[must_use]
pub fn render_opt(template: Option<&str>, context: &Value) -> Option<String> {
    template.map(|t| render(t, context))
}

/// Descend a dot-separated path into `context`.
///
/// Numeric segments index into arrays.
#[must_use]
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn stringify(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

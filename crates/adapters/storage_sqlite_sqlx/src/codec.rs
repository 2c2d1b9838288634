//! Column encodings shared by the repositories.
//!
//! Timestamps are stored as RFC 3339 text with a fixed microsecond
//! precision and a `Z` suffix, so lexical order equals time order.

use std::str::FromStr;

use chrono::SecondsFormat;
use serde::Serialize;
use serde::de::DeserializeOwned;

use kadernim_domain::time::Timestamp;

pub(crate) fn decode_err<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

pub(crate) fn ts(at: Timestamp) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_utc())
        .map_err(decode_err)
}

pub(crate) fn parse_opt_ts(raw: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    raw.as_deref().map(parse_ts).transpose()
}

pub(crate) fn parse<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(decode_err)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(decode_err)
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

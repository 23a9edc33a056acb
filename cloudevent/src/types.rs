//! Attribute value types and the coercion rules between them.
//!
//! Every attribute and extension value is one of the scalar [`Value`]
//! variants. Coercions follow the CloudEvents type system: anything has a
//! canonical string form, strings parse into timestamps and URIs, and an
//! empty string or a zero timestamp counts as "not present".

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// A scalar attribute or extension value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    String(String),
    Binary(Vec<u8>),
    Uri(Url),
    UriRef(String),
    Time(DateTime<Utc>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::String(_) => "String",
            Value::Binary(_) => "Binary",
            Value::Uri(_) => "URI",
            Value::UriRef(_) => "URI-reference",
            Value::Time(_) => "Timestamp",
        }
    }

    /// Empty strings and zero timestamps are equivalent to absence.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) | Value::UriRef(s) => s.is_empty(),
            Value::Time(t) => is_zero_time(t),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::String(s) | Value::UriRef(s) => f.write_str(s),
            Value::Binary(b) => f.write_str(&BASE64.encode(b)),
            Value::Uri(u) => f.write_str(u.as_str()),
            Value::Time(t) => f.write_str(&format_time(t)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<Url> for Value {
    fn from(u: Url) -> Self {
        Value::Uri(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i32(*i),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// Convert a JSON scalar into a [`Value`]. Objects, arrays, null and
/// integers outside the `i32` range are rejected.
pub fn from_json(json: &serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Value::Integer)
            .ok_or_else(|| Error::decode(format!("{n} is not a 32-bit integer"))),
        other => Err(Error::decode(format!(
            "{other} is not a valid attribute value"
        ))),
    }
}

pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        other => serde_json::Value::String(other.to_string()),
    }
}

/// Format a timestamp the way it travels on the wire (RFC3339 with as many
/// sub-second digits as needed).
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::decode(format!("'{s}' is not an RFC3339 timestamp: {e}")))
}

/// The zero instant (0001-01-01T00:00:00Z) stands in for "no time".
pub fn is_zero_time(t: &DateTime<Utc>) -> bool {
    t.year() == 1
        && t.ordinal() == 1
        && t.num_seconds_from_midnight() == 0
        && t.timestamp_subsec_nanos() == 0
}

pub fn parse_uri(s: &str) -> Result<Url> {
    Url::parse(s).map_err(|e| Error::validation(format!("'{s}' is not an absolute URI: {e}")))
}

/// Check that `s` is a URI or a relative URI-reference.
pub fn validate_uri_ref(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::validation("URI-reference is empty"));
    }
    if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::validation(format!(
            "'{s}' is not a URI-reference: contains whitespace"
        )));
    }
    if Url::parse(s).is_ok() {
        return Ok(());
    }
    let base = Url::parse("http://reference.invalid/")
        .map_err(|e| Error::validation(e.to_string()))?;
    base.join(s)
        .map(|_| ())
        .map_err(|e| Error::validation(format!("'{s}' is not a URI-reference: {e}")))
}

/// Coerce a value to its string form.
///
/// Binary values only coerce when they hold valid UTF-8.
pub fn to_string(value: &Value) -> Result<String> {
    match value {
        Value::Binary(b) => String::from_utf8(b.clone())
            .map_err(|_| Error::validation("binary value is not valid UTF-8")),
        other => Ok(other.to_string()),
    }
}

/// Coerce a value to a timestamp. `None` means "not present".
pub fn to_time(value: &Value) -> Result<Option<DateTime<Utc>>> {
    let t = match value {
        Value::Time(t) => *t,
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => parse_time(s)?,
        other => {
            return Err(Error::validation(format!(
                "cannot convert {} to Timestamp",
                other.type_name()
            )));
        }
    };
    Ok(if is_zero_time(&t) { None } else { Some(t) })
}

pub fn to_uri(value: &Value) -> Result<Url> {
    match value {
        Value::Uri(u) => Ok(u.clone()),
        Value::String(s) | Value::UriRef(s) => parse_uri(s),
        other => Err(Error::validation(format!(
            "cannot convert {} to URI",
            other.type_name()
        ))),
    }
}

pub fn to_uri_ref(value: &Value) -> Result<String> {
    match value {
        Value::Uri(u) => Ok(u.to_string()),
        Value::String(s) | Value::UriRef(s) => {
            validate_uri_ref(s)?;
            Ok(s.clone())
        }
        other => Err(Error::validation(format!(
            "cannot convert {} to URI-reference",
            other.type_name()
        ))),
    }
}

pub fn to_integer(value: &Value) -> Result<i32> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|e| Error::validation(format!("'{s}' is not an integer: {e}"))),
        other => Err(Error::validation(format!(
            "cannot convert {} to Integer",
            other.type_name()
        ))),
    }
}

pub fn to_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(Error::validation(format!(
            "cannot convert '{other}' to Boolean"
        ))),
    }
}

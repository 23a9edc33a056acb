use std::fmt;

use super::Error;
use crate::types::Value;

/// Types of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    String,
    Boolean,
    /// Accepts any value unchanged; only used for function parameters.
    Any,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Integer => "Integer",
            SqlType::String => "String",
            SqlType::Boolean => "Boolean",
            SqlType::Any => "Any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Integer(i32),
    String(String),
    Boolean(bool),
}

impl SqlValue {
    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlValue::Integer(_) => SqlType::Integer,
            SqlValue::String(_) => SqlType::String,
            SqlValue::Boolean(_) => SqlType::Boolean,
        }
    }

    /// Convert to `target`. Strings parse into integers and booleans
    /// (case-insensitive `true`/`false`); everything has a string form;
    /// integers and booleans do not convert into each other.
    pub fn cast(&self, target: SqlType) -> Result<SqlValue, Error> {
        match (self, target) {
            (_, SqlType::Any) => Ok(self.clone()),
            (v, t) if v.sql_type() == t => Ok(self.clone()),
            (v, SqlType::String) => Ok(SqlValue::String(v.to_string())),
            (SqlValue::String(s), SqlType::Integer) => s
                .trim()
                .parse::<i32>()
                .map(SqlValue::Integer)
                .map_err(|_| Error::Cast(format!("cannot cast '{s}' to Integer"))),
            (SqlValue::String(s), SqlType::Boolean) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(SqlValue::Boolean(true)),
                "false" => Ok(SqlValue::Boolean(false)),
                _ => Err(Error::Cast(format!("cannot cast '{s}' to Boolean"))),
            },
            (v, t) => Err(Error::Cast(format!("cannot cast {} {v} to {t}", v.sql_type()))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Error> {
        match self.cast(SqlType::Boolean)? {
            SqlValue::Boolean(b) => Ok(b),
            other => Err(Error::Cast(format!("{other} is not a Boolean"))),
        }
    }

    pub fn as_integer(&self) -> Result<i32, Error> {
        match self.cast(SqlType::Integer)? {
            SqlValue::Integer(i) => Ok(i),
            other => Err(Error::Cast(format!("{other} is not an Integer"))),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            SqlValue::String(s) => s,
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::String(s) => f.write_str(s),
            SqlValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Boolean(b) => SqlValue::Boolean(*b),
            Value::Integer(i) => SqlValue::Integer(*i),
            other => SqlValue::String(other.to_string()),
        }
    }
}

impl From<i32> for SqlValue {
    fn from(i: i32) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Boolean(b)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::String(s)
    }
}

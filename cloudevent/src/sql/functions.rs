//! Scalar functions callable from expressions.
//!
//! Functions are keyed by upper-case name and arity. A name may have one
//! overload per fixed arity plus at most one variadic overload; a call
//! prefers the exact arity and falls back to the variadic one when enough
//! arguments are supplied.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::value::{SqlType, SqlValue};
use super::Error;
use crate::event::Event;

type Body = dyn Fn(&Event, &[SqlValue]) -> Result<SqlValue, String> + Send + Sync;

#[derive(Clone)]
pub struct Function {
    name: String,
    params: Vec<SqlType>,
    rest: Option<SqlType>,
    body: Arc<Body>,
}

impl Function {
    pub fn new<F>(name: &str, params: Vec<SqlType>, body: F) -> Self
    where
        F: Fn(&Event, &[SqlValue]) -> Result<SqlValue, String> + Send + Sync + 'static,
    {
        Function {
            name: name.to_ascii_uppercase(),
            params,
            rest: None,
            body: Arc::new(body),
        }
    }

    /// A function taking `params` followed by any number of `rest` arguments.
    pub fn variadic<F>(name: &str, params: Vec<SqlType>, rest: SqlType, body: F) -> Self
    where
        F: Fn(&Event, &[SqlValue]) -> Result<SqlValue, String> + Send + Sync + 'static,
    {
        Function {
            rest: Some(rest),
            ..Function::new(name, params, body)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed arity, or the minimum arity of a variadic function.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }

    fn param_type(&self, index: usize) -> SqlType {
        self.params
            .get(index)
            .copied()
            .or(self.rest)
            .unwrap_or(SqlType::Any)
    }

    pub(crate) fn call(&self, event: &Event, args: Vec<SqlValue>) -> Result<SqlValue, Error> {
        let args = args
            .iter()
            .enumerate()
            .map(|(i, arg)| arg.cast(self.param_type(i)))
            .collect::<Result<Vec<_>, _>>()?;
        (self.body)(event, &args).map_err(|message| Error::FunctionEvaluation {
            name: self.name.clone(),
            message,
        })
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("rest", &self.rest)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    fixed: HashMap<(String, usize), Arc<Function>>,
    variadic: HashMap<String, Arc<Function>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for function in builtins() {
            // Built-in names and arities are distinct.
            let _ = table.add(function);
        }
        table
    }

    pub fn add(&mut self, function: Function) -> Result<(), Error> {
        let duplicate = |what: String| Error::FunctionEvaluation {
            name: function.name.clone(),
            message: format!("{what} is already registered"),
        };
        if function.is_variadic() {
            if self.variadic.contains_key(&function.name) {
                return Err(duplicate("a variadic overload".to_string()));
            }
            self.variadic.insert(function.name.clone(), Arc::new(function));
        } else {
            let key = (function.name.clone(), function.arity());
            if self.fixed.contains_key(&key) {
                return Err(duplicate(format!("an overload with {} arguments", key.1)));
            }
            self.fixed.insert(key, Arc::new(function));
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str, arity: usize) -> Option<Arc<Function>> {
        let name = name.to_ascii_uppercase();
        if let Some(function) = self.fixed.get(&(name.clone(), arity)) {
            return Some(function.clone());
        }
        self.variadic
            .get(&name)
            .filter(|function| function.arity() <= arity)
            .cloned()
    }
}

fn table() -> &'static RwLock<FunctionTable> {
    static TABLE: OnceLock<RwLock<FunctionTable>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(FunctionTable::with_builtins()))
}

/// Register a function for every expression evaluated afterwards.
pub fn register(function: Function) -> Result<(), Error> {
    tracing::debug!(name = function.name(), arity = function.arity(), "registering sql function");
    table().write().add(function)
}

pub(crate) fn resolve(name: &str, arity: usize) -> Option<Arc<Function>> {
    table().read().resolve(name, arity)
}

fn string_arg(args: &[SqlValue], index: usize) -> String {
    args.get(index).map(|v| v.to_string()).unwrap_or_default()
}

fn integer_arg(args: &[SqlValue], index: usize) -> Result<i32, String> {
    match args.get(index) {
        Some(SqlValue::Integer(i)) => Ok(*i),
        other => Err(format!("expected an integer argument, got {other:?}")),
    }
}

fn unary_string(name: &str, op: fn(&str) -> String) -> Function {
    Function::new(name, vec![SqlType::String], move |_, args| {
        Ok(SqlValue::String(op(&string_arg(args, 0))))
    })
}

fn non_negative(n: i32, what: &str) -> Result<usize, String> {
    usize::try_from(n).map_err(|_| format!("{what} must not be negative, got {n}"))
}

fn substring(s: &str, position: i32, length: Option<i32>) -> Result<String, String> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let start = match i64::from(position) {
        0 => return Err("position 0 is not valid, positions start at 1".to_string()),
        p if p > 0 => p - 1,
        p => len + p,
    };
    if start < 0 || start > len {
        return Err(format!("position {position} is out of range for a string of length {len}"));
    }
    let start = start as usize;
    let end = match length {
        Some(n) => start.saturating_add(non_negative(n, "length")?).min(chars.len()),
        None => chars.len(),
    };
    Ok(chars[start..end].iter().collect())
}

fn builtins() -> Vec<Function> {
    vec![
        Function::new("ABS", vec![SqlType::Integer], |_, args| {
            let i = integer_arg(args, 0)?;
            i.checked_abs()
                .map(SqlValue::Integer)
                .ok_or_else(|| format!("ABS({i}) overflows"))
        }),
        Function::new("LENGTH", vec![SqlType::String], |_, args| {
            let n = string_arg(args, 0).chars().count();
            i32::try_from(n)
                .map(SqlValue::Integer)
                .map_err(|_| "string too long".to_string())
        }),
        Function::variadic("CONCAT", vec![], SqlType::String, |_, args| {
            Ok(SqlValue::String(args.iter().map(|a| a.to_string()).collect()))
        }),
        Function::variadic("CONCAT_WS", vec![SqlType::String], SqlType::String, |_, args| {
            let separator = string_arg(args, 0);
            let parts: Vec<String> = args.iter().skip(1).map(|a| a.to_string()).collect();
            Ok(SqlValue::String(parts.join(&separator)))
        }),
        unary_string("LOWER", str::to_lowercase),
        unary_string("UPPER", str::to_uppercase),
        unary_string("TRIM", |s| s.trim().to_string()),
        Function::new("LEFT", vec![SqlType::String, SqlType::Integer], |_, args| {
            let n = non_negative(integer_arg(args, 1)?, "length")?;
            Ok(SqlValue::String(string_arg(args, 0).chars().take(n).collect()))
        }),
        Function::new("RIGHT", vec![SqlType::String, SqlType::Integer], |_, args| {
            let n = non_negative(integer_arg(args, 1)?, "length")?;
            let s = string_arg(args, 0);
            let skip = s.chars().count().saturating_sub(n);
            Ok(SqlValue::String(s.chars().skip(skip).collect()))
        }),
        Function::new("SUBSTRING", vec![SqlType::String, SqlType::Integer], |_, args| {
            substring(&string_arg(args, 0), integer_arg(args, 1)?, None).map(SqlValue::String)
        }),
        Function::new(
            "SUBSTRING",
            vec![SqlType::String, SqlType::Integer, SqlType::Integer],
            |_, args| {
                substring(&string_arg(args, 0), integer_arg(args, 1)?, Some(integer_arg(args, 2)?))
                    .map(SqlValue::String)
            },
        ),
        Function::new("INT", vec![SqlType::Any], |_, args| cast_arg(args, SqlType::Integer)),
        Function::new("BOOL", vec![SqlType::Any], |_, args| cast_arg(args, SqlType::Boolean)),
        Function::new("STRING", vec![SqlType::Any], |_, args| cast_arg(args, SqlType::String)),
        Function::new("IS_BOOL", vec![SqlType::Any], |_, args| {
            Ok(SqlValue::Boolean(cast_arg(args, SqlType::Boolean).is_ok()))
        }),
        Function::new("IS_INT", vec![SqlType::Any], |_, args| {
            Ok(SqlValue::Boolean(cast_arg(args, SqlType::Integer).is_ok()))
        }),
    ]
}

fn cast_arg(args: &[SqlValue], target: SqlType) -> Result<SqlValue, String> {
    args.first()
        .ok_or_else(|| "missing argument".to_string())?
        .cast(target)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<SqlValue>) -> Result<SqlValue, Error> {
        let table = FunctionTable::with_builtins();
        let function = table.resolve(name, args.len()).ok_or(Error::MissingFunction {
            name: name.to_string(),
            arity: args.len(),
        })?;
        function.call(&Event::new(), args)
    }

    #[test]
    fn string_functions() {
        assert_eq!(call("length", vec!["héllo".into()]).unwrap(), SqlValue::Integer(5));
        assert_eq!(call("CONCAT", vec![]).unwrap(), SqlValue::from(""));
        assert_eq!(
            call("CONCAT", vec!["a".into(), 1.into(), true.into()]).unwrap(),
            SqlValue::from("a1true")
        );
        assert_eq!(
            call("CONCAT_WS", vec!["-".into(), "a".into(), "b".into()]).unwrap(),
            SqlValue::from("a-b")
        );
        assert_eq!(call("UPPER", vec!["abc".into()]).unwrap(), SqlValue::from("ABC"));
        assert_eq!(call("TRIM", vec!["  x ".into()]).unwrap(), SqlValue::from("x"));
        assert_eq!(call("LEFT", vec!["abcd".into(), 2.into()]).unwrap(), SqlValue::from("ab"));
        assert_eq!(call("RIGHT", vec!["abcd".into(), 9.into()]).unwrap(), SqlValue::from("abcd"));
        assert!(call("LEFT", vec!["abcd".into(), (-1).into()]).is_err());
    }

    #[test]
    fn substring_positions() {
        let s = || SqlValue::from("abcdef");
        assert_eq!(call("SUBSTRING", vec![s(), 2.into()]).unwrap(), SqlValue::from("bcdef"));
        assert_eq!(call("SUBSTRING", vec![s(), (-2).into()]).unwrap(), SqlValue::from("ef"));
        assert_eq!(
            call("SUBSTRING", vec![s(), 2.into(), 3.into()]).unwrap(),
            SqlValue::from("bcd")
        );
        assert!(matches!(
            call("SUBSTRING", vec![s(), 0.into()]),
            Err(Error::FunctionEvaluation { .. })
        ));
        assert!(call("SUBSTRING", vec![s(), 10.into()]).is_err());
    }

    #[test]
    fn arguments_are_cast_to_parameter_types() {
        assert_eq!(call("ABS", vec!["-3".into()]).unwrap(), SqlValue::Integer(3));
        assert!(matches!(call("ABS", vec!["x".into()]), Err(Error::Cast(_))));
        assert!(matches!(call("ABS", vec![i32::MIN.into()]), Err(Error::FunctionEvaluation { .. })));
        assert_eq!(call("LENGTH", vec![123.into()]).unwrap(), SqlValue::Integer(3));
    }

    #[test]
    fn conversions() {
        assert_eq!(call("INT", vec!["12".into()]).unwrap(), SqlValue::Integer(12));
        assert_eq!(call("BOOL", vec!["false".into()]).unwrap(), SqlValue::Boolean(false));
        assert_eq!(call("STRING", vec![7.into()]).unwrap(), SqlValue::from("7"));
        assert_eq!(call("IS_INT", vec!["x".into()]).unwrap(), SqlValue::Boolean(false));
        assert_eq!(call("IS_BOOL", vec!["TRUE".into()]).unwrap(), SqlValue::Boolean(true));
    }

    #[test]
    fn resolution_prefers_exact_arity() {
        let mut table = FunctionTable::new();
        table
            .add(Function::new("F", vec![SqlType::Any], |_, _| Ok(SqlValue::from("fixed"))))
            .unwrap();
        table
            .add(Function::variadic("f", vec![SqlType::Any], SqlType::Any, |_, _| {
                Ok(SqlValue::from("variadic"))
            }))
            .unwrap();
        let event = Event::new();
        let run = |arity: usize| {
            table
                .resolve("f", arity)
                .map(|f| f.call(&event, vec![SqlValue::Integer(0); arity]).unwrap())
        };
        assert_eq!(run(1), Some(SqlValue::from("fixed")));
        assert_eq!(run(3), Some(SqlValue::from("variadic")));
        assert_eq!(run(0), None);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut table = FunctionTable::with_builtins();
        assert!(table
            .add(Function::new("abs", vec![SqlType::Integer], |_, _| Ok(0.into())))
            .is_err());
        assert!(table
            .add(Function::variadic("CONCAT", vec![SqlType::String], SqlType::String, |_, _| {
                Ok("".into())
            }))
            .is_err());
        assert!(table
            .add(Function::new("ABS", vec![SqlType::Integer, SqlType::Integer], |_, _| Ok(0.into())))
            .is_ok());
    }
}

//! A small SQL-like language for filtering events.
//!
//! ```
//! use cloudevent::{sql, Event};
//!
//! let event = Event::builder()
//!     .id("1")
//!     .source("/sensors/1")
//!     .ty("reading")
//!     .subject("foo_bar")
//!     .build()
//!     .unwrap();
//! let filter = sql::parse(r"subject LIKE 'foo\_%' AND EXISTS id").unwrap();
//! assert!(filter.matches(&event).unwrap());
//! ```

mod ast;
mod eval;
mod functions;
mod lexer;
mod like;
mod parser;
mod value;

use thiserror::Error;

pub use ast::{BinaryOp, Expression, UnaryOp};
pub use functions::{register, Function, FunctionTable};
pub use like::Pattern;
pub use parser::parse;
pub use value::{SqlType, SqlValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("cast error: {0}")]
    Cast(String),
    #[error("math error: {0}")]
    Math(String),
    #[error("missing attribute '{0}'")]
    MissingAttribute(String),
    #[error("no function {name} taking {arity} arguments")]
    MissingFunction { name: String, arity: usize },
    #[error("{name} failed: {message}")]
    FunctionEvaluation { name: String, message: String },
}

impl Error {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            position,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn event(subject: &str) -> Event {
        Event::builder()
            .id("42")
            .source("/source")
            .ty("com.example.test")
            .subject(subject)
            .extension("count", 7)
            .extension("flag", true)
            .build()
            .unwrap()
    }

    fn eval(expression: &str, event: &Event) -> Result<SqlValue, Error> {
        parse(expression)?.evaluate(event)
    }

    #[test]
    fn like_with_escaped_underscore() {
        let filter = parse(r"subject LIKE 'foo\_%'").unwrap();
        assert!(filter.matches(&event("foo_bar")).unwrap());
        assert!(!filter.matches(&event("fooXbar")).unwrap());
    }

    #[test]
    fn identifiers_resolve_attributes_then_extensions() {
        let e = event("s");
        assert_eq!(eval("id", &e).unwrap(), SqlValue::from("42"));
        assert_eq!(eval("specversion", &e).unwrap(), SqlValue::from("1.0"));
        assert_eq!(eval("count + 1", &e).unwrap(), SqlValue::Integer(8));
        assert_eq!(eval("flag AND TRUE", &e).unwrap(), SqlValue::Boolean(true));
        assert_eq!(eval("EXISTS nothing", &e).unwrap(), SqlValue::Boolean(false));
        assert_eq!(eval("EXISTS subject", &e).unwrap(), SqlValue::Boolean(true));
        assert_eq!(
            eval("nothing = 1", &e),
            Err(Error::MissingAttribute("nothing".into()))
        );
    }

    #[test]
    fn mixed_type_comparisons() {
        let e = event("s");
        assert_eq!(eval("id = 42", &e).unwrap(), SqlValue::Boolean(true));
        assert_eq!(eval("'true' = TRUE", &e).unwrap(), SqlValue::Boolean(true));
        assert_eq!(eval("'abc' < 'abd'", &e).unwrap(), SqlValue::Boolean(true));
        assert_eq!(eval("'10' > 9", &e).unwrap(), SqlValue::Boolean(true));
        assert!(matches!(eval("1 = TRUE", &e), Err(Error::Cast(_))));
        assert!(matches!(eval("'x' = 1", &e), Err(Error::Cast(_))));
    }

    #[test]
    fn logic_short_circuits() {
        let e = event("s");
        assert_eq!(eval("FALSE AND missing", &e).unwrap(), SqlValue::Boolean(false));
        assert_eq!(eval("TRUE OR missing", &e).unwrap(), SqlValue::Boolean(true));
        assert!(eval("TRUE AND missing", &e).is_err());
        assert_eq!(eval("TRUE XOR TRUE", &e).unwrap(), SqlValue::Boolean(false));
        assert_eq!(eval("NOT FALSE AND TRUE", &e).unwrap(), SqlValue::Boolean(true));
    }

    #[test]
    fn arithmetic_and_math_errors() {
        let e = event("s");
        assert_eq!(eval("7 % 3 * 2 - -1", &e).unwrap(), SqlValue::Integer(3));
        assert_eq!(eval("(1 + 2) * 3", &e).unwrap(), SqlValue::Integer(9));
        assert!(matches!(eval("1 / 0", &e), Err(Error::Math(_))));
        assert!(matches!(eval("2147483647 + 1", &e), Err(Error::Math(_))));
    }

    #[test]
    fn in_sets() {
        let e = event("b");
        assert_eq!(eval("subject IN ('a', 'b')", &e).unwrap(), SqlValue::Boolean(true));
        assert_eq!(eval("subject NOT IN ('a', 'b')", &e).unwrap(), SqlValue::Boolean(false));
        assert_eq!(eval("count IN (1, '7')", &e).unwrap(), SqlValue::Boolean(true));
    }

    #[test]
    fn function_calls() {
        let e = event("Hello");
        assert_eq!(eval("LOWER(subject)", &e).unwrap(), SqlValue::from("hello"));
        assert_eq!(
            eval("CONCAT(subject, '-', count)", &e).unwrap(),
            SqlValue::from("Hello-7")
        );
        assert_eq!(
            eval("NO_SUCH_FN(1)", &e),
            Err(Error::MissingFunction {
                name: "NO_SUCH_FN".into(),
                arity: 1,
            })
        );
    }

    #[test]
    fn registered_functions_are_callable() {
        register(Function::new("EVENT_ID_LEN", vec![], |event, _| {
            Ok(SqlValue::Integer(event.id().len() as i32))
        }))
        .unwrap();
        assert_eq!(eval("event_id_len()", &event("s")).unwrap(), SqlValue::Integer(2));
        assert!(register(Function::new("EVENT_ID_LEN", vec![], |_, _| Ok(0.into()))).is_err());
    }
}

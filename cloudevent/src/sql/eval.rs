use std::cmp::Ordering;

use super::ast::{BinaryOp, Expression, UnaryOp};
use super::functions;
use super::value::{SqlType, SqlValue};
use super::Error;
use crate::event::Event;
use crate::version::SpecVersion;

impl Expression {
    pub fn evaluate(&self, event: &Event) -> Result<SqlValue, Error> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Identifier(name) => {
                lookup(event, name).ok_or_else(|| Error::MissingAttribute(name.clone()))
            }
            Expression::Exists(name) => Ok(SqlValue::Boolean(lookup(event, name).is_some())),
            Expression::Unary { op, operand } => {
                let value = operand.evaluate(event)?;
                match op {
                    UnaryOp::Not => Ok(SqlValue::Boolean(!value.as_bool()?)),
                    UnaryOp::Negate => {
                        let i = value.as_integer()?;
                        i.checked_neg()
                            .map(SqlValue::Integer)
                            .ok_or_else(|| Error::Math(format!("-({i}) overflows")))
                    }
                }
            }
            Expression::Binary { op, left, right } => binary(event, *op, left, right),
            Expression::Like {
                operand,
                pattern,
                negated,
            } => {
                let text = operand.evaluate(event)?.cast(SqlType::String)?.into_string();
                Ok(SqlValue::Boolean(pattern.matches(&text) != *negated))
            }
            Expression::In {
                operand,
                set,
                negated,
            } => {
                let value = operand.evaluate(event)?;
                let mut found = false;
                for candidate in set {
                    if equal(&value, &candidate.evaluate(event)?)? {
                        found = true;
                        break;
                    }
                }
                Ok(SqlValue::Boolean(found != *negated))
            }
            Expression::Call { name, args } => {
                let function = functions::resolve(name, args.len()).ok_or_else(|| {
                    Error::MissingFunction {
                        name: name.clone(),
                        arity: args.len(),
                    }
                })?;
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(event))
                    .collect::<Result<Vec<_>, _>>()?;
                function.call(event, args)
            }
        }
    }

    /// Evaluate as a filter: the result must be (or cast to) a boolean.
    pub fn matches(&self, event: &Event) -> Result<bool, Error> {
        self.evaluate(event)?.as_bool()
    }
}

/// Context attributes are found by their 1.0 name or by the event's own
/// version name; anything else is an extension.
fn lookup(event: &Event, name: &str) -> Option<SqlValue> {
    let kind = SpecVersion::V10
        .lookup(name)
        .or_else(|| event.spec_version().lookup(name))
        .map(|(kind, _)| kind);
    match kind {
        Some(kind) => event.attribute(kind).map(|v| SqlValue::from(&v)),
        None => event.extension(name).map(SqlValue::from),
    }
}

fn binary(event: &Event, op: BinaryOp, left: &Expression, right: &Expression) -> Result<SqlValue, Error> {
    match op {
        BinaryOp::And => {
            let result = left.matches(event)? && right.matches(event)?;
            return Ok(SqlValue::Boolean(result));
        }
        BinaryOp::Or => {
            let result = left.matches(event)? || right.matches(event)?;
            return Ok(SqlValue::Boolean(result));
        }
        _ => {}
    }

    let l = left.evaluate(event)?;
    let r = right.evaluate(event)?;
    let result = match op {
        BinaryOp::Xor => SqlValue::Boolean(l.as_bool()? ^ r.as_bool()?),
        BinaryOp::Equal => SqlValue::Boolean(equal(&l, &r)?),
        BinaryOp::NotEqual => SqlValue::Boolean(!equal(&l, &r)?),
        BinaryOp::Less => SqlValue::Boolean(compare(&l, &r)? == Ordering::Less),
        BinaryOp::LessOrEqual => SqlValue::Boolean(compare(&l, &r)? != Ordering::Greater),
        BinaryOp::Greater => SqlValue::Boolean(compare(&l, &r)? == Ordering::Greater),
        BinaryOp::GreaterOrEqual => SqlValue::Boolean(compare(&l, &r)? != Ordering::Less),
        _ => SqlValue::Integer(arithmetic(op, l.as_integer()?, r.as_integer()?)?),
    };
    Ok(result)
}

fn arithmetic(op: BinaryOp, l: i32, r: i32) -> Result<i32, Error> {
    let result = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Subtract => l.checked_sub(r),
        BinaryOp::Multiply => l.checked_mul(r),
        BinaryOp::Divide | BinaryOp::Modulo if r == 0 => {
            return Err(Error::Math("division by zero".to_string()));
        }
        BinaryOp::Divide => l.checked_div(r),
        BinaryOp::Modulo => l.checked_rem(r),
        other => return Err(Error::Math(format!("{other} is not an arithmetic operator"))),
    };
    result.ok_or_else(|| Error::Math(format!("{l} {op} {r} overflows")))
}

/// Mixed-type equality casts towards Boolean first, then Integer.
fn equal(l: &SqlValue, r: &SqlValue) -> Result<bool, Error> {
    if l.sql_type() == r.sql_type() {
        return Ok(l == r);
    }
    let target = if matches!(l, SqlValue::Boolean(_)) || matches!(r, SqlValue::Boolean(_)) {
        SqlType::Boolean
    } else {
        SqlType::Integer
    };
    Ok(l.cast(target)? == r.cast(target)?)
}

fn compare(l: &SqlValue, r: &SqlValue) -> Result<Ordering, Error> {
    match (l, r) {
        (SqlValue::String(a), SqlValue::String(b)) => Ok(a.cmp(b)),
        _ => Ok(l.as_integer()?.cmp(&r.as_integer()?)),
    }
}

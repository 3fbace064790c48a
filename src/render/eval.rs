//! Expression evaluation against the scope chain.
//!
//! Errors are plain messages here; the caller attaches the expression
//! text and template location (see
//! [`RenderError::Expression`](crate::RenderError)).

use crate::ast::expr::{BinOp, Expr, ExprKind, UnaryOp};
use crate::ast::value::Value;

use super::ScopeFrame;

pub(super) fn evaluate(expr: &Expr, scopes: &[ScopeFrame]) -> Result<Value, String> {
    match &expr.node {
        ExprKind::Literal(value) => Ok(value.clone()),

        ExprKind::Ident(name) => resolve(scopes, name)
            .cloned()
            .ok_or_else(|| format!("undefined variable: {name}")),

        ExprKind::Member { object, property } => {
            let object = evaluate(object, scopes)?;
            member(&object, property)
        }

        ExprKind::Index { object, index } => {
            let object = evaluate(object, scopes)?;
            let index = evaluate(index, scopes)?;
            indexed(&object, &index)
        }

        ExprKind::Call { callee, args } => {
            let target = evaluate(callee, scopes)?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, scopes)?);
            }
            match target {
                Value::Builtin(builtin) => (builtin.call)(&values),
                other => Err(format!("{} is not a function", other.type_name())),
            }
        }

        ExprKind::Unary { op, operand } => {
            let value = evaluate(operand, scopes)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => Ok(Value::Number(-require_number(&value)?)),
            }
        }

        ExprKind::Binary { left, op, right } => binary(left, *op, right, scopes),
    }
}

fn resolve<'a>(scopes: &'a [ScopeFrame], name: &str) -> Option<&'a Value> {
    scopes.iter().rev().find_map(|frame| frame.get(name))
}

/// Property access. Missing keys yield `Null`; only access on `null`
/// itself is an error.
fn member(object: &Value, property: &str) -> Result<Value, String> {
    match object {
        Value::Null => Err(format!("cannot read property `{property}` of null")),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if property == "length" => Ok(Value::from(items.len())),
        Value::String(s) if property == "length" => Ok(Value::from(s.chars().count())),
        _ => Ok(Value::Null),
    }
}

fn indexed(object: &Value, index: &Value) -> Result<Value, String> {
    match (object, index) {
        (Value::Null, _) => Err("cannot index null".to_string()),
        (Value::Array(items), Value::Number(n)) => {
            if n.fract() == 0.0 && *n >= 0.0 && (*n as usize) < items.len() {
                Ok(items[*n as usize].clone())
            } else {
                Ok(Value::Null)
            }
        }
        (Value::String(s), Value::Number(n)) => {
            if n.fract() == 0.0 && *n >= 0.0 {
                Ok(s.chars()
                    .nth(*n as usize)
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Null))
            } else {
                Ok(Value::Null)
            }
        }
        (object, Value::String(key)) => member(object, key),
        _ => Ok(Value::Null),
    }
}

fn binary(left: &Expr, op: BinOp, right: &Expr, scopes: &[ScopeFrame]) -> Result<Value, String> {
    // Short-circuit forms first.
    match op {
        BinOp::And => {
            let l = evaluate(left, scopes)?;
            if !l.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(evaluate(right, scopes)?.is_truthy()));
        }
        BinOp::Or => {
            let l = evaluate(left, scopes)?;
            if l.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(evaluate(right, scopes)?.is_truthy()));
        }
        _ => {}
    }

    let l = evaluate(left, scopes)?;
    let r = evaluate(right, scopes)?;

    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::NotEq => Ok(Value::Bool(!values_equal(&l, &r))),

        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => compare(&l, op, &r),

        BinOp::Add => add(&l, &r),

        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            let a = require_number(&l)?;
            let b = require_number(&r)?;
            let result = match op {
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => {
                    if b == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    a / b
                }
                BinOp::Rem => {
                    if b == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    a % b
                }
                _ => unreachable!(),
            };
            Ok(Value::Number(result))
        }

        BinOp::And | BinOp::Or => unreachable!("short-circuited above"),
    }
}

fn compare(left: &Value, op: BinOp, right: &Value) -> Result<Value, String> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(format!(
                "cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ));
        }
    };
    let Some(ordering) = ordering else {
        // NaN comparisons are always false.
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::LtEq => ordering.is_le(),
        BinOp::GtEq => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn add(left: &Value, right: &Value) -> Result<Value, String> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return Ok(Value::Number(a + b));
    }
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return Ok(Value::String(format!(
            "{}{}",
            left.to_output_string(),
            right.to_output_string()
        )));
    }
    Err(format!(
        "cannot add {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (left, right) => left == right,
    }
}

fn require_number(value: &Value) -> Result<f64, String> {
    value
        .as_number()
        .ok_or_else(|| format!("expected number, got {}", value.type_name()))
}

//! Tree-walking evaluation of parsed expressions.

use std::cmp::Ordering;

use rowbind_model::{Value, Variables};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::functions::ExpressionFunctions;

pub(crate) fn evaluate(
    expr: &Expr,
    variables: &Variables,
    functions: &ExpressionFunctions,
) -> Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => variables
            .get(name)
            .cloned()
            .ok_or_else(|| format!("unknown variable '{name}'")),
        Expr::Unary(op, operand) => {
            let value = evaluate(operand, variables, functions)?;
            unary(*op, &value)
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            if !is_truthy(&evaluate(lhs, variables, functions)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(is_truthy(&evaluate(rhs, variables, functions)?)))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            if is_truthy(&evaluate(lhs, variables, functions)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(is_truthy(&evaluate(rhs, variables, functions)?)))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, variables, functions)?;
            let rhs = evaluate(rhs, variables, functions)?;
            binary(*op, &lhs, &rhs)
        }
        Expr::Ternary(condition, then, otherwise) => {
            if is_truthy(&evaluate(condition, variables, functions)?) {
                evaluate(then, variables, functions)
            } else {
                evaluate(otherwise, variables, functions)
            }
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, variables, functions))
                .collect::<Result<Vec<_>, _>>()?;
            functions.call(name, &args)
        }
    }
}

/// Null, `false`, zero, empty text and empty lists are false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Integer(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Date(_) | Value::DateTime(_) => true,
    }
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value, String> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!is_truthy(value))),
        UnaryOp::Neg => match value {
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| "integer overflow".to_string()),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(format!("cannot negate a {} value", other.kind())),
        },
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Add if matches!(lhs, Value::Text(_)) || matches!(rhs, Value::Text(_)) => {
            Ok(Value::Text(format!("{lhs}{rhs}")))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(lhs, rhs)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => is_truthy(lhs) && is_truthy(rhs),
            _ => is_truthy(lhs) || is_truthy(rhs),
        })),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
            return Err("division by zero".to_string());
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string());
    }

    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(format!(
            "arithmetic needs numbers, got {} and {}",
            lhs.kind(),
            rhs.kind()
        ));
    };
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
        return Err("division by zero".to_string());
    }
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Ok(Value::Float(result))
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            lhs.as_f64() == rhs.as_f64()
        }
        (Value::Text(a), other) | (other, Value::Text(a)) if !matches!(other, Value::List(_)) => {
            *a == other.to_string()
        }
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, String> {
    let ordering = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => lhs.compare(rhs),
    };
    ordering.ok_or_else(|| format!("cannot compare {} with {}", lhs.kind(), rhs.kind()))
}

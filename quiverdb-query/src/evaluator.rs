//! Expression evaluation over a binding row.
//!
//! Evaluation is deliberately tolerant: missing properties, type mismatches
//! and malformed regexes degrade to `null` / `false` instead of erroring.
//! Only unknown functions, wrong arities and unbound variables surface as
//! errors.

use quiverdb_graph::{Store, Value};

use crate::ast::{BinaryOperator, Expression, FunctionCall, Literal, UnaryOperator};
use crate::error::{Error, Result};
use crate::executor::{Binding, Row, edge_value, node_value};
use crate::Params;

/// Evaluates an expression to a `Value` against one binding row.
pub fn evaluate(expr: &Expression, row: &Row, store: &Store, params: &Params) -> Result<Value> {
    match expr {
        Expression::Literal(lit) => Ok(literal_value(lit)),
        Expression::Variable(name) => match row.get(name) {
            Some(binding) => Ok(binding_value(binding, store)),
            None => match params.get(name) {
                Some(value) => Ok(value.clone()),
                None => Err(Error::UnboundVariable(name.clone())),
            },
        },
        Expression::Parameter(name) => Ok(params.get(name).cloned().unwrap_or(Value::Null)),
        Expression::PropertyAccess(pa) => {
            let binding = row
                .get(&pa.variable)
                .ok_or_else(|| Error::UnboundVariable(pa.variable.clone()))?;
            Ok(property_of(binding, &pa.key, store))
        }
        Expression::List(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, row, store, params))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(values))
        }
        Expression::Map(map) => {
            let mut out = std::collections::BTreeMap::new();
            for pair in &map.entries {
                out.insert(pair.key.clone(), evaluate(&pair.value, row, store, params)?);
            }
            Ok(Value::Map(out))
        }
        Expression::Unary(u) => match u.operator {
            UnaryOperator::Not => {
                let v = evaluate(&u.operand, row, store, params)?;
                Ok(Value::Bool(!v.is_truthy()))
            }
            UnaryOperator::Negate => match evaluate(&u.operand, row, store, params)? {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                _ => Ok(Value::Null),
            },
        },
        Expression::Binary(b) => evaluate_binary(b.operator, &b.left, &b.right, row, store, params),
        Expression::FunctionCall(call) => evaluate_function(call, row, store, params),
        // Aggregates are computed by the executor over row groups; reaching
        // one here means it appeared outside a projection.
        Expression::Aggregate(agg) => Err(Error::Other(format!(
            "{} is only valid in RETURN or WITH projections",
            agg.function.name()
        ))),
    }
}

/// Evaluates an expression and coerces the result to a predicate decision.
pub fn evaluate_predicate(
    expr: &Expression,
    row: &Row,
    store: &Store,
    params: &Params,
) -> Result<bool> {
    Ok(evaluate(expr, row, store, params)?.is_truthy())
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Integer(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Materialises whatever a variable is bound to.
pub fn binding_value(binding: &Binding, store: &Store) -> Value {
    match binding {
        Binding::Node(id) => node_value(store, *id),
        Binding::Edge(id) => edge_value(store, *id),
        Binding::Edges(ids) => Value::List(ids.iter().map(|id| edge_value(store, *id)).collect()),
        Binding::Value(v) => v.clone(),
    }
}

fn property_of(binding: &Binding, key: &str, store: &Store) -> Value {
    match binding {
        Binding::Node(id) => store
            .get_node(*id)
            .and_then(|n| n.properties.get(key).cloned())
            .unwrap_or(Value::Null),
        Binding::Edge(id) => store
            .get_edge(*id)
            .and_then(|e| e.properties.get(key).cloned())
            .unwrap_or(Value::Null),
        Binding::Value(Value::Map(map)) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn evaluate_binary(
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
    row: &Row,
    store: &Store,
    params: &Params,
) -> Result<Value> {
    // AND/OR short-circuit; null collapses to false.
    match op {
        BinaryOperator::And => {
            if !evaluate(left, row, store, params)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(evaluate(right, row, store, params)?.is_truthy()));
        }
        BinaryOperator::Or => {
            if evaluate(left, row, store, params)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(evaluate(right, row, store, params)?.is_truthy()));
        }
        _ => {}
    }

    let lhs = evaluate(left, row, store, params)?;
    let rhs = evaluate(right, row, store, params)?;

    Ok(match op {
        BinaryOperator::Equals => Value::Bool(lhs == rhs),
        BinaryOperator::NotEquals => Value::Bool(lhs != rhs),
        BinaryOperator::LessThan => compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Less),
        BinaryOperator::LessEqual => compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Greater),
        BinaryOperator::GreaterThan => compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Greater),
        BinaryOperator::GreaterEqual => compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Less),
        BinaryOperator::Add => add_values(&lhs, &rhs),
        BinaryOperator::Subtract => numeric_binop(&lhs, &rhs, |l, r| l - r, |l, r| l - r),
        BinaryOperator::Multiply => numeric_binop(&lhs, &rhs, |l, r| l * r, |l, r| l * r),
        BinaryOperator::Divide => numeric_div(&lhs, &rhs),
        BinaryOperator::Contains => string_predicate(&lhs, &rhs, |l, r| l.contains(r)),
        BinaryOperator::StartsWith => string_predicate(&lhs, &rhs, |l, r| l.starts_with(r)),
        BinaryOperator::EndsWith => string_predicate(&lhs, &rhs, |l, r| l.ends_with(r)),
        BinaryOperator::RegexMatch => regex_match(&lhs, &rhs),
        BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
    })
}

/// Ordered comparison. `null` on either side is `false`; numbers promote to
/// f64 across int/float; strings compare lexicographically; any other pairing
/// is `false`, never an error.
fn compare<F>(left: &Value, right: &Value, check: F) -> Value
where
    F: FnOnce(std::cmp::Ordering) -> bool,
{
    let ordering = match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
    };
    match ordering {
        Some(o) => Value::Bool(check(o)),
        None => Value::Bool(false),
    }
}

fn add_values(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Value::String(format!("{l}{r}")),
        _ => numeric_binop(left, right, |l, r| l + r, |l, r| l + r),
    }
}

fn numeric_binop<FInt, FFloat>(left: &Value, right: &Value, int_op: FInt, float_op: FFloat) -> Value
where
    FInt: FnOnce(i64, i64) -> i64,
    FFloat: FnOnce(f64, f64) -> f64,
{
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Value::Int(int_op(*l, *r)),
        (Value::Int(l), Value::Float(r)) => Value::Float(float_op(*l as f64, *r)),
        (Value::Float(l), Value::Int(r)) => Value::Float(float_op(*l, *r as f64)),
        (Value::Float(l), Value::Float(r)) => Value::Float(float_op(*l, *r)),
        _ => Value::Null,
    }
}

fn numeric_div(left: &Value, right: &Value) -> Value {
    match (left.as_f64(), right.as_f64()) {
        (Some(_), Some(r)) if r == 0.0 => Value::Null,
        (Some(l), Some(r)) => Value::Float(l / r),
        _ => Value::Null,
    }
}

/// CONTAINS / STARTS WITH / ENDS WITH. Case-sensitive; scalar operands are
/// coerced to their string form, `null` yields `false`.
fn string_predicate<F>(left: &Value, right: &Value, pred: F) -> Value
where
    F: FnOnce(&str, &str) -> bool,
{
    match (coerce_string(left), coerce_string(right)) {
        (Some(l), Some(r)) => Value::Bool(pred(&l, &r)),
        _ => Value::Bool(false),
    }
}

/// `=~` is an unanchored search, not a full match. Malformed patterns filter
/// the row rather than erroring.
fn regex_match(left: &Value, right: &Value) -> Value {
    let (Some(haystack), Some(pattern)) = (coerce_string(left), coerce_string(right)) else {
        return Value::Bool(false);
    };
    match regex::Regex::new(&pattern) {
        Ok(re) => Value::Bool(re.is_match(&haystack)),
        Err(_) => Value::Bool(false),
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::List(_) | Value::Map(_) => None,
    }
}

fn evaluate_function(
    call: &FunctionCall,
    row: &Row,
    store: &Store,
    params: &Params,
) -> Result<Value> {
    let args = call
        .args
        .iter()
        .map(|arg| evaluate(arg, row, store, params))
        .collect::<Result<Vec<_>>>()?;

    let name = call.name.to_lowercase();
    match name.as_str() {
        "upper" => single_string_arg(call, &args, |s| Value::String(s.to_uppercase())),
        "lower" => single_string_arg(call, &args, |s| Value::String(s.to_lowercase())),
        "trim" => single_string_arg(call, &args, |s| Value::String(s.trim().to_string())),
        "ltrim" => single_string_arg(call, &args, |s| Value::String(s.trim_start().to_string())),
        "rtrim" => single_string_arg(call, &args, |s| Value::String(s.trim_end().to_string())),
        "length" => single_string_arg(call, &args, |s| Value::Int(s.chars().count() as i64)),
        "reverse" => single_string_arg(call, &args, |s| Value::String(s.chars().rev().collect())),
        "substring" => {
            expect_args(call, &args, "2 or 3", |n| n == 2 || n == 3)?;
            let (Some(text), Some(Value::Int(start))) = (coerce_string(&args[0]), args.get(1))
            else {
                return Ok(Value::Null);
            };
            let chars: Vec<char> = text.chars().collect();
            let start = (*start).max(0) as usize;
            if start >= chars.len() {
                return Ok(Value::String(String::new()));
            }
            let end = match args.get(2) {
                Some(Value::Int(len)) => (start + (*len).max(0) as usize).min(chars.len()),
                Some(_) => return Ok(Value::Null),
                None => chars.len(),
            };
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        "replace" => {
            expect_args(call, &args, "3", |n| n == 3)?;
            match (
                coerce_string(&args[0]),
                coerce_string(&args[1]),
                coerce_string(&args[2]),
            ) {
                (Some(text), Some(old), Some(new)) => {
                    Ok(Value::String(text.replace(&old, &new)))
                }
                _ => Ok(Value::Null),
            }
        }
        "split" => {
            expect_args(call, &args, "2", |n| n == 2)?;
            match (coerce_string(&args[0]), coerce_string(&args[1])) {
                (Some(text), Some(delim)) => Ok(Value::List(
                    text.split(delim.as_str())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                )),
                _ => Ok(Value::Null),
            }
        }
        _ => Err(Error::UnknownFunction(call.name.clone())),
    }
}

fn single_string_arg<F>(call: &FunctionCall, args: &[Value], f: F) -> Result<Value>
where
    F: FnOnce(&str) -> Value,
{
    expect_args(call, args, "1", |n| n == 1)?;
    match coerce_string(&args[0]) {
        Some(s) => Ok(f(&s)),
        None => Ok(Value::Null),
    }
}

fn expect_args<F>(
    call: &FunctionCall,
    args: &[Value],
    expected: &'static str,
    ok: F,
) -> Result<()>
where
    F: FnOnce(usize) -> bool,
{
    if ok(args.len()) {
        Ok(())
    } else {
        Err(Error::ArgumentError {
            function: call.name.clone(),
            expected,
            got: args.len(),
        })
    }
}

// SPDX-License-Identifier: MIT

//! Rule expression evaluator

use super::ast::{BinOp, Expr, Literal};
use crate::engine::lookup;
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid expression: {0}")]
    Parse(String),

    #[error("expression parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("evaluating expression: {0}")]
    Type(String),
}

/// Evaluate an expression against a parameter map.
///
/// Every top-level variable referenced by the expression must be present
/// in `params`; a missing one fails with [`EvalError::ParameterNotFound`]
/// before any evaluation happens, so callers never mistake absent data
/// for a falsy result.
pub fn evaluate(expr: &Expr, params: &Map<String, Value>) -> Result<Value, EvalError> {
    check_parameters(expr, params)?;
    eval(expr, params)
}

fn check_parameters(expr: &Expr, params: &Map<String, Value>) -> Result<(), EvalError> {
    match expr {
        Expr::Var(path) => {
            let top = path.split('.').next().unwrap_or(path);
            if !params.contains_key(top) {
                return Err(EvalError::ParameterNotFound(top.to_string()));
            }
            Ok(())
        }
        Expr::List(items) => {
            for item in items {
                check_parameters(item, params)?;
            }
            Ok(())
        }
        Expr::Binary { left, right, .. } => {
            check_parameters(left, params)?;
            check_parameters(right, params)
        }
        Expr::Literal(_) => Ok(()),
    }
}

fn eval(expr: &Expr, params: &Map<String, Value>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(lit) => Ok(literal_to_value(lit)),
        Expr::Var(path) => {
            let root = Value::Object(params.clone());
            lookup::lookup(&root, path)
                .map_err(|_| EvalError::ParameterNotFound(path.to_string()))
        }
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, params)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Binary { left, op, right } => {
            let lhs = eval(left, params)?;
            match op {
                BinOp::And => {
                    if !is_truthy(&lhs) {
                        return Ok(Value::Bool(false));
                    }
                    let rhs = eval(right, params)?;
                    Ok(Value::Bool(is_truthy(&rhs)))
                }
                BinOp::Or => {
                    if is_truthy(&lhs) {
                        return Ok(Value::Bool(true));
                    }
                    let rhs = eval(right, params)?;
                    Ok(Value::Bool(is_truthy(&rhs)))
                }
                BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &eval(right, params)?))),
                BinOp::NotEq => Ok(Value::Bool(!values_equal(&lhs, &eval(right, params)?))),
                BinOp::Gt => compare_numbers(&lhs, &eval(right, params)?, op, |a, b| a > b),
                BinOp::Gte => compare_numbers(&lhs, &eval(right, params)?, op, |a, b| a >= b),
                BinOp::Lt => compare_numbers(&lhs, &eval(right, params)?, op, |a, b| a < b),
                BinOp::Lte => compare_numbers(&lhs, &eval(right, params)?, op, |a, b| a <= b),
                BinOp::In => {
                    let rhs = eval(right, params)?;
                    let Value::Array(items) = rhs else {
                        return Err(EvalError::Type(
                            "right operand of 'in' must be a list".to_string(),
                        ));
                    };
                    Ok(Value::Bool(items.iter().any(|v| values_equal(&lhs, v))))
                }
                BinOp::Add => add_values(&lhs, &eval(right, params)?),
            }
        }
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(n) => number_value(*n),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn number_value(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

fn compare_numbers<F>(left: &Value, right: &Value, op: &BinOp, cmp: F) -> Result<Value, EvalError>
where
    F: Fn(f64, f64) -> bool,
{
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok(Value::Bool(cmp(a, b))),
        _ => Err(EvalError::Type(format!(
            "operator '{}' requires numeric operands",
            op
        ))),
    }
}

fn add_values(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return Ok(number_value(a + b));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }
    Err(EvalError::Type(
        "operator '+' requires two numbers or two strings".to_string(),
    ))
}

/// Structural equality with numeric normalization: numbers compare as f64
/// regardless of integer/float representation, everything else compares
/// by JSON value.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return (a - b).abs() < f64::EPSILON;
    }
    left == right
}

/// Falsiness follows the JSON zero value: null, false, 0, empty string,
/// empty array, empty object.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expr::{evaluate_str, parse};
    use serde_json::json;

    fn params_from(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_literal_comparisons() {
        let empty = Map::new();
        assert_eq!(evaluate_str("1 > 2", &empty).unwrap(), json!(false));
        assert_eq!(evaluate_str("5 == 2", &empty).unwrap(), json!(false));
        assert_eq!(evaluate_str(r#""foo" == "bar""#, &empty).unwrap(), json!(false));
        assert_eq!(evaluate_str("2 >= 2", &empty).unwrap(), json!(true));
    }

    #[test]
    fn test_arithmetic_membership() {
        let empty = Map::new();
        assert_eq!(
            evaluate_str("5 + 5 in [9, 11, 12]", &empty).unwrap(),
            json!(false)
        );
        assert_eq!(
            evaluate_str("5 + 5 in [9, 10, 12]", &empty).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_missing_parameter_is_error_not_false() {
        let empty = Map::new();
        let err = evaluate_str("$x", &empty).unwrap_err();
        assert!(matches!(err, EvalError::ParameterNotFound(_)));

        // Present-but-different key still fails for the referenced one.
        let params = params_from(json!({"x": 1}));
        let err = evaluate_str("$y", &params).unwrap_err();
        assert!(matches!(err, EvalError::ParameterNotFound(ref k) if k == "y"));
    }

    #[test]
    fn test_missing_parameter_detected_before_short_circuit() {
        // `false && $x` must still report the missing parameter.
        let empty = Map::new();
        let err = evaluate_str("false && $x", &empty).unwrap_err();
        assert!(matches!(err, EvalError::ParameterNotFound(_)));
    }

    #[test]
    fn test_var_comparison() {
        let params = params_from(json!({"x": 0}));
        assert_eq!(evaluate_str("$x > 1", &params).unwrap(), json!(false));
    }

    #[test]
    fn test_nested_var_comparison() {
        let params = params_from(json!({"user": {"name": "john", "age": 10}}));
        assert_eq!(evaluate_str("$user.age > 10", &params).unwrap(), json!(false));
        assert_eq!(evaluate_str("$user.age >= 10", &params).unwrap(), json!(true));
    }

    #[test]
    fn test_conjunction_with_grouping() {
        let params = params_from(json!({"foo": "bar", "x": 1, "y": 2}));
        assert_eq!(
            evaluate_str(r#"$foo == "bar" && ($x == 1 && $y > $x)"#, &params).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_conjunction_missing_parameter_fails() {
        let params = params_from(json!({"foo": "bar", "y": 2}));
        let err = evaluate_str(r#"$foo == "bar" && ($x == 1 && $y > $x)"#, &params).unwrap_err();
        assert!(matches!(err, EvalError::ParameterNotFound(ref k) if k == "x"));
    }

    #[test]
    fn test_pure_attribute_access_returns_nested_value() {
        let params = params_from(json!({"foo": {"bar": "baz"}}));
        assert_eq!(evaluate_str("$foo.bar", &params).unwrap(), json!("baz"));
    }

    #[test]
    fn test_attribute_access_with_flatten() {
        let params = params_from(json!({
            "appeal": {"creator": {"leads": [{"email": "a@x.io"}, {"email": "b@x.io"}]}}
        }));
        assert_eq!(
            evaluate_str("$appeal.creator.leads.[].email", &params).unwrap(),
            json!(["a@x.io", "b@x.io"])
        );
    }

    #[test]
    fn test_numeric_normalization_int_vs_float() {
        let params = params_from(json!({"x": 1}));
        assert_eq!(evaluate_str("$x == 1.0", &params).unwrap(), json!(true));
    }

    #[test]
    fn test_string_concat() {
        let empty = Map::new();
        assert_eq!(
            evaluate_str(r#""data-" + "team""#, &empty).unwrap(),
            json!("data-team")
        );
    }

    #[test]
    fn test_type_errors() {
        let empty = Map::new();
        assert!(matches!(
            evaluate_str(r#""a" > 1"#, &empty).unwrap_err(),
            EvalError::Type(_)
        ));
        assert!(matches!(
            evaluate_str(r#"1 in "abc""#, &empty).unwrap_err(),
            EvalError::Type(_)
        ));
    }

    #[test]
    fn test_membership_over_var_list() {
        let params = params_from(json!({"role": "editor"}));
        assert_eq!(
            evaluate_str(r#"$role in ["viewer", "editor"]"#, &params).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_is_truthy_zero_values() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!({"a": 1})));
    }

    #[test]
    fn test_evaluate_rejects_unknown_in_unreached_branch() {
        // Parameter presence is validated for the whole expression tree.
        let params = params_from(json!({"a": true}));
        let expr = parse("$a || $missing").unwrap();
        let err = evaluate(&expr, &params).unwrap_err();
        assert!(matches!(err, EvalError::ParameterNotFound(_)));
    }
}

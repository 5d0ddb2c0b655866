// SPDX-License-Identifier: MIT

//! Expression language for policy rules
//!
//! A small typed-value language evaluated against a parameter map:
//! - `$resource.details.tier > 2`
//! - `$appeal.role in ["viewer", "editor"]`
//! - `$foo == "bar" && ($x == 1 && $y > $x)`
//!
//! Variable references are `$`-prefixed paths resolved through
//! [`crate::engine::lookup`]. A referenced parameter missing from the map
//! is an error, not `false`, so callers can tell "no data" apart from a
//! negative verdict.

mod ast;
mod evaluator;
mod parser;

pub use ast::{BinOp, Expr, Literal};
pub use evaluator::{evaluate, is_truthy, values_equal, EvalError};
pub use parser::parse;

use serde_json::{Map, Value};

/// Parse and evaluate an expression string in one call.
pub fn evaluate_str(input: &str, params: &Map<String, Value>) -> Result<Value, EvalError> {
    let expr = parse(input)?;
    evaluate(&expr, params)
}

//! Scanner, parser, and tree-walking interpreter for the intrinsic-function
//! mini-language that appears inside payload templates, e.g.
//! `States.Format('Hello, {}!', $.name)`.
//!
//! The pipeline is [`scanner::Scanner`] → [`parser::Parser`] →
//! [`interpreter::Interpreter`]; [`evaluate_source`] runs all three for the
//! single-expression sources payload templates contain.

pub mod ast;
pub mod environment;
pub mod error;
pub mod funcs;
pub mod interpreter;
pub mod parser;
pub mod registry;
pub mod scanner;
pub mod token;
pub mod value;

pub use error::{IntrinsicError, ParseError, RuntimeError, ScanError};
pub use value::Value;

use serde_json::Value as JsonValue;

/// Scan, parse, and evaluate one intrinsic-function source string.
///
/// `func_input` backs `$…` lookups and `context` backs `$$…` lookups.
/// Workflow authors supply exactly one expression per template value, so only
/// the first parsed statement is evaluated.
pub fn evaluate_source(source: &str, func_input: Option<JsonValue>, context: Option<JsonValue>) -> Result<Value, IntrinsicError> {
    let tokens = scanner::Scanner::new(source).scan()?;
    let statements = parser::Parser::new(tokens).parse()?;
    let statement = statements.first().ok_or(IntrinsicError::EmptySource)?;

    let interpreter = interpreter::Interpreter::new(func_input, context);
    let value = interpreter.evaluate(statement.expression())?;
    Ok(value)
}

//! Tree-walking interpreter for intrinsic expressions.

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::ast::{Expr, Stmt};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::token::{Literal, Token, TokenKind};
use crate::value::Value;

/// Evaluates parsed intrinsic expressions against an environment.
pub struct Interpreter {
    environment: Environment,
}

impl Interpreter {
    /// Build an interpreter with the given input scopes: `func_input_json`
    /// backs `$…` lookups, `context_json` backs `$$…` lookups.
    pub fn new(func_input_json: Option<JsonValue>, context_json: Option<JsonValue>) -> Self {
        Self {
            environment: Environment::new(func_input_json, context_json),
        }
    }

    /// Evaluate every statement, discarding results. Present for parity with
    /// multi-statement sources; template evaluation uses [`Self::evaluate`]
    /// on the single expression directly.
    pub fn interpret(&self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            self.evaluate(statement.expression())?;
        }
        Ok(())
    }

    /// Evaluate one expression to a value.
    pub fn evaluate(&self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::String(text) => Value::String(text.clone()),
                Literal::Number(decimal) => Value::Number(*decimal),
            }),
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Variable { name } => self.environment.get(name),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary { left, operator, right } => self.evaluate_binary(left, operator, right),
            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),
        }
    }

    fn evaluate_unary(&self, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let value = self.evaluate(right)?;

        match operator.kind {
            TokenKind::Minus => match value {
                Value::Number(decimal) => Ok(Value::Number(-decimal)),
                _ => Err(RuntimeError::new(operator.clone(), "Operand must be a number.")),
            },
            _ => Err(RuntimeError::new(operator.clone(), "Unsupported unary operator.")),
        }
    }

    fn evaluate_binary(&self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.kind {
            TokenKind::Plus => match (left, right) {
                (Value::Number(left), Value::Number(right)) => self.checked(operator, left.checked_add(right)),
                (Value::String(mut left), Value::String(right)) => {
                    left.push_str(&right);
                    Ok(Value::String(left))
                }
                _ => Err(RuntimeError::new(
                    operator.clone(),
                    "Operands must be two numbers or two strings.",
                )),
            },
            TokenKind::Minus => match (left, right) {
                (Value::Number(left), Value::Number(right)) => self.checked(operator, left.checked_sub(right)),
                _ => Err(RuntimeError::new(operator.clone(), "Operands must be numbers.")),
            },
            TokenKind::Star => match (left, right) {
                (Value::Number(left), Value::Number(right)) => self.checked(operator, left.checked_mul(right)),
                _ => Err(RuntimeError::new(operator.clone(), "Operands must be numbers.")),
            },
            TokenKind::Slash => match (left, right) {
                (Value::Number(left), Value::Number(right)) => match left.checked_div(right) {
                    Some(quotient) => Ok(Value::Number(quotient)),
                    None => Err(RuntimeError::new(operator.clone(), "Division by zero.")),
                },
                _ => Err(RuntimeError::new(operator.clone(), "Operands must be numbers.")),
            },
            _ => Err(RuntimeError::new(operator.clone(), "Unsupported binary operator.")),
        }
    }

    fn checked(&self, operator: &Token, result: Option<Decimal>) -> Result<Value, RuntimeError> {
        result
            .map(Value::Number)
            .ok_or_else(|| RuntimeError::new(operator.clone(), "Numeric overflow."))
    }

    fn evaluate_call(&self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;

        let Value::Callable(callable) = callee else {
            return Err(RuntimeError::new(paren.clone(), "Can only call functions."));
        };

        let mut evaluated = Vec::with_capacity(arguments.len());
        for argument in arguments {
            evaluated.push(self.evaluate(argument)?);
        }

        if let Some(arity) = callable.arity()
            && evaluated.len() != arity
        {
            return Err(RuntimeError::new(
                paren.clone(),
                format!("Expected {arity} arguments but got {}.", evaluated.len()),
            ));
        }

        callable.call(self, evaluated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate_source;
    use serde_json::json;

    fn eval(source: &str, input: serde_json::Value) -> Value {
        evaluate_source(source, Some(input), None).expect("evaluation should succeed")
    }

    fn eval_err(source: &str) -> String {
        match evaluate_source(source, Some(json!({})), None) {
            Err(error) => error.to_string(),
            Ok(value) => panic!("expected an error, got {value:?}"),
        }
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(eval("1 + 2 * 3", json!({})).into_json(), json!(7));
        assert_eq!(eval("(1 + 2) * 3", json!({})).into_json(), json!(9));
    }

    #[test]
    fn path_variables_participate_in_arithmetic() {
        assert_eq!(eval("$.price * 0.1", json!({"price": 100})).into_json(), json!(10.0));
    }

    #[test]
    fn unary_minus_negates_numbers() {
        assert_eq!(eval("-2 + 5", json!({})).into_json(), json!(3));
    }

    #[test]
    fn unary_minus_on_string_fails() {
        assert!(eval_err("-'x'").contains("Operand must be a number."));
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(eval("'foo' + 'bar'", json!({})).into_json(), json!("foobar"));
    }

    #[test]
    fn plus_with_mixed_operands_fails() {
        assert!(eval_err("'foo' + 1").contains("two numbers or two strings"));
    }

    #[test]
    fn division_by_zero_fails() {
        assert!(eval_err("1 / 0").contains("Division by zero."));
    }

    #[test]
    fn calling_a_non_callable_fails() {
        assert!(eval_err("'nope'()").contains("Can only call functions."));
    }

    #[test]
    fn wrong_arity_fails() {
        assert!(eval_err("String.Trim('a', 'b')").contains("Expected 1 arguments but got 2."));
    }
}

//! The interpreter environment for one intrinsic evaluation.

use serde_json::Value as JsonValue;

use crate::error::RuntimeError;
use crate::registry;
use crate::token::Token;
use crate::value::Value;

/// Holds the two input scopes for variable resolution.
///
/// Lexemes beginning with `$` resolve by JSONPath: a single `$` searches the
/// function input, a `$$` prefix searches the context object (with one `$`
/// stripped). Anything else is looked up in the process-wide registry of
/// built-in callables. There is no user definition or assignment syntax.
pub struct Environment {
    /// Document bound to `$…` lookups: the state input.
    func_input_json: JsonValue,
    /// Document bound to `$$…` lookups: the context object.
    context_json: JsonValue,
}

impl Environment {
    pub fn new(func_input_json: Option<JsonValue>, context_json: Option<JsonValue>) -> Self {
        Self {
            func_input_json: func_input_json.unwrap_or(JsonValue::Null),
            context_json: context_json.unwrap_or(JsonValue::Null),
        }
    }

    /// Retrieve the value for a variable token.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if name.lexeme.starts_with('$') {
            self.get_jsonpath_value(name)
        } else {
            self.get_registered_value(name)
        }
    }

    fn get_registered_value(&self, name: &Token) -> Result<Value, RuntimeError> {
        registry::lookup(&name.lexeme)
            .map(Value::Callable)
            .ok_or_else(|| RuntimeError::new(name.clone(), format!("Undefined identifier '{}'.", name.lexeme)))
    }

    fn get_jsonpath_value(&self, name: &Token) -> Result<Value, RuntimeError> {
        // The scanner may leave trailing blank space on a path lexeme.
        let expr = name.lexeme.trim();

        let resolved = if let Some(context_expr) = expr.strip_prefix("$$") {
            wkflws_util::jsonpath::get(&self.context_json, &format!("${context_expr}"))
        } else {
            wkflws_util::jsonpath::get(&self.func_input_json, expr)
        };

        resolved.map(|json| Value::from_json(&json)).map_err(|_| {
            RuntimeError::new(
                name.clone(),
                format!("JSON path selector value not found '{}'.", name.lexeme.trim()),
            )
        })
    }
}

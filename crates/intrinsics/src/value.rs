//! Runtime values produced by the interpreter.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::registry::IntrinsicCallable;

/// A value flowing through intrinsic evaluation.
///
/// Numbers are arbitrary-precision decimals so workflow arithmetic never
/// picks up binary floating point artifacts. Objects stay as raw JSON maps;
/// no built-in reaches inside them.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Decimal),
    String(String),
    Array(Vec<Value>),
    Object(JsonMap<String, JsonValue>),
    Callable(Arc<dyn IntrinsicCallable>),
}

impl Value {
    /// Convert a JSON value into a runtime value.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(*flag),
            JsonValue::Number(number) => {
                // Route through the decimal string form so the full printed
                // precision is preserved.
                let decimal = Decimal::from_str(&number.to_string())
                    .or_else(|_| Decimal::from_scientific(&number.to_string()))
                    .unwrap_or_default();
                Value::Number(decimal)
            }
            JsonValue::String(text) => Value::String(text.clone()),
            JsonValue::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::Object(map.clone()),
        }
    }

    /// Convert the runtime value back into JSON.
    ///
    /// Integral decimals (scale 0) become JSON integers; anything fractional
    /// keeps a decimal point. Callables have no JSON form and become null.
    pub fn into_json(self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(flag),
            Value::Number(decimal) => decimal_to_json(decimal),
            Value::String(text) => JsonValue::String(text),
            Value::Array(items) => JsonValue::Array(items.into_iter().map(Value::into_json).collect()),
            Value::Object(map) => JsonValue::Object(map),
            Value::Callable(_) => JsonValue::Null,
        }
    }

    /// A short name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Callable(_) => "callable",
        }
    }
}

fn decimal_to_json(decimal: Decimal) -> JsonValue {
    let normalized = decimal.normalize();
    if normalized.scale() == 0 && decimal.scale() == 0 {
        if let Some(integer) = normalized.to_i64() {
            return JsonValue::Number(integer.into());
        }
    }
    match normalized.to_f64().and_then(serde_json::Number::from_f64) {
        Some(number) => JsonValue::Number(number),
        None => JsonValue::Null,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(formatter, "Null"),
            Value::Bool(flag) => write!(formatter, "Bool({flag})"),
            Value::Number(decimal) => write!(formatter, "Number({decimal})"),
            Value::String(text) => write!(formatter, "String({text:?})"),
            Value::Array(items) => formatter.debug_tuple("Array").field(items).finish(),
            Value::Object(map) => formatter.debug_tuple("Object").field(map).finish(),
            Value::Callable(_) => write!(formatter, "Callable(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Array(left), Value::Array(right)) => left == right,
            (Value::Object(left), Value::Object(right)) => left == right,
            (Value::Callable(left), Value::Callable(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

/// Render a value the way `States.Format` substitutes placeholders.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(decimal) => decimal.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(&value.clone().into_json()).unwrap_or_default(),
        Value::Callable(_) => "<callable>".to_string(),
    }
}

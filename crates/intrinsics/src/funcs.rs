//! Built-in intrinsic functions.
//!
//! Installed into the process-wide registry on first use. Each built-in is a
//! plain function wrapped with its declared arity; the interpreter enforces
//! exact arity before the call, so fixed-arity functions can index their
//! argument vector directly.

use std::str::FromStr;
use std::sync::{Arc, Once};

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::registry::{self, IntrinsicCallable};
use crate::value::{Value, render};

struct Builtin {
    arity: Option<usize>,
    func: fn(&Interpreter, Vec<Value>) -> Result<Value, RuntimeError>,
}

impl IntrinsicCallable for Builtin {
    fn arity(&self) -> Option<usize> {
        self.arity
    }

    fn call(&self, interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        (self.func)(interpreter, arguments)
    }
}

/// Register every built-in. Idempotent; called lazily by the registry.
pub fn install_builtins() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let builtins: [(&str, Option<usize>, fn(&Interpreter, Vec<Value>) -> Result<Value, RuntimeError>); 9] = [
            ("States.Format", None, format_string),
            ("States.StringToJson", Some(1), string_to_json),
            ("States.JsonToString", Some(1), json_to_string),
            ("States.Array", None, array_create),
            ("Array.Append", None, array_append),
            ("Array.Join", Some(2), array_join),
            ("String.Trim", Some(1), string_trim),
            ("Cast.ToNumber", Some(1), cast_to_number),
            ("Format.Currency", Some(2), format_currency),
        ];

        for (name, arity, func) in builtins {
            registry::register(name, Arc::new(Builtin { arity, func }))
                .unwrap_or_else(|error| panic!("registering built-in {name}: {error}"));
        }
    });
}

/// `States.Format('Hello, {}!', …)`: substitute `{}` placeholders
/// positionally.
fn format_string(_interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut arguments = arguments.into_iter();
    let template = match arguments.next() {
        Some(Value::String(template)) => template,
        Some(other) => {
            return Err(RuntimeError::bare(format!(
                "States.Format template must be a string, got {}.",
                other.type_name()
            )));
        }
        None => return Err(RuntimeError::bare("States.Format requires a template argument.")),
    };

    let mut output = String::new();
    let mut remainder = template.as_str();
    while let Some(position) = remainder.find("{}") {
        output.push_str(&remainder[..position]);
        match arguments.next() {
            Some(value) => output.push_str(&render(&value)),
            None => return Err(RuntimeError::bare("States.Format has more placeholders than arguments.")),
        }
        remainder = &remainder[position + 2..];
    }
    output.push_str(remainder);

    Ok(Value::String(output))
}

/// `States.StringToJson(s)`: parse a JSON document from a string.
fn string_to_json(_interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    match &arguments[0] {
        Value::String(text) => serde_json::from_str::<serde_json::Value>(text)
            .map(|json| Value::from_json(&json))
            .map_err(|error| RuntimeError::bare(format!("States.StringToJson: {error}"))),
        other => Err(RuntimeError::bare(format!(
            "States.StringToJson expects a string, got {}.",
            other.type_name()
        ))),
    }
}

/// `States.JsonToString(v)`: serialize a JSON value.
fn json_to_string(_interpreter: &Interpreter, mut arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    let json = arguments.remove(0).into_json();
    serde_json::to_string(&json)
        .map(Value::String)
        .map_err(|error| RuntimeError::bare(format!("States.JsonToString: {error}")))
}

/// `States.Array(a, b, …)`: an array of the arguments, in order.
fn array_create(_interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::Array(arguments))
}

/// `Array.Append(array, v, …)`: append values to the given array.
fn array_append(_interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut arguments = arguments.into_iter();
    let mut array = match arguments.next() {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(RuntimeError::bare(format!(
                "Array.Append expects an array first, got {}.",
                other.type_name()
            )));
        }
        None => return Err(RuntimeError::bare("Array.Append requires an array argument.")),
    };

    array.extend(arguments);
    Ok(Value::Array(array))
}

/// `Array.Join(sep, array)`: join array elements with a separator.
fn array_join(_interpreter: &Interpreter, mut arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    let array = arguments.remove(1);
    let separator = arguments.remove(0);

    let (Value::String(separator), Value::Array(items)) = (separator, array) else {
        return Err(RuntimeError::bare("Array.Join expects a separator string and an array."));
    };

    let rendered: Vec<String> = items.iter().map(render).collect();
    Ok(Value::String(rendered.join(&separator)))
}

/// `String.Trim(s)`: strip leading and trailing whitespace.
fn string_trim(_interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    match &arguments[0] {
        Value::String(text) => Ok(Value::String(text.trim().to_string())),
        other => Err(RuntimeError::bare(format!(
            "String.Trim expects a string, got {}.",
            other.type_name()
        ))),
    }
}

/// `Cast.ToNumber(s)`: parse a string as a decimal. Numbers pass through.
fn cast_to_number(_interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    match &arguments[0] {
        Value::Number(decimal) => Ok(Value::Number(*decimal)),
        Value::String(text) => Decimal::from_str(text.trim())
            .map(Value::Number)
            .map_err(|error| RuntimeError::bare(format!("Cast.ToNumber: {error}"))),
        other => Err(RuntimeError::bare(format!(
            "Cast.ToNumber expects a string, got {}.",
            other.type_name()
        ))),
    }
}

/// `Format.Currency(n, ccy)`: round half-up to two places and render as
/// `$X.YY` for `USD`/`$`, otherwise `X.YY CCY`.
fn format_currency(_interpreter: &Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
    let Value::Number(amount) = &arguments[0] else {
        return Err(RuntimeError::bare(format!(
            "Format.Currency expects a number, got {}.",
            arguments[0].type_name()
        )));
    };
    let Value::String(currency) = &arguments[1] else {
        return Err(RuntimeError::bare(format!(
            "Format.Currency expects a currency string, got {}.",
            arguments[1].type_name()
        )));
    };

    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);

    let formatted = if currency == "USD" || currency == "$" {
        format!("${rounded}")
    } else {
        format!("{rounded} {currency}")
    };

    Ok(Value::String(formatted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate_source;
    use serde_json::json;

    fn eval(source: &str, input: serde_json::Value) -> serde_json::Value {
        evaluate_source(source, Some(input), None)
            .expect("evaluation should succeed")
            .into_json()
    }

    #[test]
    fn format_substitutes_positionally() {
        assert_eq!(
            eval("States.Format('Hello, {}!', $.name)", json!({"name": "world"})),
            json!("Hello, world!")
        );
    }

    #[test]
    fn format_renders_numbers_plainly() {
        assert_eq!(eval("States.Format('{} items', 3)", json!({})), json!("3 items"));
    }

    #[test]
    fn format_with_too_few_arguments_fails() {
        assert!(evaluate_source("States.Format('{} {}', 'a')", Some(json!({})), None).is_err());
    }

    #[test]
    fn string_to_json_and_back_is_identity() {
        let source = r#"States.JsonToString(States.StringToJson('{"a":[1,2],"b":"x"}'))"#;
        assert_eq!(eval(source, json!({})), json!(r#"{"a":[1,2],"b":"x"}"#));
    }

    #[test]
    fn array_create_and_join() {
        assert_eq!(
            eval("Array.Join(',', States.Array('a', 'b', 'c'))", json!({})),
            json!("a,b,c")
        );
    }

    #[test]
    fn array_append_extends() {
        assert_eq!(
            eval("Array.Append(States.Array('a'), 'b', 'c')", json!({})),
            json!(["a", "b", "c"])
        );
    }

    #[test]
    fn array_join_enforces_arity() {
        assert!(evaluate_source("Array.Join(',')", Some(json!({})), None).is_err());
    }

    #[test]
    fn string_trim_strips_whitespace() {
        assert_eq!(eval("String.Trim('  padded  ')", json!({})), json!("padded"));
    }

    #[test]
    fn cast_to_number_parses_decimals() {
        assert_eq!(eval("Cast.ToNumber('10.5') + 1", json!({})), json!(11.5));
    }

    #[test]
    fn currency_rounds_half_up() {
        assert_eq!(
            eval("Format.Currency(Cast.ToNumber('10.999'), 'USD')", json!({})),
            json!("$11.00")
        );
    }

    #[test]
    fn currency_renders_non_usd_with_suffix() {
        assert_eq!(
            eval("Format.Currency(Cast.ToNumber('10.994'), 'EUR')", json!({})),
            json!("10.99 EUR")
        );
    }
}

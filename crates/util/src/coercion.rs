//! Loose boolean coercion for workflow definition fields.

use serde_json::Value;

/// Coerce a JSON value to a boolean the way workflow authors expect.
///
/// Strings count as true when they are `"1"` or start with `t`/`T`; numbers
/// when their rendering is `"1"`. Anything else is false, except a real JSON
/// boolean which passes through.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => coerce_bool_str(text),
        Value::Number(number) => coerce_bool_str(&number.to_string()),
        _ => false,
    }
}

/// String flavor of [`coerce_bool`], used for environment variables.
pub fn coerce_bool_str(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered == "1" || lowered.starts_with('t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn booleans_pass_through() {
        assert!(coerce_bool(&json!(true)));
        assert!(!coerce_bool(&json!(false)));
    }

    #[test]
    fn truthy_strings() {
        assert!(coerce_bool(&json!("1")));
        assert!(coerce_bool(&json!("true")));
        assert!(coerce_bool(&json!("True")));
        assert!(!coerce_bool(&json!("no")));
        assert!(!coerce_bool(&json!("0")));
    }

    #[test]
    fn numbers_follow_string_rendering() {
        assert!(coerce_bool(&json!(1)));
        assert!(!coerce_bool(&json!(0)));
        assert!(!coerce_bool(&json!(2)));
    }

    #[test]
    fn null_and_containers_are_false() {
        assert!(!coerce_bool(&json!(null)));
        assert!(!coerce_bool(&json!([true])));
    }
}

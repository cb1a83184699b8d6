//! `Choice` state rule evaluation.
//!
//! Rules are evaluated in authoring order; the first rule whose predicate
//! holds selects the transition, otherwise `Default` applies. A rule is
//! either a boolean combinator (`And`, `Not`) or a leaf comparator against a
//! `Variable` JSONPath. `Choice` states neither shape their output nor apply
//! `InputPath`/`OutputPath`; the state input passes through untouched.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;
use wkflws_types::WkflwError;
use wkflws_util::jsonpath;

/// Evaluate a `Choice` state and return the name of the next state.
///
/// `context` is the context object `$$…` variables read from.
pub fn next_state(state: &Value, state_input: &Value, context: &Value) -> Result<String, WkflwError> {
    let choices = state
        .get("Choices")
        .and_then(Value::as_array)
        .ok_or_else(|| WkflwError::execution("Choice state has no Choices"))?;

    let mut next = state.get("Default").and_then(Value::as_str).map(str::to_string);

    for (index, rule) in choices.iter().enumerate() {
        // A Choice State MUST NOT be an End state.
        if rule.get("End").is_some() {
            return Err(WkflwError::execution("Choice rule cannot be an End"));
        }

        if evaluate_rule(rule, state_input, context)? {
            debug!("Choice index {index} successful");
            next = Some(
                rule.get("Next")
                    .and_then(Value::as_str)
                    .ok_or_else(|| WkflwError::execution(format!("Choice rule {index} has no Next")))?
                    .to_string(),
            );
            break;
        }
    }

    next.ok_or_else(|| WkflwError::execution("States.NoChoiceMatched"))
}

/// Evaluate one rule, recursing through combinators.
fn evaluate_rule(rule: &Value, state_input: &Value, context: &Value) -> Result<bool, WkflwError> {
    if let Some(conjuncts) = rule.get("And") {
        let conjuncts = conjuncts
            .as_array()
            .ok_or_else(|| WkflwError::execution("And must hold an array of rules"))?;
        for conjunct in conjuncts {
            if !evaluate_rule(conjunct, state_input, context)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    if let Some(negated) = rule.get("Not") {
        return Ok(!evaluate_rule(negated, state_input, context)?);
    }

    let variable = rule
        .get("Variable")
        .and_then(Value::as_str)
        .ok_or_else(|| WkflwError::execution("choice rule has no Variable"))?;

    // `$$` reads the context object, with one `$` stripped.
    let resolved = if let Some(context_path) = variable.strip_prefix("$$") {
        jsonpath::get(context, &format!("${context_path}"))
    } else {
        jsonpath::get(state_input, variable)
    };

    let value = match resolved {
        Ok(value) => Some(value),
        Err(_) => {
            if rule.get("IsPresent").is_none() {
                return Err(WkflwError::execution(format!(
                    "Cannot find match in input for JSON Path '{variable}'"
                )));
            }
            None
        }
    };

    if let Some(expected) = rule.get("IsPresent") {
        let present = value.is_some();
        debug!("Evaluating IsPresent: {variable} = {present}");
        return Ok(present == expected.as_bool().unwrap_or(true));
    }

    let value = value.expect("absent value only allowed for IsPresent");

    if let Some(operand) = rule.get("NumericGreaterThan") {
        return Ok(as_decimal(&value, variable)? > as_decimal(operand, "NumericGreaterThan")?);
    }
    if let Some(operand) = rule.get("NumericGreaterThanEquals") {
        return Ok(as_decimal(&value, variable)? >= as_decimal(operand, "NumericGreaterThanEquals")?);
    }
    if let Some(operand) = rule.get("NumericLessThan") {
        return Ok(as_decimal(&value, variable)? < as_decimal(operand, "NumericLessThan")?);
    }
    if let Some(operand) = rule.get("NumericLessThanEquals") {
        return Ok(as_decimal(&value, variable)? <= as_decimal(operand, "NumericLessThanEquals")?);
    }
    if let Some(operand) = rule.get("NumericEquals") {
        return Ok(as_decimal(&value, variable)? == as_decimal(operand, "NumericEquals")?);
    }
    if let Some(operand) = rule.get("StringEquals") {
        let operand = operand
            .as_str()
            .ok_or_else(|| WkflwError::execution("StringEquals operand must be a string"))?;
        let result = value.as_str() == Some(operand);
        debug!("Evaluating StringEquals {value} == {operand} = {result}");
        return Ok(result);
    }
    if rule.get("IsNull").is_some() {
        return Ok(value.is_null());
    }
    if rule.get("IsNumeric").is_some() {
        return Ok(value.is_number());
    }
    if rule.get("IsString").is_some() {
        return Ok(value.is_string());
    }
    if rule.get("IsBoolean").is_some() {
        return Ok(value.is_boolean());
    }

    Err(WkflwError::execution("Unknown choice rule comparison operator."))
}

fn as_decimal(value: &Value, what: &str) -> Result<Decimal, WkflwError> {
    let parsed = match value {
        Value::Number(number) => Decimal::from_str(&number.to_string()).ok(),
        Value::String(text) => Decimal::from_str(text).ok(),
        _ => None,
    };

    parsed.ok_or_else(|| WkflwError::execution(format!("'{what}' does not resolve to a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numeric_choice() -> Value {
        json!({
            "Type": "Choice",
            "Choices": [
                {"Variable": "$.n", "NumericGreaterThanEquals": 10, "Next": "Big"}
            ],
            "Default": "Small"
        })
    }

    #[test]
    fn first_matching_rule_wins() {
        let next = next_state(&numeric_choice(), &json!({"n": 12}), &json!({})).unwrap();
        assert_eq!(next, "Big");
    }

    #[test]
    fn default_applies_when_no_rule_matches() {
        let next = next_state(&numeric_choice(), &json!({"n": 3}), &json!({})).unwrap();
        assert_eq!(next, "Small");
    }

    #[test]
    fn missing_variable_without_is_present_is_an_error() {
        assert!(matches!(
            next_state(&numeric_choice(), &json!({}), &json!({})),
            Err(WkflwError::Execution(_))
        ));
    }

    #[test]
    fn no_match_and_no_default_raises_no_choice_matched() {
        let state = json!({
            "Type": "Choice",
            "Choices": [{"Variable": "$.n", "NumericEquals": 1, "Next": "One"}]
        });
        let error = next_state(&state, &json!({"n": 2}), &json!({})).unwrap_err();
        assert!(error.to_string().contains("States.NoChoiceMatched"));
    }

    #[test]
    fn choice_rule_with_end_is_rejected() {
        let state = json!({
            "Type": "Choice",
            "Choices": [{"Variable": "$.n", "NumericEquals": 1, "End": true}]
        });
        assert!(matches!(
            next_state(&state, &json!({"n": 1}), &json!({})),
            Err(WkflwError::Execution(_))
        ));
    }

    #[test]
    fn is_present_absorbs_missing_paths() {
        let state = json!({
            "Type": "Choice",
            "Choices": [{"Variable": "$.maybe", "IsPresent": true, "Next": "Yes"}],
            "Default": "No"
        });
        assert_eq!(next_state(&state, &json!({"maybe": 1}), &json!({})).unwrap(), "Yes");
        assert_eq!(next_state(&state, &json!({}), &json!({})).unwrap(), "No");
    }

    #[test]
    fn and_requires_every_conjunct() {
        let state = json!({
            "Type": "Choice",
            "Choices": [{
                "And": [
                    {"Variable": "$.n", "NumericGreaterThan": 0},
                    {"Variable": "$.n", "NumericLessThan": 10}
                ],
                "Next": "InRange"
            }],
            "Default": "OutOfRange"
        });
        assert_eq!(next_state(&state, &json!({"n": 5}), &json!({})).unwrap(), "InRange");
        assert_eq!(next_state(&state, &json!({"n": 50}), &json!({})).unwrap(), "OutOfRange");
    }

    #[test]
    fn not_negates_its_rule() {
        let state = json!({
            "Type": "Choice",
            "Choices": [{
                "Not": {"Variable": "$.kind", "StringEquals": "skip"},
                "Next": "Handle"
            }],
            "Default": "Skip"
        });
        assert_eq!(next_state(&state, &json!({"kind": "run"}), &json!({})).unwrap(), "Handle");
        assert_eq!(next_state(&state, &json!({"kind": "skip"}), &json!({})).unwrap(), "Skip");
    }

    #[test]
    fn type_predicates() {
        let state = json!({
            "Type": "Choice",
            "Choices": [
                {"Variable": "$.v", "IsNull": true, "Next": "Null"},
                {"Variable": "$.v", "IsNumeric": true, "Next": "Number"},
                {"Variable": "$.v", "IsString": true, "Next": "String"},
                {"Variable": "$.v", "IsBoolean": true, "Next": "Boolean"}
            ]
        });
        assert_eq!(next_state(&state, &json!({"v": null}), &json!({})).unwrap(), "Null");
        assert_eq!(next_state(&state, &json!({"v": 1.5}), &json!({})).unwrap(), "Number");
        assert_eq!(next_state(&state, &json!({"v": "x"}), &json!({})).unwrap(), "String");
        assert_eq!(next_state(&state, &json!({"v": true}), &json!({})).unwrap(), "Boolean");
    }

    #[test]
    fn string_equals_compares_strings() {
        let state = json!({
            "Type": "Choice",
            "Choices": [{"Variable": "$.name", "StringEquals": "ada", "Next": "Match"}],
            "Default": "NoMatch"
        });
        assert_eq!(next_state(&state, &json!({"name": "ada"}), &json!({})).unwrap(), "Match");
        assert_eq!(next_state(&state, &json!({"name": "alan"}), &json!({})).unwrap(), "NoMatch");
    }

    #[test]
    fn double_dollar_variable_reads_the_context() {
        let state = json!({
            "Type": "Choice",
            "Choices": [{"Variable": "$$.State.Name", "StringEquals": "Gate", "Next": "Here"}],
            "Default": "Elsewhere"
        });
        let context = json!({"State": {"Name": "Gate"}});
        assert_eq!(next_state(&state, &json!({}), &context).unwrap(), "Here");
    }
}

//! Payload template evaluation.
//!
//! A payload template is a JSON object in which any field whose name ends in
//! `.$` has its value substituted: by JSONPath against the state input (`$…`),
//! by JSONPath against the current state definition (`$$…`), or by invoking
//! an intrinsic function (anything else). The `.$` suffix is stripped from
//! the field name in the output.

use serde_json::{Map as JsonMap, Value};
use tracing::debug;
use wkflws_types::WkflwError;
use wkflws_util::jsonpath;

/// Behavior switches for template evaluation.
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    /// Resolve `$$…` template values against the *current state definition*
    /// (with the leading `$` stripped). This mirrors the engine's historical
    /// behavior; turning it off resolves them against the task context object
    /// instead, which is what the state-language documentation describes.
    pub context_paths_resolve_against_state: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            context_paths_resolve_against_state: true,
        }
    }
}

/// Evaluate a payload template.
///
/// * `state_input` backs `$…` references and is the `$…` scope of intrinsic
///   calls.
/// * `state_definition` backs `$$…` references in the legacy mode.
/// * `context` is the task context object; it backs `$$…` references when the
///   legacy mode is off and is always the `$$…` scope of intrinsic calls.
pub fn evaluate_payload_template(
    template: &JsonMap<String, Value>,
    state_input: &Value,
    state_definition: &Value,
    context: &Value,
    options: &TemplateOptions,
) -> Result<Value, WkflwError> {
    let mut output = JsonMap::new();

    for (field, value) in template {
        if let Some(target) = field.strip_suffix(".$") {
            let resolved = resolve_template_value(field, value, state_input, state_definition, context, options)?;
            output.insert(target.to_string(), resolved);
        } else if let Value::Object(nested) = value {
            output.insert(
                field.clone(),
                evaluate_payload_template(nested, state_input, state_definition, context, options)?,
            );
        } else {
            output.insert(field.clone(), value.clone());
        }
    }

    Ok(Value::Object(output))
}

fn resolve_template_value(
    field: &str,
    value: &Value,
    state_input: &Value,
    state_definition: &Value,
    context: &Value,
    options: &TemplateOptions,
) -> Result<Value, WkflwError> {
    let Value::String(source) = value else {
        return Err(WkflwError::execution(format!(
            "value for template field '{field}' must be a string"
        )));
    };

    if let Some(context_path) = source.strip_prefix("$$") {
        // One `$` is stripped and the remainder is a path.
        let path = format!("${context_path}");
        let root = if options.context_paths_resolve_against_state {
            state_definition
        } else {
            context
        };
        let found = jsonpath::get(root, &path)
            .map_err(|error| WkflwError::execution(format!("template field '{field}': {error}")))?;
        debug!("Parameter {source} resolved to {found}");
        return Ok(found);
    }

    if source.starts_with('$') {
        let found = jsonpath::get(state_input, source)
            .map_err(|error| WkflwError::execution(format!("template field '{field}': {error}")))?;
        debug!("Parameter {source} resolved to {found}");
        return Ok(found);
    }

    // Anything not path-shaped is an intrinsic-function call.
    let result = wkflws_intrinsics::evaluate_source(source, Some(state_input.clone()), Some(context.clone()))
        .map_err(|error| WkflwError::execution(format!("template field '{field}': {error}")))?;
    Ok(result.into_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluate(template: Value, input: Value) -> Result<Value, WkflwError> {
        evaluate_payload_template(
            template.as_object().expect("template is an object"),
            &input,
            &json!({}),
            &json!({}),
            &TemplateOptions::default(),
        )
    }

    #[test]
    fn copies_plain_fields_through() {
        let result = evaluate(json!({"a": 1, "b": [2, 3]}), json!({})).unwrap();
        assert_eq!(result, json!({"a": 1, "b": [2, 3]}));
    }

    #[test]
    fn resolves_input_paths_and_strips_suffix() {
        let result = evaluate(json!({"name.$": "$.user.name"}), json!({"user": {"name": "ada"}})).unwrap();
        assert_eq!(result, json!({"name": "ada"}));
    }

    #[test]
    fn recurses_into_nested_objects() {
        let result = evaluate(
            json!({"outer": {"value.$": "$.n", "fixed": true}}),
            json!({"n": 7}),
        )
        .unwrap();
        assert_eq!(result, json!({"outer": {"value": 7, "fixed": true}}));
    }

    #[test]
    fn invokes_intrinsic_functions() {
        let result = evaluate(
            json!({"msg.$": "States.Format('Hello, {}', $.name)"}),
            json!({"name": "world"}),
        )
        .unwrap();
        assert_eq!(result, json!({"msg": "Hello, world"}));
    }

    #[test]
    fn arithmetic_intrinsics_yield_decimals() {
        let result = evaluate(json!({"total.$": "$.price * 0.1"}), json!({"price": 100})).unwrap();
        assert_eq!(result, json!({"total": 10.0}));
    }

    #[test]
    fn double_dollar_reads_the_state_definition_by_default() {
        let template = json!({"resource.$": "$$.Resource"});
        let state = json!({"Type": "Task", "Resource": "runners/echo"});
        let result = evaluate_payload_template(
            template.as_object().unwrap(),
            &json!({}),
            &state,
            &json!({}),
            &TemplateOptions::default(),
        )
        .unwrap();
        assert_eq!(result, json!({"resource": "runners/echo"}));
    }

    #[test]
    fn double_dollar_reads_the_context_when_legacy_mode_is_off() {
        let template = json!({"state.$": "$$.State.Name"});
        let context = json!({"State": {"Name": "A"}});
        let result = evaluate_payload_template(
            template.as_object().unwrap(),
            &json!({}),
            &json!({}),
            &context,
            &TemplateOptions {
                context_paths_resolve_against_state: false,
            },
        )
        .unwrap();
        assert_eq!(result, json!({"state": "A"}));
    }

    #[test]
    fn missing_path_is_an_execution_error() {
        assert!(matches!(
            evaluate(json!({"x.$": "$.missing"}), json!({})),
            Err(WkflwError::Execution(_))
        ));
    }

    #[test]
    fn non_string_template_value_is_an_execution_error() {
        assert!(matches!(
            evaluate(json!({"x.$": 5}), json!({})),
            Err(WkflwError::Execution(_))
        ));
    }
}

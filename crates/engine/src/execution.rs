//! The workflow execution driver.
//!
//! A [`WorkflowExecution`] owns one run of a workflow definition: it walks
//! the states from `StartAt`, shaping each state's input
//! (`InputPath` → `Parameters`), executing it by `Type`, shaping its output
//! (`ResultSelector` → `ResultPath` → `OutputPath`), and following `Next`
//! until a state carries `End`. States execute strictly in sequence;
//! concurrency exists only across executions.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};
use wkflws_types::{StateType, WkflwError, WorkflowDefinition, WorkflowExecutionData};
use wkflws_util::{coerce_bool, jsonpath};

use crate::executor::Executor;
use crate::template::{TemplateOptions, evaluate_payload_template};
use crate::choice;

/// Behavior switches for the driver.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Fail the whole execution when a task errors, instead of the
    /// historical behavior of logging and continuing with `{}`.
    pub fail_execution_on_task_error: bool,
    /// Payload-template behavior switches.
    pub template: TemplateOptions,
}

/// Where the driver goes after a state completes.
enum Transition {
    End,
    Next(String),
}

/// Output and transition produced by one state.
struct StateOutcome {
    output: Value,
    transition: Transition,
}

/// Describes the execution of a workflow and its state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// A unique string identifying this execution of the workflow, typically
    /// the identifier of the triggering event.
    pub execution_id: String,
    /// The identifier for the workflow being executed (e.g. a database
    /// primary key).
    pub workflow_id: String,
    /// The state-language workflow definition, cloned per execution.
    pub workflow_definition: WorkflowDefinition,
    /// The input provided to the trigger node.
    pub original_input: Value,
    /// Context by state name that is provided to each task as it executes.
    pub state_context: IndexMap<String, Value>,
    /// The start time of this execution.
    pub execution_start_time: DateTime<Utc>,
    /// The name of the current state. `None` until the workflow starts.
    #[serde(default)]
    pub current_state_name: Option<String>,
}

impl WorkflowExecution {
    /// Bind a looked-up workflow to an execution.
    pub fn new(execution_id: impl Into<String>, data: WorkflowExecutionData, original_input: Value) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow_id: data.workflow_id,
            workflow_definition: data.workflow_definition,
            original_input,
            state_context: data.state_context,
            execution_start_time: Utc::now(),
            current_state_name: None,
        }
    }

    /// Begin executing the definition with `state_input` handed to the
    /// `StartAt` state. Returns the final state's effective output.
    pub async fn start(
        &mut self,
        executor: &dyn Executor,
        state_input: Value,
        options: &EngineOptions,
    ) -> Result<Value, WkflwError> {
        debug!("Starting workflow id {}", self.workflow_id);

        if self.current_state_name.is_some() {
            return Err(WkflwError::AlreadyStarted {
                execution_id: self.execution_id.clone(),
            });
        }

        let start_at = self
            .workflow_definition
            .start_at()
            .ok_or_else(|| WkflwError::execution(format!("Unable to start workflow {}. No StartAt defined", self.workflow_id)))?
            .to_string();
        self.set_current_state_name(&start_at)?;

        let mut state_input = state_input;
        loop {
            let state_name = self.current_state_name.clone().expect("state set before each iteration");
            let outcome = self.execute_state(&state_name, state_input, executor, options).await?;

            match outcome.transition {
                Transition::End => return Ok(outcome.output),
                Transition::Next(next_state) => {
                    self.set_current_state_name(&next_state)?;
                    state_input = outcome.output;
                }
            }
        }
    }

    /// Advance the current state, verifying the target exists.
    fn set_current_state_name(&mut self, state_name: &str) -> Result<(), WkflwError> {
        if !self.workflow_definition.contains_state(state_name) {
            return Err(WkflwError::StateNotFound {
                state_name: state_name.to_string(),
            });
        }

        self.current_state_name = Some(state_name.to_string());
        Ok(())
    }

    /// Execute one state and decide where to go next.
    async fn execute_state(
        &mut self,
        state_name: &str,
        state_input: Value,
        executor: &dyn Executor,
        options: &EngineOptions,
    ) -> Result<StateOutcome, WkflwError> {
        debug!("Processing state {state_name}");
        let state = self.workflow_definition.state(state_name)?.clone();

        let state_type = state
            .get("Type")
            .and_then(Value::as_str)
            .and_then(StateType::from_field)
            .ok_or_else(|| {
                WkflwError::execution(format!(
                    "Unknown state type: {}",
                    state.get("Type").map(Value::to_string).unwrap_or_else(|| "null".into())
                ))
            })?;

        let context = self.get_task_context(state_name, None);
        let processed_input = self.get_processed_state_input(&state, &state_input, &context, options)?;

        match state_type {
            StateType::Task => {
                let raw_output = self
                    .state_process_task(state_name, &processed_input, executor, options)
                    .await?;
                let output = self.get_processed_output(&state, state_input, raw_output, &context, options)?;
                Ok(StateOutcome {
                    output,
                    transition: transition_from(&state, state_name)?,
                })
            }
            StateType::Choice => {
                // Choice only supports passthrough: the rules pick the next
                // state and the input flows on unshaped.
                let next_state = choice::next_state(&state, &state_input, &context)?;
                Ok(StateOutcome {
                    output: state_input,
                    transition: Transition::Next(next_state),
                })
            }
            StateType::Pass => {
                // A Pass state copies its input through, unless `Result`
                // supplies the output of a virtual task, placed as prescribed
                // by `ResultPath`.
                let output = match state.get("Result") {
                    Some(result_template) => {
                        let result = match result_template.as_object() {
                            Some(template) => {
                                evaluate_payload_template(template, &processed_input, &state, &context, &options.template)?
                            }
                            None => result_template.clone(),
                        };
                        let output = self.process_result_path(&state, state_name, processed_input, result)?;
                        debug!("Effective output: '{output}'");
                        output
                    }
                    None => state_input,
                };
                Ok(StateOutcome {
                    output,
                    transition: transition_from(&state, state_name)?,
                })
            }
        }
    }

    /// Process the effective input for a state: `InputPath` (currently
    /// passthrough), then `Parameters` as a payload template over the raw
    /// input.
    fn get_processed_state_input(
        &self,
        state: &Value,
        state_input: &Value,
        context: &Value,
        options: &EngineOptions,
    ) -> Result<Value, WkflwError> {
        // TODO: apply InputPath before Parameters.
        let Some(parameters) = state.get("Parameters") else {
            return Ok(state_input.clone());
        };

        let template = parameters
            .as_object()
            .ok_or_else(|| WkflwError::execution("Parameters must be a JSON object"))?;

        evaluate_payload_template(template, state_input, state, context, &options.template)
    }

    /// Run a `Task` state through the executor and deserialize its output.
    ///
    /// Executor failures (and unparseable output) are logged and replaced
    /// with an empty object unless
    /// [`EngineOptions::fail_execution_on_task_error`] is set.
    async fn state_process_task(
        &self,
        state_name: &str,
        state_input: &Value,
        executor: &dyn Executor,
        options: &EngineOptions,
    ) -> Result<Value, WkflwError> {
        debug!("Executing 'Task' state type: '{state_name}'");
        debug!("Task input: {state_input}");

        let serialized_input = serde_json::to_string(state_input)
            .map_err(|error| WkflwError::execution(format!("serializing input for '{state_name}': {error}")))?;

        let result = match executor.execute(state_name, self, &serialized_input).await {
            Ok(raw_output) => serde_json::from_str::<Value>(&raw_output).map_err(|error| WkflwError::State {
                state_name: state_name.to_string(),
                message: format!("output is not valid JSON: {error}"),
            }),
            Err(error) => Err(error),
        };

        match result {
            Ok(output) => Ok(output),
            Err(error) if options.fail_execution_on_task_error => Err(error),
            Err(error) => {
                error!("Exception found during execution of {state_name}: {error}");
                Ok(json!({}))
            }
        }
    }

    /// Process a state's raw output into the input for the next state:
    /// `ResultSelector`, then `ResultPath`, then `OutputPath`.
    fn get_processed_output(
        &self,
        state: &Value,
        input: Value,
        mut output: Value,
        context: &Value,
        options: &EngineOptions,
    ) -> Result<Value, WkflwError> {
        let state_name = self.current_state_name.as_deref().unwrap_or_default();

        if let Some(result_selector) = state.get("ResultSelector") {
            output = match (&output, result_selector) {
                (Value::Object(_), Value::Object(template)) => {
                    evaluate_payload_template(template, &input, state, context, &options.template)?
                }
                // Workaround for older workflows that define a direct
                // JSONPath instead of a payload template; remove when those
                // no longer exist.
                (_, Value::String(path)) => jsonpath::get(&output, path)
                    .map_err(|error| WkflwError::execution(format!("ResultSelector for {state_name}: {error}")))?,
                _ => return Err(WkflwError::execution(format!("Invalid ResultSelector for {state_name}"))),
            };
        }

        let mut output = self.process_result_path(state, state_name, input, output)?;

        if let Some(output_path) = state.get("OutputPath") {
            let output_path = output_path
                .as_str()
                .ok_or_else(|| WkflwError::execution(format!("OutputPath for {state_name} must be a string")))?;
            output = jsonpath::get(&output, output_path)
                .map_err(|error| WkflwError::execution(format!("OutputPath for {state_name}: {error}")))?;
        }

        Ok(output)
    }

    /// Graft `output` into `input` at the state's `ResultPath`.
    fn process_result_path(&self, state: &Value, state_name: &str, input: Value, output: Value) -> Result<Value, WkflwError> {
        let Some(result_path) = state.get("ResultPath") else {
            return Ok(output);
        };
        let result_path = result_path.as_str().unwrap_or_default();

        if result_path.starts_with("$$") {
            // ResultPath may not be used to insert content into the Context
            // Object.
            return Err(WkflwError::execution(format!(
                "ResultPath for {state_name} must not access the context object"
            )));
        }
        if !result_path.starts_with('$') {
            return Err(WkflwError::execution(format!(
                "ResultPath for {state_name} must be a JSONPath value."
            )));
        }

        let mut grafted = input;
        jsonpath::set(&mut grafted, output, result_path, true)
            .map_err(|error| WkflwError::execution(format!("ResultPath for {state_name}: {error}")))?;
        Ok(grafted)
    }

    /// Build the context object provided to a task alongside its input.
    pub fn get_task_context(&self, state_name: &str, entered_time: Option<DateTime<Utc>>) -> Value {
        let entered_time = entered_time.unwrap_or_else(Utc::now);
        let task_context = self.state_context.get(state_name).cloned().unwrap_or_else(|| json!({}));

        json!({
            "Execution": {
                "Id": self.execution_id,
                "Input": self.original_input,
                "StartTime": self.execution_start_time.to_rfc3339(),
            },
            "Workflow": {
                "Id": self.workflow_id,
                "Name": self.workflow_definition.comment().unwrap_or_default(),
            },
            "State": {
                "Name": state_name,
                "EnteredTime": entered_time.to_rfc3339(),
                "RetryCount": 0,
            },
            "Task": task_context,
        })
    }
}

fn transition_from(state: &Value, state_name: &str) -> Result<Transition, WkflwError> {
    if state.get("End").is_some_and(coerce_bool) {
        return Ok(Transition::End);
    }

    let next_state = state
        .get("Next")
        .and_then(Value::as_str)
        .ok_or_else(|| WkflwError::execution(format!("State '{state_name}' has no Next and is not an End state")))?;

    Ok(Transition::Next(next_state.to_string()))
}

//! Subprocess executor.
//!
//! Runs each `Task` resource as a child process on the same host. This keeps
//! task memory separated the way a multi-host production setup would, which
//! makes it a good default for development. The child receives three
//! positional arguments after the resource's own tokens: the serialized
//! state input, the serialized context object, and (when tracing is enabled)
//! the serialized trace-context map. It is expected to write a JSON document
//! to stdout; stderr is diagnostic.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;
use wkflws_types::WkflwError;
use wkflws_util::shell_lexing::split_command;

use crate::execution::WorkflowExecution;
use crate::executor::Executor;

/// Default per-task timeout.
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Executes task resources as child processes.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// The child is killed and the task fails when it runs longer than this.
    pub timeout: Duration,
    /// Environment variables forwarded to the child, in addition to `PATH`.
    pub env_allow_list: Vec<String>,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TASK_TIMEOUT,
            env_allow_list: Vec::new(),
        }
    }
}

impl ProcessExecutor {
    pub fn new(timeout: Duration, env_allow_list: Vec<String>) -> Self {
        Self { timeout, env_allow_list }
    }

    fn state_error(state_name: &str, message: impl Into<String>) -> WkflwError {
        WkflwError::State {
            state_name: state_name.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, state_name: &str, execution: &WorkflowExecution, state_input: &str) -> Result<String, WkflwError> {
        let state = execution.workflow_definition.state(state_name)?;
        let resource = state
            .get("Resource")
            .and_then(Value::as_str)
            .ok_or_else(|| WkflwError::execution(format!("Workflow State '{state_name}' has no defined resource")))?;

        debug!("Executing {resource} for State {state_name}.");

        let mut argv = split_command(resource)
            .map_err(|error| WkflwError::execution(format!("Resource for '{state_name}': {error}")))?;
        if argv.is_empty() {
            return Err(WkflwError::execution(format!("Resource for '{state_name}' is empty")));
        }

        argv.push(state_input.to_string());

        let context = execution.get_task_context(state_name, None);
        argv.push(
            serde_json::to_string(&context)
                .map_err(|error| Self::state_error(state_name, format!("serializing context: {error}")))?,
        );

        if let Some(trace_context) = wkflws_telemetry::current_trace_context() {
            argv.push(
                serde_json::to_string(&trace_context)
                    .map_err(|error| Self::state_error(state_name, format!("serializing trace context: {error}")))?,
            );
        }

        // The child gets a limited environment: the allow-list plus PATH.
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }
        for variable in &self.env_allow_list {
            if let Ok(value) = std::env::var(variable) {
                command.env(variable, value);
            }
        }

        let waited = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| Self::state_error(state_name, format!("timed out after {:?}", self.timeout)))?;

        let output = waited.map_err(|error| Self::state_error(state_name, format!("failed to spawn '{}': {error}", argv[0])))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::state_error(
                state_name,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        String::from_utf8(output.stdout).map_err(|error| Self::state_error(state_name, format!("output is not UTF-8: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use wkflws_types::{WorkflowDefinition, WorkflowExecutionData};

    fn execution_with_resource(resource: &str) -> WorkflowExecution {
        WorkflowExecution::new(
            "exec-1",
            WorkflowExecutionData {
                workflow_id: "wf-1".to_string(),
                workflow_definition: WorkflowDefinition(json!({
                    "StartAt": "A",
                    "States": {"A": {"Type": "Task", "Resource": resource, "End": true}}
                })),
                state_context: IndexMap::new(),
            },
            json!({}),
        )
    }

    #[tokio::test]
    async fn captures_the_child_stdout() {
        // `echo` ignores the appended input/context arguments and prints its
        // first argument, which is enough to observe the wiring.
        let execution = execution_with_resource("echo {\\\"ok\\\":true}");
        let executor = ProcessExecutor::default();
        let output = executor.execute("A", &execution, "{}").await.unwrap();
        assert!(output.contains("ok"));
    }

    #[tokio::test]
    async fn missing_resource_is_an_execution_error() {
        let mut execution = execution_with_resource("echo hi");
        execution
            .workflow_definition
            .states_mut()
            .unwrap()
            .get_mut("A")
            .unwrap()
            .as_object_mut()
            .unwrap()
            .remove("Resource");

        let executor = ProcessExecutor::default();
        assert!(matches!(
            executor.execute("A", &execution, "{}").await,
            Err(WkflwError::Execution(_))
        ));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr_as_state_error() {
        let execution = execution_with_resource("sh -c 'echo boom >&2; exit 3'");
        let executor = ProcessExecutor::default();
        let error = executor.execute("A", &execution, "{}").await.unwrap_err();
        let WkflwError::State { message, .. } = error else {
            panic!("expected a state error");
        };
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn timeout_terminates_the_task() {
        let execution = execution_with_resource("sleep 5");
        let executor = ProcessExecutor::new(Duration::from_millis(50), Vec::new());
        let error = executor.execute("A", &execution, "{}").await.unwrap_err();
        assert!(error.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn unknown_command_is_a_state_error() {
        let execution = execution_with_resource("definitely-not-a-real-binary");
        let executor = ProcessExecutor::default();
        assert!(matches!(
            executor.execute("A", &execution, "{}").await,
            Err(WkflwError::State { .. })
        ));
    }
}

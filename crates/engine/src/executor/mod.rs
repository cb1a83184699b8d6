//! The task executor contract.

use async_trait::async_trait;
use wkflws_types::WkflwError;

use crate::execution::WorkflowExecution;

pub mod process;

pub use process::ProcessExecutor;

/// Runs `Task` state resources.
///
/// Implementations are free to run the resource however they like
/// (in-process, subprocess, remote RPC) but must return a UTF-8 JSON string
/// on success and surface failures as [`WkflwError::State`] carrying
/// whatever diagnostics are available.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute the named state of `execution` with the serialized state
    /// input, returning the task's serialized JSON output.
    async fn execute(&self, state_name: &str, execution: &WorkflowExecution, state_input: &str) -> Result<String, WkflwError>;
}

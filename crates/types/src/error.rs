//! Error kinds shared across the orchestrator.

use thiserror::Error;

/// Errors raised while dispatching and executing workflows.
#[derive(Debug, Error)]
pub enum WkflwError {
    /// Something is structurally wrong with the workflow or its evaluation:
    /// missing `StartAt`, bad `ResultPath`, an exhausted `Choice`, an unknown
    /// state `Type`, or a failed template/path evaluation.
    #[error("execution error: {0}")]
    Execution(String),

    /// `start` was called on an execution that already has a current state.
    #[error("workflow execution id {execution_id} has already started")]
    AlreadyStarted { execution_id: String },

    /// A transition target or requested state does not exist.
    #[error("workflow state '{state_name}' was not found in the definition")]
    StateNotFound { state_name: String },

    /// The task executor failed: non-zero termination, unparseable output,
    /// or a timeout.
    #[error("state '{state_name}' failed: {message}")]
    State { state_name: String, message: String },

    /// A startup-time configuration problem.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The event broker failed to accept or deliver a message.
    #[error("broker error: {0}")]
    Broker(String),
}

impl WkflwError {
    /// Shorthand for an [`WkflwError::Execution`] with a formatted message.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

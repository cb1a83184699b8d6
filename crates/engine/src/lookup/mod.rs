//! The workflow lookup contract.
//!
//! A lookup is responsible for providing the engine with the state-language
//! workflows to execute for an incoming trigger event.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use wkflws_types::{Event, WkflwError, WorkflowExecutionData};

use crate::execution::WorkflowExecution;

pub mod filesystem;

pub use filesystem::FileSystemLookup;

/// Resolves an event to the workflows it should start.
#[async_trait]
pub trait WorkflowLookup: Send + Sync {
    /// Look up all workflows that should be executed for the provided event.
    ///
    /// Implementations may filter by event shape. Returned definitions must
    /// be private copies: the engine rewrites them per run (e.g. `Resource`)
    /// and those mutations must not leak back into any cache.
    async fn get_workflows(&self, initial_node_id: &str, event: &Event) -> Result<Vec<WorkflowExecutionData>, WkflwError>;
}

/// Bind every workflow matched by the lookup to a fresh execution.
pub async fn initialize_workflows(
    lookup: &dyn WorkflowLookup,
    initial_node_id: &str,
    event: &Event,
    workflow_input: &Value,
) -> Result<Vec<WorkflowExecution>, WkflwError> {
    let execution_data = lookup.get_workflows(initial_node_id, event).await?;
    debug!("Executing {} workflows", execution_data.len());

    Ok(execution_data
        .into_iter()
        .map(|data| WorkflowExecution::new(event.identifier.clone(), data, workflow_input.clone()))
        .collect())
}

//! Views over state-language workflow definitions.
//!
//! A definition is authored as a JSON document (`StartAt`, optional
//! `Comment`, and a `States` map) and stays a [`serde_json::Value`] at rest:
//! state objects carry open-ended, state-type-specific fields that the engine
//! reads positionally. [`WorkflowDefinition`] wraps the document with typed
//! accessors so the field names live in one place.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

use crate::error::WkflwError;

/// The three state types the engine executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateType {
    Task,
    Choice,
    Pass,
}

impl StateType {
    /// Parse a state's `Type` field.
    pub fn from_field(raw: &str) -> Option<Self> {
        match raw {
            "Task" => Some(Self::Task),
            "Choice" => Some(Self::Choice),
            "Pass" => Some(Self::Pass),
            _ => None,
        }
    }
}

/// An immutable state-language workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct WorkflowDefinition(pub Value);

impl WorkflowDefinition {
    /// Name of the state execution begins with.
    pub fn start_at(&self) -> Option<&str> {
        self.0.get("StartAt").and_then(Value::as_str)
    }

    /// The optional human-readable `Comment`, doubling as the workflow name.
    pub fn comment(&self) -> Option<&str> {
        self.0.get("Comment").and_then(Value::as_str)
    }

    /// The `States` map.
    pub fn states(&self) -> Option<&JsonMap<String, Value>> {
        self.0.get("States").and_then(Value::as_object)
    }

    /// Mutable access to the `States` map, for per-run `Resource` rewrites.
    pub fn states_mut(&mut self) -> Option<&mut JsonMap<String, Value>> {
        self.0.get_mut("States").and_then(Value::as_object_mut)
    }

    /// Look up a state definition by name.
    pub fn state(&self, state_name: &str) -> Result<&Value, WkflwError> {
        self.states()
            .and_then(|states| states.get(state_name))
            .ok_or_else(|| WkflwError::StateNotFound {
                state_name: state_name.to_string(),
            })
    }

    /// Whether a state with this name exists.
    pub fn contains_state(&self, state_name: &str) -> bool {
        self.states().is_some_and(|states| states.contains_key(state_name))
    }
}

/// A workflow matched by the lookup, ready to be bound to an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionData {
    /// Identifier for the workflow, most likely a storage primary key.
    pub workflow_id: String,
    /// The definition to execute. Deep-copied per execution so per-run
    /// mutations never leak back into the lookup's cache.
    pub workflow_definition: WorkflowDefinition,
    /// Per-state auxiliary JSON (e.g. credentials), keyed by state name and
    /// handed to the task through its `Task` context namespace.
    pub state_context: IndexMap<String, Value>,
}

//! # wkflws engine
//!
//! The workflow execution engine: a state machine over state-language
//! definitions (`Task` / `Choice` / `Pass`), the data-shaping pipeline that
//! transforms each state's input and output (JSONPath references and payload
//! templates with intrinsic functions), and the two contracts the engine
//! consumes — the task [`Executor`] and the [`WorkflowLookup`].
//!
//! One [`execution::WorkflowExecution`] drives one run; executions are
//! independent and run concurrently as separate tasks on the same runtime.

pub mod choice;
pub mod execution;
pub mod executor;
pub mod lookup;
pub mod template;

pub use execution::{EngineOptions, WorkflowExecution};
pub use executor::{Executor, ProcessExecutor};
pub use lookup::{FileSystemLookup, WorkflowLookup, initialize_workflows};
pub use template::{TemplateOptions, evaluate_payload_template};

//! Shared type definitions for the wkflws orchestrator: the event envelope,
//! workflow definition views, and the common error kinds.

pub mod error;
pub mod event;
pub mod workflow;

pub use error::WkflwError;
pub use event::{DeliveryReceipt, Event};
pub use workflow::{StateType, WorkflowDefinition, WorkflowExecutionData};

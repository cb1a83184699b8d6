//! Shared helpers for the wkflws orchestrator: JSONPath resolution, resource
//! command splitting, boolean coercion, and environment-backed settings.

pub mod coercion;
pub mod jsonpath;
pub mod settings;
pub mod shell_lexing;

pub use coercion::coerce_bool;
pub use jsonpath::PathError;
pub use settings::{ConfigurationError, Settings, TraceScheme, TracerConfig};

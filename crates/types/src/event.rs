//! The event envelope exchanged between triggers, the broker, and the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data that should be dispatched to the workflow engine, either inline or
/// through the event bus.
///
/// Events are created by a trigger listener and immutable afterwards, with
/// one exception: trace-context headers are injected into `metadata` right
/// before the event leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Stable identifier for this event. Used as the broker message key and
    /// as the execution/trace correlation id.
    pub identifier: String,
    /// Metadata about the event. Carries trigger context and, across process
    /// hops, the trace-context headers.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// The payload of the event: an object or an array of objects.
    #[serde(default)]
    pub data: Value,
}

impl Event {
    /// Build an event with empty metadata.
    pub fn new(identifier: impl Into<String>, data: Value) -> Self {
        Self {
            identifier: identifier.into(),
            metadata: HashMap::new(),
            data,
        }
    }

    /// Serialize the envelope for the broker.
    pub fn as_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Describes the result of a successfully produced broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Message key the event was produced under.
    pub key: String,
    /// Topic the event landed on.
    pub topic: String,
    /// Partition assigned by the broker.
    pub partition: i32,
    /// Offset assigned by the broker.
    pub offset: i64,
}

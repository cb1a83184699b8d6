//! Asynchronous Kafka consumer: the receiving end of a trigger.

use std::collections::HashMap;

use rdkafka::Message;
use rdkafka::consumer::{Consumer as _, StreamConsumer};
use rdkafka::message::BorrowedMessage;
use serde_json::Value;
use tracing::{debug, error};
use wkflws_types::{Event, WkflwError};
use wkflws_util::Settings;

use crate::kafka_client_config;
use crate::trigger::Trigger;

/// Consumes the trigger's topic and dispatches workflows for each event.
pub struct Consumer {
    consumer: StreamConsumer,
    topic: String,
}

impl Consumer {
    /// Connect and subscribe. One consumer owns one group subscription.
    pub fn new(settings: &Settings, client_id: &str, consumer_group: &str, topic: &str) -> Result<Self, WkflwError> {
        let mut config = kafka_client_config(settings, client_id)?;
        config
            .set("group.id", consumer_group)
            // Read from the smallest offset when there is no committed
            // offset, or the committed offset is invalid.
            .set("auto.offset.reset", "smallest")
            .set("enable.auto.commit", "true");

        let consumer: StreamConsumer = config.create().map_err(|error| WkflwError::Broker(error.to_string()))?;

        debug!("Subscribing to topic {topic}");
        consumer
            .subscribe(&[topic])
            .map_err(|error| WkflwError::Broker(error.to_string()))?;

        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }

    /// Poll the topic until the process shuts down. Malformed messages and
    /// broker hiccups are logged and skipped; workflow failures stay inside
    /// their own executions.
    pub async fn run(&self, trigger: &Trigger) -> Result<(), WkflwError> {
        loop {
            match self.consumer.recv().await {
                Err(broker_error) => {
                    error!("broker error on topic {}: {broker_error}", self.topic);
                }
                Ok(message) => {
                    if let Err(dispatch_error) = self.handle_message(&message, trigger).await {
                        error!("failed to process message from {}: {dispatch_error}", self.topic);
                    }
                }
            }
        }
    }

    async fn handle_message(&self, message: &BorrowedMessage<'_>, trigger: &Trigger) -> Result<(), WkflwError> {
        let Some(payload) = message.payload() else {
            debug!("skipping empty message at offset {}", message.offset());
            return Ok(());
        };

        let envelope: Value =
            serde_json::from_slice(payload).map_err(|error| WkflwError::Broker(format!("undecodable event payload: {error}")))?;

        // Not every producer sets the message key; fall back to the
        // envelope's identifier.
        let identifier = message
            .key()
            .and_then(|key| std::str::from_utf8(key).ok())
            .map(str::to_string)
            .or_else(|| {
                envelope
                    .get("identifier")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .ok_or_else(|| WkflwError::Broker("message has neither a key nor an identifier".to_string()))?;

        let metadata: HashMap<String, String> = envelope
            .get("metadata")
            .and_then(|metadata| serde_json::from_value(metadata.clone()).ok())
            .unwrap_or_default();
        let data = envelope.get("data").cloned().unwrap_or(Value::Null);

        let event = Event {
            identifier,
            metadata,
            data,
        };

        // Resume the trace that was started on the producing side.
        let _trace_guard = wkflws_telemetry::extract_and_attach(&event.metadata);

        trigger.dispatch_workflows(event).await
    }
}

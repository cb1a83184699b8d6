//! Event ingestion and trigger-to-workflow dispatch.
//!
//! A trigger is designed as two separate pieces with an event bus (Kafka)
//! in between: the listener side accepts raw stimulus, wraps it in an
//! [`wkflws_types::Event`], and calls [`Trigger::send_event`]; the processor
//! side consumes events off the bus and dispatches workflow executions. With
//! no topic configured the two halves collapse into in-process dispatch.

pub mod consumer;
pub mod producer;
pub mod trigger;

pub use consumer::Consumer;
pub use producer::ProducerHandle;
pub use trigger::{EventProcessor, PassthroughProcessor, ProcessedEvent, Trigger, TriggerConfig};

use rdkafka::ClientConfig;
use wkflws_types::WkflwError;
use wkflws_util::Settings;

/// Base Kafka client configuration shared by the producer and consumer.
pub(crate) fn kafka_client_config(settings: &Settings, client_id: &str) -> Result<ClientConfig, WkflwError> {
    let bootstrap_servers = settings
        .kafka_bootstrap_servers()
        .ok_or_else(|| WkflwError::Configuration("Undefined Kafka host.".to_string()))?;

    let mut config = ClientConfig::new();
    config.set("client.id", client_id).set("bootstrap.servers", bootstrap_servers);

    if let Some(username) = &settings.kafka_username {
        config
            .set("sasl.mechanisms", "PLAIN")
            .set("security.protocol", "SASL_SSL")
            .set("sasl.username", username)
            .set("sasl.password", settings.kafka_password.clone().unwrap_or_default());
    }

    Ok(config)
}

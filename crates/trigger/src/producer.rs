//! Asynchronous Kafka producer.
//!
//! The broker client is owned by a dedicated task; callers talk to it over a
//! bounded command channel and receive the delivery result on a oneshot
//! reply. The task drains and finishes when every handle is dropped.

use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use wkflws_types::{DeliveryReceipt, Event, WkflwError};
use wkflws_util::Settings;

use crate::kafka_client_config;

/// Commands accepted by the producer task.
enum ProducerCommand {
    Produce {
        topic: String,
        key: String,
        payload: String,
        reply: oneshot::Sender<Result<DeliveryReceipt, WkflwError>>,
    },
}

/// Handle to the producer task.
#[derive(Clone)]
pub struct ProducerHandle {
    commands: mpsc::Sender<ProducerCommand>,
    default_topic: String,
}

impl ProducerHandle {
    /// Create the broker client and spawn the task that owns it.
    pub fn spawn(settings: &Settings, client_id: &str, default_topic: &str) -> Result<Self, WkflwError> {
        let producer: FutureProducer = kafka_client_config(settings, client_id)?
            .create()
            .map_err(|error| WkflwError::Broker(error.to_string()))?;

        let (commands, receiver) = mpsc::channel(64);
        tokio::spawn(producer_task(producer, receiver));

        Ok(Self {
            commands,
            default_topic: default_topic.to_string(),
        })
    }

    /// Send an event to downstream consumers.
    ///
    /// The message value is the serialized event envelope; `key` should be
    /// the event identifier so per-event ordering holds downstream.
    pub async fn produce(&self, event: &Event, key: &str, topic: Option<&str>) -> Result<DeliveryReceipt, WkflwError> {
        let payload = event.as_json().map_err(|error| WkflwError::Broker(error.to_string()))?;
        let (reply, response) = oneshot::channel();

        self.commands
            .send(ProducerCommand::Produce {
                topic: topic.unwrap_or(&self.default_topic).to_string(),
                key: key.to_string(),
                payload,
                reply,
            })
            .await
            .map_err(|_| WkflwError::Broker("producer task has shut down".to_string()))?;

        response
            .await
            .map_err(|_| WkflwError::Broker("producer task dropped the reply".to_string()))?
    }
}

async fn producer_task(producer: FutureProducer, mut commands: mpsc::Receiver<ProducerCommand>) {
    while let Some(command) = commands.recv().await {
        match command {
            ProducerCommand::Produce {
                topic,
                key,
                payload,
                reply,
            } => {
                let record = FutureRecord::to(&topic).key(&key).payload(&payload);
                let result = match producer.send(record, Timeout::Never).await {
                    Ok((partition, offset)) => {
                        debug!("delivered key {key} to {topic}[{partition}]@{offset}");
                        Ok(DeliveryReceipt {
                            key,
                            topic,
                            partition,
                            offset,
                        })
                    }
                    Err((error, _message)) => Err(WkflwError::Broker(error.to_string())),
                };

                if reply.send(result).is_err() {
                    warn!("producer caller went away before delivery completed");
                }
            }
        }
    }
    // Channel closed: all handles dropped, the client disconnects on drop.
}

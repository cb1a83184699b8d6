//! The trigger: converts events into workflow executions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use wkflws_engine::{EngineOptions, Executor, WorkflowLookup, initialize_workflows};
use wkflws_types::{Event, WkflwError};
use wkflws_util::Settings;

use crate::producer::ProducerHandle;

/// Static configuration for one trigger instance.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// A unique identifier for this client, used for producer/consumer
    /// naming on the broker.
    pub client_identifier: String,
    /// The version of this node, surfaced by listeners.
    pub client_version: String,
    /// Topic to publish and receive events on. `None` dispatches inline.
    pub kafka_topic: Option<String>,
    /// Consumer group for the processor side. Required when a topic is set.
    pub kafka_consumer_group: Option<String>,
}

/// The result of processing an event: which trigger node matched and the
/// input for the workflows it starts.
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub initial_node_id: String,
    pub workflow_input: Value,
}

/// Business logic that decides whether an event starts workflows.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Map an event to its initial node and workflow input, or `None` when
    /// the event should be ignored.
    async fn process(&self, event: &Event) -> Result<Option<ProcessedEvent>, WkflwError>;
}

/// Processor that trusts the event envelope: the initial node id comes from
/// the `node_id` metadata entry and the event data becomes the workflow
/// input. Used by the generic broker processor, where the listener already
/// decided which node the event belongs to.
pub struct PassthroughProcessor;

#[async_trait]
impl EventProcessor for PassthroughProcessor {
    async fn process(&self, event: &Event) -> Result<Option<ProcessedEvent>, WkflwError> {
        Ok(event.metadata.get("node_id").map(|node_id| ProcessedEvent {
            initial_node_id: node_id.clone(),
            workflow_input: event.data.clone(),
        }))
    }
}

/// Accepts events and turns them into concurrently running workflow
/// executions, either inline or through the broker.
pub struct Trigger {
    config: TriggerConfig,
    processor: Arc<dyn EventProcessor>,
    lookup: Arc<dyn WorkflowLookup>,
    executor: Arc<dyn Executor>,
    engine_options: EngineOptions,
    settings: Settings,
    producer: Option<ProducerHandle>,
}

impl Trigger {
    pub fn new(
        config: TriggerConfig,
        processor: Arc<dyn EventProcessor>,
        lookup: Arc<dyn WorkflowLookup>,
        executor: Arc<dyn Executor>,
        engine_options: EngineOptions,
        settings: Settings,
    ) -> Result<Self, WkflwError> {
        if let Some(topic) = &config.kafka_topic {
            // Kafka metric names collide for topics that differ only in
            // period vs underscore.
            if topic.contains('_') {
                return Err(WkflwError::Configuration(format!(
                    "topic '{topic}' contains an underscore; use a period instead"
                )));
            }
            if config.kafka_consumer_group.is_none() {
                return Err(WkflwError::Configuration(
                    "kafka_consumer_group must be defined when kafka_topic is defined.".to_string(),
                ));
            }
        } else {
            info!("No Kafka topic defined. Event processing will be done inline.");
        }

        Ok(Self {
            config,
            processor,
            lookup,
            executor,
            engine_options,
            settings,
            producer: None,
        })
    }

    /// Initialize the listener-side pieces: the tracer and, when a topic and
    /// broker host are configured, the producer.
    ///
    /// Listeners call this themselves rather than having it happen at
    /// construction, because only they know when their worker processes
    /// exist.
    pub fn initialize_listener(&mut self) -> Result<(), WkflwError> {
        wkflws_telemetry::initialize(&self.settings).map_err(|error| WkflwError::Configuration(error.to_string()))?;

        if self.producer.is_none()
            && let Some(topic) = &self.config.kafka_topic
            && self.settings.kafka_host.is_some()
        {
            info!(
                "Initializing producer to topic:{topic} as client:{}",
                self.config.client_identifier
            );
            self.producer = Some(ProducerHandle::spawn(&self.settings, &self.config.client_identifier, topic)?);
        }

        Ok(())
    }

    /// Send `event` to the event bus, or process it inline when no producer
    /// is configured.
    pub async fn send_event(&self, mut event: Event) -> Result<(), WkflwError> {
        let _span = wkflws_telemetry::start_active_span("trigger.send_event");
        wkflws_telemetry::inject_context(&mut event.metadata);

        match &self.producer {
            Some(producer) => {
                debug!("publishing event {} to the broker", event.identifier);
                let key = event.identifier.clone();
                producer.produce(&event, &key, None).await?;
                Ok(())
            }
            None => {
                debug!("processing event {} inline", event.identifier);
                self.dispatch_workflows(event).await
            }
        }
    }

    /// Resolve an event to workflow executions and launch them all as
    /// independent tasks, without awaiting their completion.
    pub(crate) async fn dispatch_workflows(&self, event: Event) -> Result<(), WkflwError> {
        let Some(processed) = self.processor.process(&event).await? else {
            return Ok(());
        };

        let executions = initialize_workflows(
            self.lookup.as_ref(),
            &processed.initial_node_id,
            &event,
            &processed.workflow_input,
        )
        .await?;

        for mut execution in executions {
            let executor = Arc::clone(&self.executor);
            let options = self.engine_options.clone();
            let workflow_input = processed.workflow_input.clone();

            let _handle: JoinHandle<()> = tokio::spawn(async move {
                if let Err(execution_error) = execution.start(executor.as_ref(), workflow_input, &options).await {
                    error!(
                        "workflow {} execution {} failed: {execution_error}",
                        execution.workflow_id, execution.execution_id
                    );
                }
            });
        }

        Ok(())
    }

    /// Run the processor side: consume the configured topic and dispatch
    /// workflows for every decoded event. Runs until the consumer fails
    /// fatally or the process shuts down.
    pub async fn start_processor(&self) -> Result<(), WkflwError> {
        let Some(topic) = &self.config.kafka_topic else {
            return Err(WkflwError::Configuration(format!(
                "Kafka topic is undefined for {}",
                self.config.client_identifier
            )));
        };
        let Some(consumer_group) = &self.config.kafka_consumer_group else {
            return Err(WkflwError::Configuration(
                "kafka_consumer_group must be defined when kafka_topic is defined.".to_string(),
            ));
        };
        if self.settings.kafka_host.is_none() {
            return Err(WkflwError::Configuration(
                "No Kafka host defined. Either define the Kafka host or use inline processing on the listener.".to_string(),
            ));
        }

        wkflws_telemetry::initialize(&self.settings).map_err(|error| WkflwError::Configuration(error.to_string()))?;

        let consumer = crate::Consumer::new(&self.settings, &self.config.client_identifier, consumer_group, topic)?;
        consumer.run(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wkflws_engine::execution::WorkflowExecution;
    use wkflws_types::{WorkflowDefinition, WorkflowExecutionData};

    fn settings() -> Settings {
        Settings {
            kafka_host: None,
            kafka_port: 9092,
            kafka_username: None,
            kafka_password: None,
            no_color: false,
            workflow_lookup_class: "filesystem".to_string(),
            executor_class: "process".to_string(),
            tracing_resource_name: "wkflws".to_string(),
            tracing_exporters: Vec::new(),
        }
    }

    fn config(topic: Option<&str>, group: Option<&str>) -> TriggerConfig {
        TriggerConfig {
            client_identifier: "test_client".to_string(),
            client_version: "0.0.1".to_string(),
            kafka_topic: topic.map(str::to_string),
            kafka_consumer_group: group.map(str::to_string),
        }
    }

    struct StaticLookup(Value);

    #[async_trait]
    impl WorkflowLookup for StaticLookup {
        async fn get_workflows(
            &self,
            _initial_node_id: &str,
            _event: &Event,
        ) -> Result<Vec<WorkflowExecutionData>, WkflwError> {
            Ok(vec![WorkflowExecutionData {
                workflow_id: "wf-1".to_string(),
                workflow_definition: WorkflowDefinition(self.0.clone()),
                state_context: IndexMap::new(),
            }])
        }
    }

    /// Executor that reports each call on a channel.
    struct ReportingExecutor(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl Executor for ReportingExecutor {
        async fn execute(
            &self,
            state_name: &str,
            _execution: &WorkflowExecution,
            state_input: &str,
        ) -> Result<String, WkflwError> {
            self.0.send(state_input.to_string()).expect("test channel open");
            let _ = state_name;
            Ok("{}".to_string())
        }
    }

    struct FixedProcessor(Option<ProcessedEvent>);

    #[async_trait]
    impl EventProcessor for FixedProcessor {
        async fn process(&self, _event: &Event) -> Result<Option<ProcessedEvent>, WkflwError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn underscore_topics_are_rejected() {
        let (sender, _receiver) = mpsc::unbounded_channel();
        let result = Trigger::new(
            config(Some("webhook_shopify"), Some("group")),
            Arc::new(PassthroughProcessor),
            Arc::new(StaticLookup(json!({}))),
            Arc::new(ReportingExecutor(sender)),
            EngineOptions::default(),
            settings(),
        );
        assert!(matches!(result, Err(WkflwError::Configuration(_))));
    }

    #[test]
    fn topic_without_consumer_group_is_rejected() {
        let (sender, _receiver) = mpsc::unbounded_channel();
        let result = Trigger::new(
            config(Some("webhook.shopify"), None),
            Arc::new(PassthroughProcessor),
            Arc::new(StaticLookup(json!({}))),
            Arc::new(ReportingExecutor(sender)),
            EngineOptions::default(),
            settings(),
        );
        assert!(matches!(result, Err(WkflwError::Configuration(_))));
    }

    #[tokio::test]
    async fn inline_send_event_runs_matched_workflows() {
        let definition = json!({
            "StartAt": "Notify",
            "States": {"Notify": {"Type": "Task", "Resource": "slack.post", "End": true}}
        });
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let trigger = Trigger::new(
            config(None, None),
            Arc::new(FixedProcessor(Some(ProcessedEvent {
                initial_node_id: "slack.post".to_string(),
                workflow_input: json!({"text": "hi"}),
            }))),
            Arc::new(StaticLookup(definition)),
            Arc::new(ReportingExecutor(sender)),
            EngineOptions::default(),
            settings(),
        )
        .unwrap();

        trigger.send_event(Event::new("evt-1", json!({}))).await.unwrap();

        let observed = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("execution should reach the task")
            .expect("channel open");
        assert_eq!(serde_json::from_str::<Value>(&observed).unwrap(), json!({"text": "hi"}));
    }

    #[tokio::test]
    async fn events_the_processor_declines_are_dropped() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let trigger = Trigger::new(
            config(None, None),
            Arc::new(FixedProcessor(None)),
            Arc::new(StaticLookup(json!({}))),
            Arc::new(ReportingExecutor(sender)),
            EngineOptions::default(),
            settings(),
        )
        .unwrap();

        trigger.send_event(Event::new("evt-2", json!({}))).await.unwrap();
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn passthrough_processor_reads_node_id_metadata() {
        let mut event = Event::new("evt-3", json!({"n": 1}));
        assert!(PassthroughProcessor.process(&event).await.unwrap().is_none());

        event.metadata.insert("node_id".to_string(), "webhook.receive".to_string());
        let processed = PassthroughProcessor.process(&event).await.unwrap().unwrap();
        assert_eq!(processed.initial_node_id, "webhook.receive");
        assert_eq!(processed.workflow_input, json!({"n": 1}));
    }

    #[tokio::test]
    async fn processor_without_topic_fails_configuration() {
        let (sender, _receiver) = mpsc::unbounded_channel();
        let trigger = Trigger::new(
            config(None, None),
            Arc::new(PassthroughProcessor),
            Arc::new(StaticLookup(json!({}))),
            Arc::new(ReportingExecutor(sender)),
            EngineOptions::default(),
            settings(),
        )
        .unwrap();

        assert!(matches!(
            trigger.start_processor().await,
            Err(WkflwError::Configuration(_))
        ));
    }
}

//! The wkflws command line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use wkflws_engine::{EngineOptions, FileSystemLookup, ProcessExecutor};
use wkflws_trigger::{PassthroughProcessor, ProducerHandle, Trigger, TriggerConfig};
use wkflws_types::Event;
use wkflws_util::Settings;

#[derive(Parser)]
#[command(name = "wkflws", version, about = "Event-driven state-language workflow orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger-side services.
    Trigger {
        #[command(subcommand)]
        command: TriggerCommands,
    },
    /// Publish events from a file to the broker.
    ///
    /// The file holds a JSON array of `{"key", "topic", "event"}` records,
    /// where each event is an `{"identifier", "metadata", "data"}` envelope.
    Publish { file: PathBuf },
}

#[derive(Subcommand)]
enum TriggerCommands {
    /// Consume the configured topic and execute matching workflows.
    StartProcessor {
        /// Topic to subscribe to. Underscores are rejected; use periods.
        #[arg(long)]
        topic: String,
        /// Consumer group for this processor instance.
        #[arg(long)]
        consumer_group: String,
        /// Directory holding `.asl` workflow files and `credentials.json`.
        #[arg(long, default_value = ".")]
        workflow_dir: PathBuf,
        /// Command prepended to every task `Resource` (e.g. an interpreter).
        #[arg(long)]
        resource_prefix: Option<String>,
    },
}

#[derive(Deserialize)]
struct PublishRecord {
    key: String,
    topic: String,
    event: Event,
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env().context("reading WKFLWS_ settings from the environment")?;
    init_tracing(&settings);
    wkflws_telemetry::initialize(&settings).context("initializing trace exporters")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Trigger {
            command:
                TriggerCommands::StartProcessor {
                    topic,
                    consumer_group,
                    workflow_dir,
                    resource_prefix,
                },
        } => start_processor(settings, topic, consumer_group, workflow_dir, resource_prefix).await,
        Commands::Publish { file } => publish(settings, file).await,
    }
}

async fn start_processor(
    settings: Settings,
    topic: String,
    consumer_group: String,
    workflow_dir: PathBuf,
    resource_prefix: Option<String>,
) -> Result<()> {
    let lookup = build_lookup(&settings, &workflow_dir, resource_prefix)?;
    let executor = build_executor(&settings)?;

    let trigger = Trigger::new(
        TriggerConfig {
            client_identifier: "wkflws.processor".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            kafka_topic: Some(topic),
            kafka_consumer_group: Some(consumer_group),
        },
        Arc::new(PassthroughProcessor),
        lookup,
        executor,
        EngineOptions::default(),
        settings,
    )?;

    trigger.start_processor().await?;
    Ok(())
}

fn build_lookup(
    settings: &Settings,
    workflow_dir: &PathBuf,
    resource_prefix: Option<String>,
) -> Result<Arc<dyn wkflws_engine::WorkflowLookup>> {
    match settings.workflow_lookup_class.as_str() {
        "filesystem" => {
            let lookup = FileSystemLookup::from_dir(workflow_dir, resource_prefix)
                .with_context(|| format!("loading workflows from {}", workflow_dir.display()))?;
            Ok(Arc::new(lookup))
        }
        other => anyhow::bail!("unknown WKFLWS_WORKFLOW_LOOKUP_CLASS '{other}'"),
    }
}

fn build_executor(settings: &Settings) -> Result<Arc<dyn wkflws_engine::Executor>> {
    match settings.executor_class.as_str() {
        "process" => Ok(Arc::new(ProcessExecutor::default())),
        other => anyhow::bail!("unknown WKFLWS_EXECUTOR_CLASS '{other}'"),
    }
}

async fn publish(settings: Settings, file: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
    let records: Vec<PublishRecord> =
        serde_json::from_str(&raw).context("file must hold a JSON array of {key, topic, event} records")?;

    let Some(first) = records.first() else {
        info!("nothing to publish");
        return Ok(());
    };

    let producer = ProducerHandle::spawn(&settings, "wkflws.publish", &first.topic)?;
    for record in &records {
        let receipt = producer.produce(&record.event, &record.key, Some(&record.topic)).await?;
        info!(
            "delivered {} to {}[{}]@{}",
            receipt.key, receipt.topic, receipt.partition, receipt.offset
        );
    }

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!settings.no_color)
        .try_init();
}

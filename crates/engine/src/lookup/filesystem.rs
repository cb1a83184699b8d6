//! A lookup that reads workflows from a directory tree.
//!
//! Pre-loads every `.asl` file under the root directory, keyed by the
//! `Resource` of each workflow's start state, and caches credentials from a
//! `credentials.json` map at the root (`{"node_id": {"key": "value"}}`).
//! This provides a quick way to try the orchestrator out; it does not store
//! credentials securely and is not meant for production use.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, error};
use wkflws_types::{Event, WkflwError, WorkflowDefinition, WorkflowExecutionData};

use crate::lookup::WorkflowLookup;

/// Properties of one loaded workflow file.
#[derive(Debug, Clone)]
struct StoredWorkflow {
    /// Hash of the full file path.
    identifier: String,
    /// The parsed definition.
    definition: WorkflowDefinition,
}

/// Filesystem-backed workflow lookup.
pub struct FileSystemLookup {
    /// Workflows keyed by their trigger node identifier.
    workflows: HashMap<String, Vec<StoredWorkflow>>,
    /// Credentials keyed by node identifier.
    credentials: Value,
    /// Prepended to every `Resource` so definitions stay executor-agnostic,
    /// e.g. `node` to run JavaScript task nodes.
    resource_prefix: Option<String>,
}

impl FileSystemLookup {
    /// Load every `.asl` workflow under `root`, plus `credentials.json` when
    /// present.
    pub fn from_dir(root: impl AsRef<Path>, resource_prefix: Option<String>) -> Result<Self, WkflwError> {
        let root = root.as_ref();
        let mut workflows: HashMap<String, Vec<StoredWorkflow>> = HashMap::new();

        let mut paths = Vec::new();
        collect_asl_files(root, &mut paths).map_err(|error| WkflwError::Configuration(error.to_string()))?;

        for path in paths {
            let identifier = path_identifier(&path);
            debug!("Loading '{}' as {identifier}", path.display());

            let raw = fs::read_to_string(&path).map_err(|error| WkflwError::Configuration(error.to_string()))?;
            let definition: Value = match serde_json::from_str(&raw) {
                Ok(definition) => definition,
                Err(parse_error) => {
                    error!("Unable to parse {}: {parse_error}", path.display());
                    continue;
                }
            };

            let definition = WorkflowDefinition(definition);
            // The start state's Resource doubles as the trigger-node key for
            // a quick lookup.
            let key = definition
                .start_at()
                .and_then(|start_at| definition.state(start_at).ok())
                .and_then(|state| state.get("Resource"))
                .and_then(Value::as_str);
            let Some(key) = key else {
                error!("Unable to find first State in {} - skipping", path.display());
                continue;
            };

            workflows
                .entry(key.to_string())
                .or_default()
                .push(StoredWorkflow { identifier, definition });
        }

        let credentials = match fs::read_to_string(root.join("credentials.json")) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|error| WkflwError::Configuration(error.to_string()))?,
            Err(_) => Value::Object(serde_json::Map::new()),
        };

        Ok(Self {
            workflows,
            credentials,
            resource_prefix,
        })
    }

    fn build_execution_data(&self, stored: &StoredWorkflow) -> WorkflowExecutionData {
        // Collect the state context before rewriting the Resource values.
        let state_context = self.state_context(&stored.definition);

        let mut definition = stored.definition.clone();
        if let Some(prefix) = &self.resource_prefix
            && let Some(states) = definition.states_mut()
        {
            for state in states.values_mut() {
                if let Some(resource) = state.get("Resource").and_then(Value::as_str) {
                    let rewritten = format!("{prefix} {resource}");
                    state["Resource"] = Value::String(rewritten);
                }
            }
        }

        WorkflowExecutionData {
            workflow_id: stored.identifier.clone(),
            workflow_definition: definition,
            state_context,
        }
    }

    /// Retrieve credentials for each state that names a `Resource`. The node
    /// identifier is the first dotted component of the resource.
    fn state_context(&self, definition: &WorkflowDefinition) -> IndexMap<String, Value> {
        let mut context = IndexMap::new();

        let Some(states) = definition.states() else {
            return context;
        };

        for (state_name, state) in states {
            if let Some(resource) = state.get("Resource").and_then(Value::as_str) {
                let node_id = resource.split('.').next().unwrap_or(resource);
                let credentials = self
                    .credentials
                    .get(node_id)
                    .cloned()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                context.insert(state_name.clone(), credentials);
            }
        }

        context
    }
}

#[async_trait]
impl WorkflowLookup for FileSystemLookup {
    async fn get_workflows(&self, initial_node_id: &str, _event: &Event) -> Result<Vec<WorkflowExecutionData>, WkflwError> {
        let Some(stored) = self.workflows.get(initial_node_id) else {
            return Ok(Vec::new());
        };

        Ok(stored.iter().map(|workflow| self.build_execution_data(workflow)).collect())
    }
}

fn collect_asl_files(directory: &Path, output: &mut Vec<std::path::PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_asl_files(&path, output)?;
        } else if path.extension().is_some_and(|extension| extension == "asl") {
            output.push(path);
        }
    }
    Ok(())
}

fn path_identifier(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_workflow(directory: &Path, name: &str, definition: &Value) {
        fs::write(directory.join(name), serde_json::to_string_pretty(definition).unwrap()).unwrap();
    }

    fn sample_definition() -> Value {
        json!({
            "StartAt": "Receive",
            "States": {
                "Receive": {"Type": "Task", "Resource": "webhook_node.receive", "Next": "Notify"},
                "Notify": {"Type": "Task", "Resource": "slack_node.post", "End": true}
            }
        })
    }

    #[tokio::test]
    async fn finds_workflows_by_trigger_resource() {
        let directory = tempfile::tempdir().unwrap();
        write_workflow(directory.path(), "notify.asl", &sample_definition());

        let lookup = FileSystemLookup::from_dir(directory.path(), None).unwrap();
        let event = Event::new("evt", json!({}));

        let matched = lookup.get_workflows("webhook_node.receive", &event).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].workflow_definition.start_at(), Some("Receive"));

        let unmatched = lookup.get_workflows("unknown.node", &event).await.unwrap();
        assert!(unmatched.is_empty());
    }

    #[tokio::test]
    async fn loads_credentials_into_state_context() {
        let directory = tempfile::tempdir().unwrap();
        write_workflow(directory.path(), "notify.asl", &sample_definition());
        fs::write(
            directory.path().join("credentials.json"),
            json!({"slack_node": {"bot_token": "xoxb-2930"}}).to_string(),
        )
        .unwrap();

        let lookup = FileSystemLookup::from_dir(directory.path(), None).unwrap();
        let event = Event::new("evt", json!({}));
        let matched = lookup.get_workflows("webhook_node.receive", &event).await.unwrap();

        assert_eq!(matched[0].state_context["Notify"], json!({"bot_token": "xoxb-2930"}));
        assert_eq!(matched[0].state_context["Receive"], json!({}));
    }

    #[tokio::test]
    async fn rewrites_resources_with_the_configured_prefix() {
        let directory = tempfile::tempdir().unwrap();
        write_workflow(directory.path(), "notify.asl", &sample_definition());

        let lookup = FileSystemLookup::from_dir(directory.path(), Some("node".to_string())).unwrap();
        let event = Event::new("evt", json!({}));
        let matched = lookup.get_workflows("webhook_node.receive", &event).await.unwrap();

        let state = matched[0].workflow_definition.state("Notify").unwrap();
        assert_eq!(state["Resource"], json!("node slack_node.post"));
    }

    #[tokio::test]
    async fn rewrites_do_not_leak_into_the_cache() {
        let directory = tempfile::tempdir().unwrap();
        write_workflow(directory.path(), "notify.asl", &sample_definition());

        let lookup = FileSystemLookup::from_dir(directory.path(), Some("node".to_string())).unwrap();
        let event = Event::new("evt", json!({}));

        // Two lookups must both see a single prefix application.
        let first = lookup.get_workflows("webhook_node.receive", &event).await.unwrap();
        let second = lookup.get_workflows("webhook_node.receive", &event).await.unwrap();
        assert_eq!(
            first[0].workflow_definition.state("Notify").unwrap()["Resource"],
            second[0].workflow_definition.state("Notify").unwrap()["Resource"],
        );
    }

    #[tokio::test]
    async fn skips_files_without_a_start_resource() {
        let directory = tempfile::tempdir().unwrap();
        write_workflow(directory.path(), "broken.asl", &json!({"StartAt": "Ghost", "States": {}}));

        let lookup = FileSystemLookup::from_dir(directory.path(), None).unwrap();
        assert!(lookup.workflows.is_empty());
    }
}

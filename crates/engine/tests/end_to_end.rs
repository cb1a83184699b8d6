//! End-to-end: filesystem lookup, the execution driver, and the subprocess
//! executor working against real workflow files and real child processes.

use serde_json::{Value, json};
use wkflws_engine::{EngineOptions, FileSystemLookup, ProcessExecutor, initialize_workflows};
use wkflws_types::Event;

fn write_workflow(directory: &std::path::Path, name: &str, definition: &Value) {
    std::fs::write(directory.join(name), serde_json::to_string_pretty(definition).unwrap()).unwrap();
}

/// A three-state workflow: a task whose resource is a real `echo` child,
/// a choice routing on the task's result, and a pass state shaping the
/// final output with an intrinsic call.
fn pricing_workflow() -> Value {
    json!({
        "Comment": "order-pricer",
        "StartAt": "Price",
        "States": {
            "Price": {
                "Type": "Task",
                "Resource": "sh -c 'echo {\\\"total\\\":42}'",
                "ResultPath": "$.pricing",
                "Next": "Route"
            },
            "Route": {
                "Type": "Choice",
                "Choices": [
                    {"Variable": "$.pricing.total", "NumericGreaterThan": 40, "Next": "Flag"}
                ],
                "Default": "Accept"
            },
            "Flag": {
                "Type": "Pass",
                "Result": {"note.$": "States.Format('review order {}', $.order)"},
                "ResultPath": "$.review",
                "End": true
            },
            "Accept": {
                "Type": "Pass",
                "End": true
            }
        }
    })
}

#[tokio::test]
async fn event_flows_through_lookup_driver_and_subprocess() {
    let directory = tempfile::tempdir().unwrap();
    write_workflow(directory.path(), "pricing.asl", &pricing_workflow());

    let lookup = FileSystemLookup::from_dir(directory.path(), None).unwrap();
    let event = Event::new("evt-100", json!({"order": "A-1"}));
    let workflow_input = json!({"order": "A-1"});

    let mut executions = initialize_workflows(&lookup, "sh -c 'echo {\\\"total\\\":42}'", &event, &workflow_input)
        .await
        .unwrap();
    assert_eq!(executions.len(), 1, "one workflow should match the trigger resource");

    let executor = ProcessExecutor::default();
    let output = executions[0]
        .start(&executor, workflow_input, &EngineOptions::default())
        .await
        .unwrap();

    assert_eq!(output["order"], json!("A-1"));
    assert_eq!(output["pricing"], json!({"total": 42}));
    assert_eq!(output["review"], json!({"note": "review order A-1"}));
    assert_eq!(executions[0].execution_id, "evt-100");
    assert_eq!(executions[0].current_state_name.as_deref(), Some("Flag"));
}

#[tokio::test]
async fn unmatched_events_start_nothing() {
    let directory = tempfile::tempdir().unwrap();
    write_workflow(directory.path(), "pricing.asl", &pricing_workflow());

    let lookup = FileSystemLookup::from_dir(directory.path(), None).unwrap();
    let event = Event::new("evt-101", json!({}));

    let executions = initialize_workflows(&lookup, "some.other.node", &event, &json!({}))
        .await
        .unwrap();
    assert!(executions.is_empty());
}

#[tokio::test]
async fn failing_task_feeds_empty_output_into_the_next_state() {
    let directory = tempfile::tempdir().unwrap();
    write_workflow(
        directory.path(),
        "broken.asl",
        &json!({
            "StartAt": "Boom",
            "States": {
                "Boom": {
                    "Type": "Task",
                    "Resource": "sh -c 'exit 7'",
                    "ResultPath": "$.result",
                    "End": true
                }
            }
        }),
    );

    let lookup = FileSystemLookup::from_dir(directory.path(), None).unwrap();
    let event = Event::new("evt-102", json!({}));
    let mut executions = initialize_workflows(&lookup, "sh -c 'exit 7'", &event, &json!({"keep": 1}))
        .await
        .unwrap();

    let executor = ProcessExecutor::default();
    let output = executions[0]
        .start(&executor, json!({"keep": 1}), &EngineOptions::default())
        .await
        .unwrap();

    assert_eq!(output, json!({"keep": 1, "result": {}}));
}

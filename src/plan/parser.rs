//! Flow Plan Parser
//!
//! Walks a flow plan from its start state along `Next` pointers and turns
//! each state into a typed [`PlanStep`], resolving lookup fields against the
//! flow input document as it goes.
//!
//! Traversal refuses to revisit a state, so parsing always terminates.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_json::{Map, Value};

use super::model::{
    ActionKind, ComputeStep, FlowPlan, PlanStep, State, Task, TransferItem, TransferStep,
};
use super::resolver::{resolve_field, FieldValue};
use crate::error::{ProvError, Result};

/// Default marker identifying provenance-capture transfer states by name.
pub const DEFAULT_PROVENANCE_MARKER: &str = "provenance";

/// Options controlling how states are emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    /// Transfer states whose name contains this marker are traversed but
    /// not emitted. `None` emits every transfer.
    pub provenance_marker: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            provenance_marker: Some(DEFAULT_PROVENANCE_MARKER.to_string()),
        }
    }
}

impl ParseOptions {
    fn is_provenance_capture(&self, state_name: &str) -> bool {
        self.provenance_marker
            .as_deref()
            .is_some_and(|marker| state_name.contains(marker))
    }
}

/// Loads a flow plan from a JSON file.
pub fn load_plan(path: impl AsRef<Path>) -> Result<FlowPlan> {
    let path = path.as_ref();
    info!("Loading flow plan from: {}", path.display());

    let content = fs::read_to_string(path)?;
    let plan: FlowPlan = serde_json::from_str(&content)?;

    info!("Parsed flow plan with {} states", plan.len());
    Ok(plan)
}

/// Loads a flow input document from a JSON file.
pub fn load_input(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    info!("Loading flow input from: {}", path.display());

    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Parses a plan into compute and transfer steps, each list in traversal
/// order.
pub fn parse_states(plan: &FlowPlan, input: &Value) -> Result<(Vec<ComputeStep>, Vec<TransferStep>)> {
    let steps = parse_sequence(plan, input, &ParseOptions::default())?;

    let mut compute_steps = Vec::new();
    let mut transfer_steps = Vec::new();
    for step in steps {
        match step {
            PlanStep::Compute(c) => compute_steps.push(c),
            PlanStep::Transfer(t) => transfer_steps.push(t),
        }
    }

    Ok((compute_steps, transfer_steps))
}

/// Parses a plan into a single list of steps in traversal order.
pub fn parse_sequence(plan: &FlowPlan, input: &Value, options: &ParseOptions) -> Result<Vec<PlanStep>> {
    let mut steps = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut position = 0;

    let mut name = plan.start_at.as_str();
    let mut state = plan.get_state(name).ok_or_else(|| ProvError::UnknownState {
        state: name.to_string(),
        referenced_by: "StartAt".to_string(),
    })?;
    seen.insert(name);

    loop {
        let kind = state.kind().ok_or_else(|| ProvError::UnknownActionType {
            state: name.to_string(),
            action: state.action_url.clone(),
        })?;

        match kind {
            ActionKind::Transfer if options.is_provenance_capture(name) => {
                debug!("Skipping provenance capture transfer '{}'", name);
            }
            ActionKind::Transfer => {
                steps.push(PlanStep::Transfer(parse_transfer(name, state, input)?));
            }
            ActionKind::Compute => {
                steps.push(PlanStep::Compute(parse_compute(name, state, input, position)?));
                position += 1;
            }
        }

        if state.is_terminal() {
            break;
        }

        // is_terminal() guarantees next is set here
        let Some(next) = state.next.as_deref() else {
            break;
        };
        if !seen.insert(next) {
            return Err(ProvError::CycleDetected {
                state: next.to_string(),
            });
        }
        state = plan.get_state(next).ok_or_else(|| ProvError::UnknownState {
            state: next.to_string(),
            referenced_by: name.to_string(),
        })?;
        name = next;
    }

    info!(
        "Parsed {} steps ({} compute) from {} states",
        steps.len(),
        position,
        plan.len()
    );
    Ok(steps)
}

/// Parses one compute state.
pub fn parse_compute(name: &str, state: &State, input: &Value, position: usize) -> Result<ComputeStep> {
    let tasks = field_list(name, &state.parameters, "tasks", input)?
        .iter()
        .map(|task| {
            let fields = as_fields(name, "tasks", task)?;
            Ok(Task {
                endpoint: resolve(name, fields, "endpoint", input)?,
                function: resolve(name, fields, "function", input)?,
                payload: resolve(name, fields, "payload", input)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Compute state '{}' at position {} with {} tasks", name, position, tasks.len());

    Ok(ComputeStep {
        name: name.to_string(),
        comment: state.comment.clone(),
        tasks,
        result_path: state.result_path.clone(),
        position,
    })
}

/// Parses one transfer state.
pub fn parse_transfer(name: &str, state: &State, input: &Value) -> Result<TransferStep> {
    let params = &state.parameters;
    let source_endpoint = resolve(name, params, "source_endpoint", input)?;
    let destination_endpoint = resolve(name, params, "destination_endpoint", input)?;

    let items = field_list(name, params, "transfer_items", input)?
        .iter()
        .map(|item| {
            let fields = as_fields(name, "transfer_items", item)?;
            Ok(TransferItem {
                source_path: resolve(name, fields, "source_path", input)?,
                destination_path: resolve(name, fields, "destination_path", input)?,
                recursive: resolve(name, fields, "recursive", input)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Transfer state '{}' with {} items", name, items.len());

    Ok(TransferStep {
        name: name.to_string(),
        source_endpoint,
        destination_endpoint,
        items,
    })
}

/// Resolves a field of one state, naming the state in malformed-field errors.
fn resolve(state: &str, fields: &Map<String, Value>, key: &str, input: &Value) -> Result<FieldValue> {
    resolve_field(fields, key, input).map_err(|err| match err {
        ProvError::MalformedState { state: unnamed, message } if unnamed.is_empty() => {
            ProvError::MalformedState {
                state: state.to_string(),
                message,
            }
        }
        other => other,
    })
}

/// Resolves a field that must hold a list (tasks, transfer items).
fn field_list(state: &str, fields: &Map<String, Value>, key: &str, input: &Value) -> Result<Vec<Value>> {
    match resolve(state, fields, key, input)? {
        FieldValue::Literal(Value::Array(items)) | FieldValue::Indirect { value: Value::Array(items), .. } => {
            Ok(items)
        }
        other => Err(ProvError::MalformedState {
            state: state.to_string(),
            message: format!("'{}' must be a list, found {}", key, other.value()),
        }),
    }
}

fn as_fields<'a>(state: &str, key: &str, value: &'a Value) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| ProvError::MalformedState {
        state: state.to_string(),
        message: format!("entries of '{}' must be objects", key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::model::{COMPUTE_ACTION_URL, TRANSFER_ACTION_URL};
    use serde_json::json;

    const PLAN: &str = include_str!("../../fixtures/globus_prov/plan.json");
    const INPUT: &str = include_str!("../../fixtures/globus_prov/input.json");

    fn fixture() -> (FlowPlan, Value) {
        (
            serde_json::from_str(PLAN).unwrap(),
            serde_json::from_str(INPUT).unwrap(),
        )
    }

    fn compute(next: Option<&str>) -> State {
        let state = State::new(COMPUTE_ACTION_URL).with_parameter(
            "tasks",
            json!([{"endpoint": "ep", "function": "fn", "payload": {}}]),
        );
        match next {
            Some(n) => state.then(n),
            None => state.terminal(),
        }
    }

    #[test]
    fn test_parse_full_plan() {
        let (plan, input) = fixture();
        let (compute_steps, transfer_steps) = parse_states(&plan, &input).unwrap();

        assert_eq!(compute_steps.len(), 2);
        assert_eq!(transfer_steps.len(), 3);
        assert_eq!(compute_steps[0].name, "RevTxt");
        assert_eq!(compute_steps[1].name, "SortTxt");
    }

    #[test]
    fn test_positions_follow_traversal() {
        let (plan, input) = fixture();
        let (compute_steps, _) = parse_states(&plan, &input).unwrap();

        let positions: Vec<_> = compute_steps.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_parse_compute_state() {
        let (_, input) = fixture();
        let state: State = serde_json::from_value(json!({
            "Comment": null,
            "Type": "Action",
            "ActionUrl": "https://compute.actions.globus.org",
            "Parameters": {
                "tasks": [{
                    "endpoint.$": "$.input.compute_endpoint",
                    "function.$": "$.input.rev_txt_function_id",
                    "payload.$": "$.input.RevTxt"
                }]
            },
            "ResultPath": "$.RevTxt",
            "WaitTime": 300,
            "Next": "Transfer_provenance_rev_txt"
        }))
        .unwrap();

        let c = parse_compute("RevTxt", &state, &input, 0).unwrap();
        assert_eq!(c.name, "RevTxt");
        assert!(c.comment.is_none());
        assert_eq!(c.result_path.as_deref(), Some("$.RevTxt"));
        assert_eq!(c.tasks.len(), 1);

        let t = &c.tasks[0];
        assert_eq!(
            t.endpoint,
            FieldValue::Indirect {
                path: "$.input.compute_endpoint".to_string(),
                value: json!("58fb6f2d-ff78-4f39-9669-38c12d01f566"),
            }
        );
        assert_eq!(t.function.as_str(), Some("60232236-4b25-4a92-84a2-0b8e30feaaa7"));
        assert_eq!(
            t.payload.value(),
            &json!({
                "input_file": "/rev_text/input/test.txt",
                "output_file": "/rev_text/output/test.txt"
            })
        );
    }

    #[test]
    fn test_parse_transfer_state() {
        let (_, input) = fixture();
        let state: State = serde_json::from_value(json!({
            "Comment": "Transfer a file or directory in Globus",
            "Type": "Action",
            "ActionUrl": "https://actions.automate.globus.org/transfer/transfer",
            "Parameters": {
                "source_endpoint.$": "$.input.to_compute_transfer_source_endpoint_id",
                "destination_endpoint.$": "$.input.to_compute_transfer_destination_endpoint_id",
                "transfer_items": [{
                    "source_path.$": "$.input.to_compute_transfer_source_path",
                    "destination_path.$": "$.input.to_compute_transfer_destination_path",
                    "recursive.$": "$.input.to_compute_transfer_recursive"
                }]
            },
            "ResultPath": "$.Transfer",
            "Next": "RevTxt"
        }))
        .unwrap();

        let t = parse_transfer("Transfer", &state, &input).unwrap();
        assert_eq!(t.source_endpoint.as_str(), Some("b782400e-3e59-412c-8f73-56cd0782301f"));
        assert_eq!(t.destination_endpoint.as_str(), Some("8ee44381-114a-45de-b8f8-d105a90c200d"));
        assert_eq!(t.items.len(), 1);
        assert_eq!(t.items[0].source_path.as_str(), Some("/input/test.txt"));
        assert_eq!(t.items[0].destination_path.as_str(), Some("/rev_text/input/test.txt"));
        assert_eq!(t.items[0].recursive.value(), &json!(false));
    }

    #[test]
    fn test_provenance_transfer_uses_expressions() {
        let (plan, input) = fixture();
        let state = plan.get_state("Transfer_provenance_rev_txt").unwrap();
        let err = parse_transfer("Transfer_provenance_rev_txt", state, &input).unwrap_err();
        assert!(matches!(err, ProvError::UnsupportedExpressionForm { .. }));
    }

    #[test]
    fn test_provenance_marker_disabled() {
        let (plan, input) = fixture();
        let options = ParseOptions { provenance_marker: None };
        let err = parse_sequence(&plan, &input, &options).unwrap_err();
        assert!(matches!(err, ProvError::UnsupportedExpressionForm { .. }));
    }

    #[test]
    fn test_sequence_interleaves_kinds() {
        let (plan, input) = fixture();
        let steps = parse_sequence(&plan, &input, &ParseOptions::default()).unwrap();
        let names: Vec<_> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["Transfer", "RevTxt", "RevTxtSortTxtTransfer", "SortTxt", "TransferOut"]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let plan = FlowPlan::new("a")
            .with_state("a", compute(Some("b")))
            .with_state("b", compute(Some("a")));

        let err = parse_states(&plan, &json!({})).unwrap_err();
        assert!(matches!(err, ProvError::CycleDetected { state } if state == "a"));
    }

    #[test]
    fn test_self_loop_detected() {
        let plan = FlowPlan::new("a").with_state("a", compute(Some("a")));
        let err = parse_states(&plan, &json!({})).unwrap_err();
        assert!(matches!(err, ProvError::CycleDetected { .. }));
    }

    #[test]
    fn test_unknown_next_state() {
        let plan = FlowPlan::new("a").with_state("a", compute(Some("missing")));
        let err = parse_states(&plan, &json!({})).unwrap_err();
        assert!(matches!(
            err,
            ProvError::UnknownState { state, referenced_by } if state == "missing" && referenced_by == "a"
        ));
    }

    #[test]
    fn test_unknown_start_state() {
        let plan = FlowPlan::new("nowhere").with_state("a", compute(None));
        let err = parse_states(&plan, &json!({})).unwrap_err();
        assert!(matches!(err, ProvError::UnknownState { .. }));
    }

    #[test]
    fn test_unknown_action_type() {
        let plan = FlowPlan::new("a").with_state("a", State::new("https://example.org/other").terminal());
        let err = parse_states(&plan, &json!({})).unwrap_err();
        assert!(matches!(err, ProvError::UnknownActionType { action, .. } if action == "https://example.org/other"));
    }

    #[test]
    fn test_end_flag_stops_traversal() {
        let mut first = compute(Some("missing"));
        first.end = Some(true);
        let plan = FlowPlan::new("a").with_state("a", first);

        let (compute_steps, _) = parse_states(&plan, &json!({})).unwrap();
        assert_eq!(compute_steps.len(), 1);
    }

    #[test]
    fn test_tasks_must_be_list() {
        let state = State::new(COMPUTE_ACTION_URL)
            .with_parameter("tasks", json!("not a list"))
            .terminal();
        let plan = FlowPlan::new("a").with_state("a", state);
        let err = parse_states(&plan, &json!({})).unwrap_err();
        assert!(matches!(err, ProvError::MalformedState { .. }));
    }

    #[test]
    fn test_non_string_lookup_names_state() {
        let state = State::new(TRANSFER_ACTION_URL)
            .with_parameter("source_endpoint.$", json!(["not", "a", "path"]))
            .with_parameter("destination_endpoint", json!("dst"))
            .with_parameter("transfer_items", json!([]))
            .terminal();
        let plan = FlowPlan::new("move").with_state("move", state);
        let err = parse_states(&plan, &json!({})).unwrap_err();
        match err {
            ProvError::MalformedState { state, message } => {
                assert_eq!(state, "move");
                assert!(message.contains("'source_endpoint.$'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transfer_items_from_lookup() {
        let state = State::new(TRANSFER_ACTION_URL)
            .with_parameter("source_endpoint", json!("src"))
            .with_parameter("destination_endpoint", json!("dst"))
            .with_parameter("transfer_items.$", json!("$.input.items"))
            .terminal();
        let plan = FlowPlan::new("move").with_state("move", state);
        let input = json!({"input": {"items": [
            {"source_path": "/a", "destination_path": "/b", "recursive": false}
        ]}});

        let (_, transfers) = parse_states(&plan, &input).unwrap();
        assert_eq!(transfers[0].items[0].destination_path.as_str(), Some("/b"));
    }

    #[test]
    fn test_load_plan_and_input() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let plan_path = temp_dir.path().join("plan.json");
        let input_path = temp_dir.path().join("input.json");
        std::fs::write(&plan_path, PLAN).unwrap();
        std::fs::write(&input_path, INPUT).unwrap();

        let plan = load_plan(&plan_path).unwrap();
        let input = load_input(&input_path).unwrap();
        assert_eq!(plan.start_at, "Transfer");
        assert!(input["input"].is_object());
    }

    #[test]
    fn test_load_plan_file_not_found() {
        assert!(matches!(load_plan("/nonexistent/plan.json"), Err(ProvError::Io(_))));
    }

    #[test]
    fn test_load_plan_invalid_json() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_plan(&path), Err(ProvError::Json(_))));
    }
}

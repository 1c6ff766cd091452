//! Flow Plan Data Model
//!
//! Raw flow plan documents and the typed step records parsed from them.
//!
//! # Example JSON Format
//!
//! ```json
//! {
//!   "StartAt": "RevTxt",
//!   "States": {
//!     "RevTxt": {
//!       "Type": "Action",
//!       "ActionUrl": "https://compute.actions.globus.org",
//!       "Parameters": {
//!         "tasks": [{
//!           "endpoint.$": "$.input.compute_endpoint",
//!           "function.$": "$.input.rev_txt_function_id",
//!           "payload.$": "$.input.RevTxt"
//!         }]
//!       },
//!       "ResultPath": "$.RevTxt",
//!       "End": true
//!     }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::resolver::FieldValue;

/// Action URL of compute states.
pub const COMPUTE_ACTION_URL: &str = "https://compute.actions.globus.org";

/// Action URL written for generated transfer states.
pub const TRANSFER_ACTION_URL: &str = "https://transfer.actions.globus.org/transfer/";

/// Every action URL recognised as a transfer.
pub const TRANSFER_ACTION_URLS: &[&str] = &[
    TRANSFER_ACTION_URL,
    "https://actions.automate.globus.org/transfer/transfer",
];

/// The two kinds of state a flow plan may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Compute,
    Transfer,
}

impl ActionKind {
    /// Classifies an action URL, returning `None` for anything unknown.
    pub fn classify(action_url: &str) -> Option<Self> {
        if action_url == COMPUTE_ACTION_URL {
            Some(Self::Compute)
        } else if TRANSFER_ACTION_URLS.contains(&action_url) {
            Some(Self::Transfer)
        } else {
            None
        }
    }
}

/// A complete flow plan: named states chained by `Next`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlowPlan {
    /// Free-text description of the flow
    #[serde(rename = "Comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Name of the first state to run
    #[serde(rename = "StartAt", alias = "startState")]
    pub start_at: String,

    /// All states, keyed by name
    #[serde(rename = "States", alias = "states")]
    pub states: IndexMap<String, State>,
}

impl FlowPlan {
    /// Creates a plan with no states.
    pub fn new(start_at: impl Into<String>) -> Self {
        Self {
            comment: None,
            start_at: start_at.into(),
            states: IndexMap::new(),
        }
    }

    /// Adds a state, replacing any existing state of the same name.
    pub fn with_state(mut self, name: impl Into<String>, state: State) -> Self {
        self.states.insert(name.into(), state);
        self
    }

    /// Gets a state by name.
    pub fn get_state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// Returns the number of states in the plan.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if the plan has no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn default_state_type() -> String {
    "Action".to_string()
}

/// One raw state of a flow plan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct State {
    #[serde(rename = "Comment", default)]
    pub comment: Option<String>,

    #[serde(rename = "Type", default = "default_state_type")]
    pub state_type: String,

    /// Identifies what the state does (compute or transfer)
    #[serde(rename = "ActionUrl", alias = "actionId")]
    pub action_url: String,

    /// Raw fields, which may use literal, lookup or expression forms
    #[serde(rename = "Parameters", alias = "parameters", default)]
    pub parameters: Map<String, Value>,

    #[serde(
        rename = "ResultPath",
        alias = "resultPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub result_path: Option<String>,

    #[serde(rename = "Next", alias = "next", default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(rename = "End", alias = "end", default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,

    /// Any other keys (WaitTime, ExceptionOnActionFailure, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl State {
    /// Creates a state for the given action URL with no parameters.
    pub fn new(action_url: impl Into<String>) -> Self {
        Self {
            comment: None,
            state_type: default_state_type(),
            action_url: action_url.into(),
            parameters: Map::new(),
            result_path: None,
            next: None,
            end: None,
            extra: Map::new(),
        }
    }

    /// Sets a raw parameter field.
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Sets the result path.
    pub fn with_result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = Some(path.into());
        self
    }

    /// Sets the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Chains this state to the next one.
    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self.end = None;
        self
    }

    /// Marks this state as terminal.
    pub fn terminal(mut self) -> Self {
        self.next = None;
        self.end = Some(true);
        self
    }

    /// True when traversal stops after this state.
    pub fn is_terminal(&self) -> bool {
        self.next.is_none() || self.end.unwrap_or(false)
    }

    /// Classifies this state's action.
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::classify(&self.action_url)
    }
}

/// A compute task inside a compute state.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub endpoint: FieldValue,
    pub function: FieldValue,
    pub payload: FieldValue,
}

/// A single file or directory moved by a transfer state.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransferItem {
    pub source_path: FieldValue,
    pub destination_path: FieldValue,
    pub recursive: FieldValue,
}

/// A parsed compute state.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ComputeStep {
    /// State name in the flow plan
    pub name: String,
    pub comment: Option<String>,
    pub tasks: Vec<Task>,
    pub result_path: Option<String>,
    /// 0-based position among compute steps in traversal order
    pub position: usize,
}

/// A parsed transfer state.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransferStep {
    /// State name in the flow plan
    pub name: String,
    pub source_endpoint: FieldValue,
    pub destination_endpoint: FieldValue,
    pub items: Vec<TransferItem>,
}

/// A parsed step of either kind.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanStep {
    Compute(ComputeStep),
    Transfer(TransferStep),
}

impl PlanStep {
    /// State name of the step.
    pub fn name(&self) -> &str {
        match self {
            Self::Compute(step) => &step.name,
            Self::Transfer(step) => &step.name,
        }
    }
}

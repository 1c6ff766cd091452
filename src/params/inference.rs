//! Transfer Inference
//!
//! Detects where a file parameter produced on one endpoint is consumed on
//! another and synthesizes the transfer steps nobody declared:
//! - Peer-to-peer: producer endpoint to consumer endpoint
//! - Inbound: orchestration endpoint to a consumer with no producer
//! - Outbound: producer with no consumer back to the orchestration endpoint
//!
//! The inferred transfers are then woven into the flow's step sequence.

use std::fmt;

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;

use super::tool::{FileUsage, HasFileParameters, Tool};
use crate::config::{InboundSourcePath, ProducerPolicy, ProvConfig};
use crate::error::{ProvError, Result};
use crate::plan::model::{FlowPlan, State, COMPUTE_ACTION_URL, TRANSFER_ACTION_URL};

/// Sync level of every generated transfer.
pub const SYNC_LEVEL: &str = "checksum";

/// Prefix of generated transfer state names.
const TRANSFER_STATE_PREFIX: &str = "Transfer";

/// Direction of an inferred transfer relative to the orchestrator.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    PeerToPeer,
    Inbound,
    Outbound,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PeerToPeer => "peer-to-peer",
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        };
        write!(f, "{}", label)
    }
}

/// A transfer synthesized by inference.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AutoTransfer {
    /// Deterministic alias, e.g. `_auto_FP_d_FuncB_FuncC`
    pub alias: String,
    pub kind: TransferKind,
    /// Formal parameter being moved
    pub parameter: String,
    pub source_endpoint: String,
    pub source_path: String,
    pub destination_endpoint: String,
    pub destination_path: String,
    pub recursive: bool,
    pub sync_level: String,
}

impl AutoTransfer {
    /// Name of the state this transfer becomes in a flow plan.
    pub fn state_name(&self) -> String {
        format!("{}{}", TRANSFER_STATE_PREFIX, self.alias)
    }

    fn to_state(&self) -> State {
        State::new(TRANSFER_ACTION_URL)
            .with_comment(format!("Auto {} transfer of '{}'", self.kind, self.parameter))
            .with_parameter("source_endpoint", json!(self.source_endpoint))
            .with_parameter("destination_endpoint", json!(self.destination_endpoint))
            .with_parameter(
                "transfer_items",
                json!([{
                    "source_path": self.source_path,
                    "destination_path": self.destination_path,
                    "recursive": self.recursive,
                }]),
            )
            .with_parameter("sync_level", json!(self.sync_level))
            .with_result_path(format!("$.{}", self.state_name()))
    }
}

/// Builds an auto transfer from its two located ends.
fn auto_transfer(
    kind: TransferKind,
    parameter: &str,
    alias: String,
    source: (&str, &str),
    destination: (&str, &str),
) -> AutoTransfer {
    debug!(
        "Inferred {} transfer '{}': {}:{} -> {}:{}",
        kind, alias, source.0, source.1, destination.0, destination.1
    );
    AutoTransfer {
        alias,
        kind,
        parameter: parameter.to_string(),
        source_endpoint: source.0.to_string(),
        source_path: source.1.to_string(),
        destination_endpoint: destination.0.to_string(),
        destination_path: destination.1.to_string(),
        recursive: false,
        sync_level: SYNC_LEVEL.to_string(),
    }
}

/// Inferred transfers, grouped by the tool they run before.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TransferPlan {
    /// Inbound and peer-to-peer transfers, keyed by consumer tool name
    pub by_tool: IndexMap<String, Vec<AutoTransfer>>,
    /// Outbound transfers, run after every tool
    pub trailing: Vec<AutoTransfer>,
}

impl TransferPlan {
    /// Transfers that must run before the given tool.
    pub fn for_tool(&self, tool: &str) -> &[AutoTransfer] {
        self.by_tool.get(tool).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All transfers, grouped ones first.
    pub fn iter(&self) -> impl Iterator<Item = &AutoTransfer> {
        self.by_tool.values().flatten().chain(self.trailing.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Infers every missing transfer between the provenance tools of a flow.
pub fn infer_transfers(tools: &[Tool], config: &ProvConfig) -> Result<TransferPlan> {
    let mut inputs: IndexMap<String, Vec<FileUsage>> = IndexMap::new();
    let mut outputs: IndexMap<String, FileUsage> = IndexMap::new();

    for step in tools.iter().filter_map(Tool::as_provenance) {
        for usage in step.file_inputs() {
            inputs.entry(usage.parameter.clone()).or_default().push(usage);
        }
        for usage in step.file_outputs() {
            if let Some(existing) = outputs.get(&usage.parameter) {
                match config.producer_policy {
                    ProducerPolicy::Reject => {
                        return Err(ProvError::MultipleProducers {
                            parameter: usage.parameter.clone(),
                            first: existing.function.clone(),
                            second: usage.function.clone(),
                        });
                    }
                    ProducerPolicy::LastWriterWins => {
                        warn!(
                            "Parameter '{}' produced by '{}' replaces producer '{}'",
                            usage.parameter, usage.function, existing.function
                        );
                    }
                }
            }
            outputs.insert(usage.parameter.clone(), usage);
        }
    }

    let orchestrator = config.orchestration_endpoint_id.as_str();
    let mut plan = TransferPlan::default();

    for (parameter, uses) in &inputs {
        for consumer in uses {
            let destination = (consumer.endpoint.as_str(), consumer.localized_path.as_str());
            let transfer = match outputs.get(parameter) {
                Some(producer) => auto_transfer(
                    TransferKind::PeerToPeer,
                    parameter,
                    format!("_auto_FP_{}_{}_{}", parameter, producer.function, consumer.function),
                    (producer.endpoint.as_str(), producer.localized_path.as_str()),
                    destination,
                ),
                None => {
                    let source_path = match config.inbound_source {
                        InboundSourcePath::Declared => consumer.declared_path.as_str(),
                        InboundSourcePath::Localized => consumer.localized_path.as_str(),
                    };
                    auto_transfer(
                        TransferKind::Inbound,
                        parameter,
                        format!("_auto_FP_{}_in_{}", parameter, consumer.function),
                        (orchestrator, source_path),
                        destination,
                    )
                }
            };
            plan.by_tool.entry(consumer.tool.clone()).or_default().push(transfer);
        }
    }

    for (parameter, producer) in &outputs {
        if inputs.contains_key(parameter) {
            continue;
        }
        plan.trailing.push(auto_transfer(
            TransferKind::Outbound,
            parameter,
            format!("_auto_FP_{}_{}_out", parameter, producer.function),
            (producer.endpoint.as_str(), producer.localized_path.as_str()),
            (orchestrator, producer.declared_path.as_str()),
        ));
    }

    let touches_orchestrator = plan
        .iter()
        .any(|t| t.kind != TransferKind::PeerToPeer);
    if touches_orchestrator && orchestrator.is_empty() {
        warn!("Inbound or outbound transfers inferred but no orchestration endpoint is configured");
    }

    info!(
        "Inferred {} transfers ({} outbound)",
        plan.len(),
        plan.trailing.len()
    );

    Ok(plan)
}

/// One entry of an augmented step sequence.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceEntry {
    Transfer(AutoTransfer),
    Compute {
        tool: String,
        function: String,
    },
    /// Ships a function's provenance record to the orchestrator
    ProvenanceCapture {
        function: String,
        source_endpoint: String,
    },
}

impl SequenceEntry {
    /// Name of the state this entry becomes in a flow plan.
    pub fn state_name(&self) -> String {
        match self {
            Self::Transfer(transfer) => transfer.state_name(),
            Self::Compute { function, .. } => function.clone(),
            Self::ProvenanceCapture { function, .. } => {
                format!("{}_provenance_{}", TRANSFER_STATE_PREFIX, function)
            }
        }
    }

    fn to_state(&self, config: &ProvConfig) -> State {
        match self {
            Self::Transfer(transfer) => transfer.to_state(),
            Self::Compute { tool, function } => State::new(COMPUTE_ACTION_URL)
                .with_comment(format!("{} from {}", function, tool))
                .with_parameter(
                    "tasks",
                    json!([{
                        "endpoint.$": "$.input.compute_endpoint",
                        "function.$": format!("$.input.{}_function_id", function),
                        "payload.$": format!("$.input.{}", function),
                    }]),
                )
                .with_result_path(format!("$.{}", function)),
            Self::ProvenanceCapture {
                function,
                source_endpoint,
            } => {
                let task_id = format!("`$.{}.details.results[0].task_id`", function);
                State::new(TRANSFER_ACTION_URL)
                    .with_comment(format!("Ship the provenance record of {}", function))
                    .with_parameter("source_endpoint", json!(source_endpoint))
                    .with_parameter(
                        "destination_endpoint",
                        json!(config.orchestration_endpoint_id),
                    )
                    .with_parameter(
                        "transfer_items",
                        json!([{
                            "source_path.=": format!("{} + '.crate'", task_id),
                            "destination_path.=": format!(
                                "`$.input._provenance_crate_destination_directory` + '/' + {}",
                                task_id
                            ),
                            "recursive": true,
                        }]),
                    )
                    .with_result_path(format!("$.{}", self.state_name()))
            }
        }
    }
}

/// The complete ordered step sequence of a flow.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct FlowSequence {
    pub entries: Vec<SequenceEntry>,
}

impl FlowSequence {
    pub fn state_names(&self) -> Vec<String> {
        self.entries.iter().map(SequenceEntry::state_name).collect()
    }

    /// Compute entries in order, as `(tool, function)` pairs.
    pub fn compute_steps(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                SequenceEntry::Compute { tool, function } => Some((tool.as_str(), function.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Renders the sequence as a flow plan, chaining states in order.
    ///
    /// An empty sequence yields a plan with no states.
    pub fn to_flow_plan(&self, config: &ProvConfig) -> FlowPlan {
        let names = self.state_names();
        let mut plan = FlowPlan::new(names.first().cloned().unwrap_or_default());
        plan.comment = Some(format!("Flow for {}", config.workflow_id));

        for (i, entry) in self.entries.iter().enumerate() {
            let state = entry.to_state(config);
            let state = match names.get(i + 1) {
                Some(next) => state.then(next.clone()),
                None => state.terminal(),
            };
            plan.states.insert(names[i].clone(), state);
        }

        plan
    }
}

/// Weaves inferred transfers into the step sequence: for each tool, its
/// inbound and peer-to-peer transfers, then each function followed by its
/// provenance capture; outbound transfers close the sequence.
///
/// Opaque tools declare no storage endpoint to capture a provenance
/// record from, so their functions are followed by no capture entry.
pub fn augmented_sequence(tools: &[Tool], plan: &TransferPlan) -> FlowSequence {
    let mut entries = Vec::new();

    for tool in tools {
        entries.extend(plan.for_tool(tool.name()).iter().cloned().map(SequenceEntry::Transfer));

        for function in tool.function_names() {
            entries.push(SequenceEntry::Compute {
                tool: tool.name().to_string(),
                function: function.to_string(),
            });
            if let Some(step) = tool.as_provenance() {
                entries.push(SequenceEntry::ProvenanceCapture {
                    function: function.to_string(),
                    source_endpoint: step.storage_endpoint_id.clone(),
                });
            }
        }
    }

    entries.extend(plan.trailing.iter().cloned().map(SequenceEntry::Transfer));

    debug!("Augmented sequence has {} entries", entries.len());
    FlowSequence { entries }
}

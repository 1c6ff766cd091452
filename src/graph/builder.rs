//! Provenance Graph Builder
//!
//! Builds the prospective provenance graph of a flow, either from a
//! parsed flow plan or from a parameter registry. Both entry points
//! first collect a draft (the workflow plus one entry per compute step,
//! each with its parameters and incoming connections) and then emit the
//! draft as graph nodes in a fixed order, so identical inputs always
//! produce identical documents.

use indexmap::IndexMap;
use log::{debug, info};
use serde_json::Value;

use super::model::{GraphDocument, GraphNode, PropertyValue};
use crate::config::{ProducerPolicy, ProvConfig};
use crate::error::{ProvError, Result};
use crate::params::inference::{augmented_sequence, infer_transfers};
use crate::params::registry::{ParameterRegistry, ParameterSummary};
use crate::plan::model::{FlowPlan, PlanStep, TransferStep};
use crate::plan::parser::parse_sequence;
use crate::plan::resolver::FieldValue;

/// Id of the metadata descriptor node.
pub const METADATA_ID: &str = "ro-crate-metadata.json";

/// Id of the root dataset node.
pub const ROOT_ID: &str = "./";

/// Specification the metadata descriptor conforms to.
pub const CRATE_SPEC: &str = "https://w3id.org/ro/crate/1.1";

/// Types of the workflow node.
pub const WORKFLOW_TYPES: &[&str] = &["File", "SoftwareSourceCode", "ComputationalWorkflow", "HowTo"];

/// Name of the orchestrator side in parameter names.
const MAIN: &str = "main";

#[derive(Debug, Clone, PartialEq)]
struct ParamRecord {
    name: String,
    additional_type: String,
    format: Option<String>,
}

impl ParamRecord {
    fn file(name: String) -> Self {
        Self {
            name,
            additional_type: "File".to_string(),
            format: None,
        }
    }

    fn from_summary(name: String, summary: &ParameterSummary) -> Self {
        let additional_type = if summary.type_name == "file" {
            "File".to_string()
        } else {
            summary.type_name.clone()
        };
        Self {
            name,
            additional_type,
            format: summary.format.clone(),
        }
    }
}

/// The workflow itself or one compute step, with its parameters.
#[derive(Debug, Default)]
struct Owner {
    description: Option<String>,
    inputs: Vec<ParamRecord>,
    outputs: Vec<ParamRecord>,
    /// (source parameter, target parameter) pairs ending here
    connections: Vec<(String, String)>,
}

impl Owner {
    fn add_input(&mut self, param: ParamRecord) {
        if !self.inputs.iter().any(|p| p.name == param.name) {
            self.inputs.push(param);
        }
    }

    fn add_output(&mut self, param: ParamRecord) {
        if !self.outputs.iter().any(|p| p.name == param.name) {
            self.outputs.push(param);
        }
    }

    fn connect(&mut self, source: &str, target: &str) {
        let pair = (source.to_string(), target.to_string());
        if !self.connections.contains(&pair) {
            self.connections.push(pair);
        }
    }
}

#[derive(Debug, Default)]
struct Draft {
    main: Owner,
    /// Compute steps in position order
    steps: IndexMap<String, Owner>,
}

impl Draft {
    fn owner(&mut self, side: &Side) -> &mut Owner {
        match side {
            Side::Orchestrator => &mut self.main,
            Side::Step(name) => self.steps.entry(name.clone()).or_default(),
        }
    }
}

/// Which part of the flow one end of a transfer belongs to.
#[derive(Debug, Clone, PartialEq)]
enum Side {
    Orchestrator,
    Step(String),
}

impl Side {
    fn parameter_name(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        match self {
            Self::Orchestrator => format!("{}/{}", MAIN, path),
            Self::Step(step) => format!("{}/{}", step, path),
        }
    }
}

fn attribute(
    transfer: &TransferStep,
    endpoint: &FieldValue,
    compute: Option<&str>,
    side: &str,
    config: &ProvConfig,
) -> Result<Side> {
    if endpoint.to_text() == config.orchestration_endpoint_id {
        return Ok(Side::Orchestrator);
    }
    compute
        .map(|name| Side::Step(name.to_string()))
        .ok_or_else(|| ProvError::UnattributedTransfer {
            state: transfer.name.clone(),
            side: side.to_string(),
        })
}

/// Builds the graph of a flow plan, resolving lookups against `input`.
///
/// A transfer's source belongs to the orchestrator when its endpoint is
/// the orchestration endpoint, otherwise to the most recent compute step;
/// its destination belongs to the orchestrator or the next compute step.
pub fn build_from_plan(plan: &FlowPlan, input: &Value, config: &ProvConfig) -> Result<GraphDocument> {
    let steps = parse_sequence(plan, input, &config.parse_options())?;
    let mut draft = Draft::default();

    for step in &steps {
        if let PlanStep::Compute(compute) = step {
            let owner = draft.steps.entry(compute.name.clone()).or_default();
            owner.description = compute.comment.clone();
        }
    }

    let mut previous_compute: Option<&str> = None;
    for (i, step) in steps.iter().enumerate() {
        let transfer = match step {
            PlanStep::Compute(compute) => {
                if let Some(result_path) = &compute.result_path {
                    let side = Side::Step(compute.name.clone());
                    let name = side.parameter_name(result_path.trim_start_matches("$."));
                    draft.owner(&side).add_output(ParamRecord::file(name));
                }
                previous_compute = Some(compute.name.as_str());
                continue;
            }
            PlanStep::Transfer(transfer) => transfer,
        };

        let next_compute = steps[i + 1..].iter().find_map(|s| match s {
            PlanStep::Compute(c) => Some(c.name.as_str()),
            PlanStep::Transfer(_) => None,
        });

        let source = attribute(transfer, &transfer.source_endpoint, previous_compute, "source", config)?;
        let destination = attribute(
            transfer,
            &transfer.destination_endpoint,
            next_compute,
            "destination",
            config,
        )?;

        for item in &transfer.items {
            let source_name = source.parameter_name(&item.source_path.to_text());
            let destination_name = destination.parameter_name(&item.destination_path.to_text());
            debug!(
                "Transfer '{}' links '{}' -> '{}'",
                transfer.name, source_name, destination_name
            );

            let source_owner = draft.owner(&source);
            match source {
                Side::Orchestrator => source_owner.add_input(ParamRecord::file(source_name.clone())),
                Side::Step(_) => source_owner.add_output(ParamRecord::file(source_name.clone())),
            }

            let destination_owner = draft.owner(&destination);
            match destination {
                Side::Orchestrator => {
                    destination_owner.add_output(ParamRecord::file(destination_name.clone()))
                }
                Side::Step(_) => destination_owner.add_input(ParamRecord::file(destination_name.clone())),
            }
            destination_owner.connect(&source_name, &destination_name);
        }
    }

    emit(draft, config)
}

/// Chooses the producer of a parameter according to the producer policy.
fn producer<'a>(summary: &'a ParameterSummary, config: &ProvConfig) -> Result<Option<&'a str>> {
    match (summary.output.as_slice(), config.producer_policy) {
        ([], _) => Ok(None),
        ([only], _) => Ok(Some(only.as_str())),
        ([first, second, ..], ProducerPolicy::Reject) => Err(ProvError::MultipleProducers {
            parameter: summary.name.clone(),
            first: first.clone(),
            second: second.clone(),
        }),
        ([.., last], ProducerPolicy::LastWriterWins) => Ok(Some(last.as_str())),
    }
}

/// Builds the graph of a flow declared through a parameter registry.
///
/// Steps follow the compute order of the augmented sequence. Parameters
/// nobody produces flow in from the workflow; outputs nobody consumes
/// flow out to it.
pub fn build_from_tools(registry: &ParameterRegistry, config: &ProvConfig) -> Result<GraphDocument> {
    let plan = infer_transfers(registry.tools(), config)?;
    let sequence = augmented_sequence(registry.tools(), &plan);
    let summaries = registry.formal_parameters()?;

    let mut draft = Draft::default();
    for (tool, function) in sequence.compute_steps() {
        let owner = draft.steps.entry(function.to_string()).or_default();
        owner.description = Some(format!("{} function of {}", function, tool));
    }

    for summary in &summaries {
        let param = |owner: &str| {
            ParamRecord::from_summary(format!("{}/{}", owner, summary.name), summary)
        };
        let produced_by = producer(summary, config)?;

        for function in &summary.output {
            draft.owner(&Side::Step(function.clone())).add_output(param(function.as_str()));
        }

        let source = match produced_by {
            Some(function) => param(function),
            None => {
                let main = param(MAIN);
                draft.main.add_input(main.clone());
                main
            }
        };

        for function in &summary.input {
            let target = param(function.as_str());
            let owner = draft.owner(&Side::Step(function.clone()));
            owner.add_input(target.clone());
            owner.connect(&source.name, &target.name);
        }

        if summary.input.is_empty() {
            let target = param(MAIN);
            draft.main.add_output(target.clone());
            draft.main.connect(&source.name, &target.name);
        }
    }

    emit(draft, config)
}

/// Turns a draft into graph nodes.
fn emit(draft: Draft, config: &ProvConfig) -> Result<GraphDocument> {
    let wf = config.workflow_id.as_str();
    let local = |name: &str| format!("{}#{}", wf, name);
    let step_id = |name: &str| format!("{}#{}/{}", wf, MAIN, name);
    let param_links = |params: &[ParamRecord]| {
        PropertyValue::links(params.iter().map(|p| local(&p.name)))
    };

    let mut doc = GraphDocument::new(config.context.clone());
    let mut connection_count = 0;
    let mut connection_nodes = |pairs: &[(String, String)], doc: &mut GraphDocument| -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(pairs.len());
        for (source, target) in pairs {
            connection_count += 1;
            let id = format!("{}#connection/{}", wf, connection_count);
            doc.add_node(
                GraphNode::new(id.clone(), &["ParameterConnection"])
                    .with("sourceParameter", PropertyValue::link(local(source)))
                    .with("targetParameter", PropertyValue::link(local(target))),
            )?;
            ids.push(id);
        }
        Ok(ids)
    };

    doc.add_node(
        GraphNode::new(METADATA_ID, &["CreativeWork"])
            .with("about", PropertyValue::link(ROOT_ID))
            .with("conformsTo", PropertyValue::link(CRATE_SPEC)),
    )?;
    doc.add_node(
        GraphNode::new(ROOT_ID, &["Dataset"])
            .with("conformsTo", PropertyValue::links(config.profiles.iter().map(|p| p.id.clone())))
            .with("hasPart", PropertyValue::links([wf]))
            .with("mainEntity", PropertyValue::link(wf)),
    )?;

    let mut workflow = GraphNode::new(wf, WORKFLOW_TYPES)
        .with("name", PropertyValue::text(wf))
        .with("programmingLanguage", PropertyValue::link(config.language.id.clone()))
        .with("input", param_links(&draft.main.inputs))
        .with("output", param_links(&draft.main.outputs))
        .with("step", PropertyValue::links(draft.steps.keys().map(|s| step_id(s))))
        .with("hasPart", PropertyValue::links(draft.steps.keys().map(|s| local(s))));

    // Workflow connections are numbered first, in draft order.
    let main_connections = connection_nodes(&draft.main.connections, &mut doc)?;
    if !main_connections.is_empty() {
        workflow = workflow.with("connection", PropertyValue::links(main_connections));
    }
    doc.add_node(workflow)?;

    doc.add_node(
        GraphNode::new(config.language.id.clone(), &["ComputerLanguage"])
            .with("name", PropertyValue::text(config.language.name.clone()))
            .with_opt("url", config.language.url.clone().map(PropertyValue::link))
            .with_opt("version", config.language.version.clone().map(PropertyValue::Text)),
    )?;

    for profile in &config.profiles {
        doc.add_node(
            GraphNode::new(profile.id.clone(), &["CreativeWork"])
                .with("name", PropertyValue::text(profile.name.clone()))
                .with("version", PropertyValue::text(profile.version.clone())),
        )?;
    }

    for param in draft.main.inputs.iter().chain(draft.main.outputs.iter()) {
        doc.add_node(parameter_node(local(&param.name), param))?;
    }

    for (position, (name, owner)) in draft.steps.iter().enumerate() {
        let connections = connection_nodes(&owner.connections, &mut doc)?;

        doc.add_node(
            GraphNode::new(step_id(name), &["HowToStep"])
                .with("position", PropertyValue::text(position.to_string()))
                .with("workExample", PropertyValue::link(local(name)))
                .with_opt(
                    "connection",
                    (!connections.is_empty()).then(|| PropertyValue::links(connections)),
                ),
        )?;

        doc.add_node(
            GraphNode::new(local(name), &["SoftwareApplication"])
                .with("name", PropertyValue::text(name.clone()))
                .with_opt("description", owner.description.clone().map(PropertyValue::Text))
                .with("input", param_links(&owner.inputs))
                .with("output", param_links(&owner.outputs)),
        )?;

        for param in owner.inputs.iter().chain(owner.outputs.iter()) {
            doc.add_node(parameter_node(local(&param.name), param))?;
        }
    }

    info!(
        "Built graph for '{}': {} steps, {} connections, {} nodes",
        wf,
        draft.steps.len(),
        connection_count,
        doc.len()
    );

    Ok(doc)
}

fn parameter_node(id: String, param: &ParamRecord) -> GraphNode {
    GraphNode::new(id, &["FormalParameter"])
        .with("name", PropertyValue::text(param.name.clone()))
        .with("additionalType", PropertyValue::text(param.additional_type.clone()))
        .with_opt("encodingFormat", param.format.clone().map(PropertyValue::Text))
}

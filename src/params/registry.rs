//! Parameter Registry
//!
//! Formal parameter definitions and the tools that use them, checked
//! once at construction and immutable afterwards.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use super::formal::{Direction, FormalParameter};
use super::tool::{FunctionParameters, Tool, ToolStep};
use crate::error::{ProvError, Result};
use crate::plan::resolver::lookup;

/// How one formal parameter is used across the flow.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ParameterSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Functions reading the parameter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<String>,
    /// Functions writing the parameter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
}

/// Formal parameters plus the ordered tools of a flow.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    parameters: IndexMap<String, FormalParameter>,
    tools: Vec<Tool>,
}

impl ParameterRegistry {
    /// Builds a registry, rejecting duplicate parameter names and usages
    /// of parameters that were never declared.
    pub fn new(parameters: Vec<FormalParameter>, tools: Vec<Tool>) -> Result<Self> {
        let mut declared = IndexMap::new();
        for parameter in parameters {
            if declared.contains_key(&parameter.name) {
                return Err(ProvError::DuplicateParameterName {
                    name: parameter.name,
                });
            }
            declared.insert(parameter.name.clone(), parameter);
        }

        for step in tools.iter().filter_map(Tool::as_provenance) {
            for (function, params) in &step.functions {
                for usage in params.usages() {
                    if !declared.contains_key(usage.name()) {
                        return Err(ProvError::UnknownParameter {
                            function: function.clone(),
                            parameter: usage.name().to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "Registry created: {} parameters, {} tools",
            declared.len(),
            tools.len()
        );

        Ok(Self {
            parameters: declared,
            tools,
        })
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get_parameter(&self, name: &str) -> Option<&FormalParameter> {
        self.parameters.get(name)
    }

    /// Declared parameters in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &FormalParameter> {
        self.parameters.values()
    }

    /// Provenance tools in flow order.
    pub fn provenance_tools(&self) -> impl Iterator<Item = &ToolStep> {
        self.tools.iter().filter_map(Tool::as_provenance)
    }

    /// Inputs a tool needs in the flow input document: its declared
    /// required inputs, then `function.arg` for every signature argument.
    pub fn required_inputs(&self, tool: &ToolStep) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut required = Vec::new();

        let qualified = tool.functions.iter().flat_map(|(function, params)| {
            params
                .signature
                .iter()
                .map(move |arg| format!("{}.{}", function, arg))
        });

        for name in tool.required_inputs.iter().cloned().chain(qualified) {
            if seen.insert(name.clone()) {
                required.push(name);
            }
        }

        required
    }

    /// Checks that every required input of a tool exists under `input`
    /// in a flow input document.
    pub fn check_input(&self, tool: &ToolStep, flow_input: &Value) -> Result<()> {
        for name in self.required_inputs(tool) {
            let path = format!("$.input.{}", name);
            lookup(flow_input, &path)?;
            debug!("Found required input '{}' for tool '{}'", name, tool.name);
        }
        Ok(())
    }

    /// Function parameter mappings of every provenance tool, merged.
    fn merged_functions(&self) -> Result<IndexMap<&str, &FunctionParameters>> {
        let mut merged = IndexMap::new();
        for step in self.provenance_tools() {
            for (function, params) in &step.functions {
                if merged.insert(function.as_str(), params).is_some() {
                    return Err(ProvError::DuplicateFunctionName {
                        function: function.clone(),
                    });
                }
            }
        }
        Ok(merged)
    }

    /// Lists every parameter used by a provenance tool, in first-seen
    /// order, with the functions using it as input and output.
    pub fn formal_parameters(&self) -> Result<Vec<ParameterSummary>> {
        let functions = self.merged_functions()?;

        let mut summaries: IndexMap<&str, ParameterSummary> = IndexMap::new();
        for params in functions.values() {
            for usage in params.usages() {
                let parameter = self
                    .parameters
                    .get(usage.name())
                    .unwrap_or(&usage.parameter);
                summaries
                    .entry(usage.name())
                    .or_insert_with(|| ParameterSummary {
                        name: parameter.name.clone(),
                        type_name: parameter.type_name().to_string(),
                        format: parameter.format().map(str::to_string),
                        input: Vec::new(),
                        output: Vec::new(),
                    });
            }
        }

        for (function, params) in &functions {
            for usage in params.usages() {
                if let Some(summary) = summaries.get_mut(usage.name()) {
                    let users = match usage.direction {
                        Direction::Input => &mut summary.input,
                        Direction::Output => &mut summary.output,
                    };
                    if !users.iter().any(|f| f == function) {
                        users.push(function.to_string());
                    }
                }
            }
        }

        Ok(summaries.into_values().collect())
    }
}

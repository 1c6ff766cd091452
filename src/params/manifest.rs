//! Tool Manifest
//!
//! Declares formal parameters and the tools of a flow in YAML or JSON,
//! and converts the declaration into a [`ParameterRegistry`].
//!
//! # Example YAML Format
//!
//! ```yaml
//! parameters:
//!   - name: c
//!     type: file
//!     format: txt
//! tools:
//!   - name: ToolB
//!     storage_endpoint_id: 8ee44381-114a-45de-b8f8-d105a90c200d
//!     functions:
//!       - name: FuncB
//!         signature: [c]
//!         args:
//!           - {parameter: c, direction: input, value: input.txt}
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::formal::{Direction, FormalParameter, ParameterUsage};
use super::registry::ParameterRegistry;
use super::tool::{FunctionParameters, Tool, ToolStep};
use crate::error::{ProvError, Result};

/// Kind of tool declared in a manifest.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Provenance,
    Opaque,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    pub name: String,
    /// `file` for file parameters, otherwise a scalar type name
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ParameterEntry {
    fn to_parameter(&self) -> FormalParameter {
        if self.type_name == "file" {
            FormalParameter::file(self.name.clone(), self.format.as_deref())
        } else {
            FormalParameter::scalar(self.name.clone(), self.type_name.clone())
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UsageEntry {
    pub parameter: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub name: String,
    #[serde(default)]
    pub signature: Vec<String>,
    #[serde(default)]
    pub args: Vec<UsageEntry>,
    #[serde(default)]
    pub returns: Vec<UsageEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolEntry {
    #[serde(default)]
    pub kind: ToolKind,
    pub name: String,
    #[serde(default)]
    pub storage_endpoint_id: String,
    #[serde(default)]
    pub required_inputs: Vec<String>,
    #[serde(default)]
    pub functions: Vec<FunctionEntry>,
}

/// Parameters and tools of one flow, in declaration order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ToolManifest {
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
    #[serde(default)]
    pub tools: Vec<ToolEntry>,
}

impl ToolManifest {
    /// Loads a manifest from a YAML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let manifest = Self::from_yaml(&content)?;
        info!(
            "Loaded manifest '{}': {} parameters, {} tools",
            path.display(),
            manifest.parameters.len(),
            manifest.tools.len()
        );
        Ok(manifest)
    }

    /// Parses a manifest from YAML (or JSON) text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Converts the manifest into a checked registry.
    pub fn into_registry(self) -> Result<ParameterRegistry> {
        let parameters: Vec<FormalParameter> =
            self.parameters.iter().map(ParameterEntry::to_parameter).collect();

        let by_name: HashMap<&str, &FormalParameter> =
            parameters.iter().map(|p| (p.name.as_str(), p)).collect();

        let mut tools = Vec::with_capacity(self.tools.len());
        for entry in &self.tools {
            let tool = match entry.kind {
                ToolKind::Opaque => Tool::Opaque {
                    name: entry.name.clone(),
                    functions: entry.functions.iter().map(|f| f.name.clone()).collect(),
                },
                ToolKind::Provenance => Tool::Provenance(build_tool(entry, &by_name)?),
            };
            debug!("Declared tool '{}' ({:?})", entry.name, entry.kind);
            tools.push(tool);
        }

        ParameterRegistry::new(parameters, tools)
    }
}

fn build_tool(entry: &ToolEntry, by_name: &HashMap<&str, &FormalParameter>) -> Result<ToolStep> {
    let mut step = ToolStep::new(entry.name.clone(), entry.storage_endpoint_id.clone());
    step.required_inputs = entry.required_inputs.clone();

    for function in &entry.functions {
        let mut params = FunctionParameters::new(function.signature.clone());
        for usage in &function.args {
            params.args.push(build_usage(&function.name, usage, by_name)?);
        }
        for usage in &function.returns {
            params.returns.push(build_usage(&function.name, usage, by_name)?);
        }
        step.functions.insert(function.name.clone(), params);
    }

    Ok(step)
}

fn build_usage(
    function: &str,
    entry: &UsageEntry,
    by_name: &HashMap<&str, &FormalParameter>,
) -> Result<ParameterUsage> {
    let parameter = by_name
        .get(entry.parameter.as_str())
        .ok_or_else(|| ProvError::UnknownParameter {
            function: function.to_string(),
            parameter: entry.parameter.clone(),
        })?;

    Ok(ParameterUsage::new(
        (*parameter).clone(),
        entry.direction,
        entry.value.as_deref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = include_str!("../../fixtures/tools/chain.yaml");

    #[test]
    fn test_chain_manifest_parses() {
        let manifest = ToolManifest::from_yaml(CHAIN).unwrap();
        assert_eq!(manifest.parameters.len(), 5);
        assert_eq!(manifest.tools.len(), 3);
        assert_eq!(manifest.tools[1].functions[0].args[1].value.as_deref(), Some("intput.txt"));
    }

    #[test]
    fn test_into_registry() {
        let registry = ToolManifest::from_yaml(CHAIN).unwrap().into_registry().unwrap();

        let c = registry.get_parameter("c").unwrap();
        assert!(c.is_file());
        assert_eq!(c.format(), Some("txt"));

        let tool_b = registry.provenance_tools().nth(1).unwrap();
        assert_eq!(tool_b.name, "ToolB");
        assert_eq!(tool_b.functions["FuncB"].args.len(), 3);
        assert_eq!(tool_b.functions["FuncB"].args[2].direction, Direction::Output);
    }

    #[test]
    fn test_opaque_tool() {
        let manifest = ToolManifest::from_yaml(
            "tools:\n  - kind: opaque\n    name: Legacy\n    functions:\n      - name: Run\n",
        )
        .unwrap();
        let registry = manifest.into_registry().unwrap();
        assert!(matches!(&registry.tools()[0], Tool::Opaque { name, .. } if name == "Legacy"));
    }

    #[test]
    fn test_json_manifest() {
        let manifest = ToolManifest::from_yaml(
            r#"{"parameters": [{"name": "x", "type": "str"}], "tools": []}"#,
        )
        .unwrap();
        assert_eq!(manifest.parameters[0].type_name, "str");
    }

    #[test]
    fn test_unknown_parameter_in_manifest() {
        let manifest = ToolManifest::from_yaml(
            "tools:\n  - name: T\n    functions:\n      - name: F\n        args:\n          - {parameter: nope, direction: input}\n",
        )
        .unwrap();
        let err = manifest.into_registry().unwrap_err();
        assert!(matches!(err, ProvError::UnknownParameter { function, .. } if function == "F"));
    }

    #[test]
    fn test_load_manifest_from_file() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("tools.yaml");
        std::fs::write(&path, CHAIN).unwrap();

        let manifest = ToolManifest::load(&path).unwrap();
        assert_eq!(manifest.tools[2].name, "ToolC");
    }
}

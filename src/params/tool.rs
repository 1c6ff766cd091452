//! Tool Definitions
//!
//! A tool is a named compute capability hosted on one storage endpoint.
//! Provenance tools declare how each of their functions uses formal
//! parameters; opaque tools take part in the sequence but expose
//! nothing to inference.

use indexmap::IndexMap;
use serde::Serialize;

use super::formal::{Direction, ParameterUsage};

/// Parameter usage of one compute function.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct FunctionParameters {
    /// Argument names of the function itself
    pub signature: Vec<String>,
    pub args: Vec<ParameterUsage>,
    pub returns: Vec<ParameterUsage>,
}

impl FunctionParameters {
    pub fn new(signature: Vec<String>) -> Self {
        Self {
            signature,
            ..Self::default()
        }
    }

    pub fn with_arg(mut self, usage: ParameterUsage) -> Self {
        self.args.push(usage);
        self
    }

    pub fn with_return(mut self, usage: ParameterUsage) -> Self {
        self.returns.push(usage);
        self
    }

    /// All usages, args first.
    pub fn usages(&self) -> impl Iterator<Item = &ParameterUsage> {
        self.args.iter().chain(self.returns.iter())
    }
}

/// A file-typed usage located on a storage endpoint.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FileUsage {
    pub parameter: String,
    pub tool: String,
    pub function: String,
    pub endpoint: String,
    pub declared_path: String,
    pub localized_path: String,
}

/// Tools that expose file-typed parameter usages.
pub trait HasFileParameters {
    /// File usages with direction `input`, args then returns.
    fn file_inputs(&self) -> Vec<FileUsage>;

    /// File usages with direction `output`, args then returns.
    fn file_outputs(&self) -> Vec<FileUsage>;
}

/// A tool whose functions declare formal parameter usage.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ToolStep {
    pub name: String,
    pub storage_endpoint_id: String,
    /// Inputs required in addition to the function signatures
    pub required_inputs: Vec<String>,
    pub functions: IndexMap<String, FunctionParameters>,
}

impl ToolStep {
    pub fn new(name: impl Into<String>, storage_endpoint_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_endpoint_id: storage_endpoint_id.into(),
            required_inputs: Vec::new(),
            functions: IndexMap::new(),
        }
    }

    pub fn with_function(mut self, name: impl Into<String>, params: FunctionParameters) -> Self {
        self.functions.insert(name.into(), params);
        self
    }

    pub fn with_required_input(mut self, input: impl Into<String>) -> Self {
        self.required_inputs.push(input.into());
        self
    }

    /// Namespaces a path by tool and function so that functions sharing
    /// an endpoint never collide.
    pub fn localise_path(&self, function: &str, path: &str) -> String {
        format!("{}/{}/{}", self.name, function, path)
    }

    fn file_usages(&self, direction: Direction) -> Vec<FileUsage> {
        let mut out = Vec::new();
        for (function, params) in &self.functions {
            for usage in params.usages() {
                if usage.direction != direction || !usage.parameter.is_file() {
                    continue;
                }
                let declared = usage.declared_path();
                out.push(FileUsage {
                    parameter: usage.name().to_string(),
                    tool: self.name.clone(),
                    function: function.clone(),
                    endpoint: self.storage_endpoint_id.clone(),
                    declared_path: declared.to_string(),
                    localized_path: self.localise_path(function, declared),
                });
            }
        }
        out
    }
}

impl HasFileParameters for ToolStep {
    fn file_inputs(&self) -> Vec<FileUsage> {
        self.file_usages(Direction::Input)
    }

    fn file_outputs(&self) -> Vec<FileUsage> {
        self.file_usages(Direction::Output)
    }
}

/// Any tool in a flow.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tool {
    Provenance(ToolStep),
    Opaque { name: String, functions: Vec<String> },
}

impl Tool {
    pub fn name(&self) -> &str {
        match self {
            Self::Provenance(step) => &step.name,
            Self::Opaque { name, .. } => name,
        }
    }

    /// Compute function names in declaration order.
    pub fn function_names(&self) -> Vec<&str> {
        match self {
            Self::Provenance(step) => step.functions.keys().map(String::as_str).collect(),
            Self::Opaque { functions, .. } => functions.iter().map(String::as_str).collect(),
        }
    }

    pub fn as_provenance(&self) -> Option<&ToolStep> {
        match self {
            Self::Provenance(step) => Some(step),
            Self::Opaque { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::formal::FormalParameter;

    fn tool_b() -> ToolStep {
        let b = FormalParameter::scalar("b", "int");
        let c = FormalParameter::file("c", Some("txt"));
        let d = FormalParameter::file("d", Some("txt"));

        ToolStep::new("ToolB", "ep-b").with_function(
            "FuncB",
            FunctionParameters::new(vec!["a".into(), "b".into(), "c".into()])
                .with_arg(b.input(None))
                .with_arg(c.input(Some("intput.txt")))
                .with_arg(d.output(Some("output.txt"))),
        )
    }

    #[test]
    fn test_localise_path() {
        assert_eq!(tool_b().localise_path("FuncB", "x.txt"), "ToolB/FuncB/x.txt");
    }

    #[test]
    fn test_file_inputs_skip_scalars() {
        let inputs = tool_b().file_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].parameter, "c");
        assert_eq!(inputs[0].declared_path, "intput.txt");
        assert_eq!(inputs[0].localized_path, "ToolB/FuncB/intput.txt");
        assert_eq!(inputs[0].endpoint, "ep-b");
    }

    #[test]
    fn test_file_outputs_include_returns() {
        let e = FormalParameter::file("e", None);
        let tool = ToolStep::new("ToolC", "ep-c")
            .with_function("FuncC", FunctionParameters::default().with_return(e.output(Some("out.txt"))));

        let outputs = tool.file_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].function, "FuncC");
        assert_eq!(outputs[0].localized_path, "ToolC/FuncC/out.txt");
    }

    #[test]
    fn test_tool_accessors() {
        let provenance = Tool::Provenance(tool_b());
        assert_eq!(provenance.name(), "ToolB");
        assert_eq!(provenance.function_names(), vec!["FuncB"]);
        assert!(provenance.as_provenance().is_some());

        let opaque = Tool::Opaque {
            name: "Legacy".into(),
            functions: vec!["Run".into()],
        };
        assert_eq!(opaque.function_names(), vec!["Run"]);
        assert!(opaque.as_provenance().is_none());
    }
}

//! Formal Parameters
//!
//! Named, typed values passed between compute functions, and the
//! record of how a function uses one.

use serde::{Deserialize, Serialize};

/// What kind of value a formal parameter carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    /// A plain value such as `int` or `str`
    Scalar { type_name: String },
    /// A file, optionally with an encoding format such as `txt`
    File { format: Option<String> },
}

/// A named value used by compute functions. Identity is by name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FormalParameter {
    pub name: String,
    pub kind: ParameterKind,
}

impl FormalParameter {
    /// Creates a scalar parameter.
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Scalar {
                type_name: type_name.into(),
            },
        }
    }

    /// Creates a file parameter.
    pub fn file(name: impl Into<String>, format: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::File {
                format: format.map(str::to_string),
            },
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ParameterKind::File { .. })
    }

    /// The type name reported in summaries: `"file"` for files.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ParameterKind::Scalar { type_name } => type_name,
            ParameterKind::File { .. } => "file",
        }
    }

    /// The file format, if this is a file parameter with one.
    pub fn format(&self) -> Option<&str> {
        match &self.kind {
            ParameterKind::Scalar { .. } => None,
            ParameterKind::File { format } => format.as_deref(),
        }
    }

    /// Usage of this parameter as a function input.
    pub fn input(&self, local_value: Option<&str>) -> ParameterUsage {
        ParameterUsage::new(self.clone(), Direction::Input, local_value)
    }

    /// Usage of this parameter as a function output.
    pub fn output(&self, local_value: Option<&str>) -> ParameterUsage {
        ParameterUsage::new(self.clone(), Direction::Output, local_value)
    }
}

/// Whether a function reads or writes a parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// One use of a formal parameter by a compute function.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ParameterUsage {
    pub parameter: FormalParameter,
    pub direction: Direction,
    /// Path or value local to the function (e.g. `input.txt`)
    pub local_value: Option<String>,
}

impl ParameterUsage {
    pub fn new(parameter: FormalParameter, direction: Direction, local_value: Option<&str>) -> Self {
        Self {
            parameter,
            direction,
            local_value: local_value.map(str::to_string),
        }
    }

    /// Name of the parameter being used.
    pub fn name(&self) -> &str {
        &self.parameter.name
    }

    /// The declared path of a file usage. Files without a local value
    /// fall back to the parameter name.
    pub fn declared_path(&self) -> &str {
        self.local_value.as_deref().unwrap_or(&self.parameter.name)
    }
}

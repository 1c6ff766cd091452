//! Node Categories
//!
//! Sorts graph nodes into the parts of a provenance crate, so that a
//! comparison can be limited to, say, the prospective part.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The part of a provenance crate a node belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CrateCategory {
    /// Design-time structure: workflow, steps, tools, parameters
    Prospective,
    /// Execution records: actions, agents, produced values
    Retrospective,
    /// The root dataset
    Orchestration,
    /// The metadata descriptor
    Metadata,
    /// Anything else, mostly context entities
    Other,
}

impl CrateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prospective => "prospective",
            Self::Retrospective => "retrospective",
            Self::Orchestration => "orchestration",
            Self::Metadata => "metadata",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for CrateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CrateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prospective" => Ok(Self::Prospective),
            "retrospective" => Ok(Self::Retrospective),
            "orchestration" => Ok(Self::Orchestration),
            "metadata" => Ok(Self::Metadata),
            "other" => Ok(Self::Other),
            other => Err(format!("Unknown crate part: '{}'", other)),
        }
    }
}

/// Assigns a category to a graph node.
pub trait NodeClassifier {
    fn classify(&self, node: &Value) -> CrateCategory;
}

impl<F> NodeClassifier for F
where
    F: Fn(&Value) -> CrateCategory,
{
    fn classify(&self, node: &Value) -> CrateCategory {
        self(node)
    }
}

/// Classifier using [`classify_node`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl NodeClassifier for DefaultClassifier {
    fn classify(&self, node: &Value) -> CrateCategory {
        classify_node(node)
    }
}

/// A type pattern: one exact name, a set of alternatives for a single
/// type, or an exact set of types.
enum TypePattern {
    Exact(&'static str),
    AnyOf(&'static [&'static str]),
    AllOf(&'static [&'static str]),
}

const PROSPECTIVE: &[TypePattern] = &[
    TypePattern::AllOf(&["File", "SoftwareSourceCode", "ComputationalWorkflow", "HowTo"]),
    TypePattern::Exact("HowToStep"),
    TypePattern::Exact("SoftwareApplication"),
    TypePattern::Exact("FormalParameter"),
    TypePattern::Exact("ParameterConnection"),
];

const RETROSPECTIVE: &[TypePattern] = &[
    TypePattern::Exact("OrganizeAction"),
    TypePattern::Exact("ControlAction"),
    TypePattern::Exact("CreateAction"),
    TypePattern::AnyOf(&["Person", "Organisation"]),
    TypePattern::AnyOf(&["File", "PropertyValue"]),
];

/// Node types, with a one-element list treated as a single type.
enum NodeTypes<'a> {
    Single(&'a str),
    Many(Vec<&'a str>),
}

impl<'a> NodeTypes<'a> {
    fn of(node: &'a Value) -> Self {
        match &node["@type"] {
            Value::String(single) => Self::Single(single),
            Value::Array(items) => {
                let mut names: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                if names.len() == 1 {
                    Self::Single(names.remove(0))
                } else {
                    Self::Many(names)
                }
            }
            _ => Self::Many(Vec::new()),
        }
    }

    fn matches(&self, pattern: &TypePattern) -> bool {
        match (self, pattern) {
            (Self::Single(name), TypePattern::Exact(expected)) => name == expected,
            (Self::Single(name), TypePattern::AnyOf(options)) => options.contains(name),
            (Self::Many(names), TypePattern::AllOf(expected)) => {
                names.len() == expected.len() && expected.iter().all(|e| names.contains(e))
            }
            _ => false,
        }
    }
}

/// Default classification by id and type.
pub fn classify_node(node: &Value) -> CrateCategory {
    let id = node["@id"].as_str().unwrap_or_default();
    if id == "ro-crate-metadata.json" {
        return CrateCategory::Metadata;
    }

    let types = NodeTypes::of(node);
    if id == "./" || types.matches(&TypePattern::Exact("Dataset")) {
        return CrateCategory::Orchestration;
    }
    if PROSPECTIVE.iter().any(|p| types.matches(p)) {
        return CrateCategory::Prospective;
    }
    if RETROSPECTIVE.iter().any(|p| types.matches(p)) {
        return CrateCategory::Retrospective;
    }
    CrateCategory::Other
}

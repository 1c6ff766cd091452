//! Schema Tables
//!
//! Declarative per-type rules for graph documents. Every node type maps
//! to the keys it requires, the keys it additionally allows, and which of
//! those keys hold references to other nodes. Every type also satisfies
//! the base rule [`BASE_TYPE`].
//!
//! # Example YAML Format
//!
//! ```yaml
//! Thing:
//!   allowed: [name, description]
//! HowToStep:
//!   required: [position, workExample]
//!   references: [workExample]
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::info;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Type every node implicitly has.
pub const BASE_TYPE: &str = "Thing";

/// Keys whose references may point outside the document.
pub const EXEMPT_REFERENCE_KEYS: &[&str] = &["identifier", "url", "conformsTo"];

/// Rule for one node type.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SchemaRule {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

impl SchemaRule {
    fn from_lists(required: &[&str], allowed: &[&str], references: &[&str]) -> Self {
        let own = |keys: &[&str]| keys.iter().map(|k| k.to_string()).collect();
        Self {
            required: own(required),
            allowed: own(allowed),
            references: own(references),
        }
    }

    /// True if the key is required or allowed by this rule.
    pub fn permits(&self, key: &str) -> bool {
        self.required.iter().chain(self.allowed.iter()).any(|k| k == key)
    }

    pub fn is_reference(&self, key: &str) -> bool {
        self.references.iter().any(|k| k == key)
    }
}

/// Rules keyed by type name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct SchemaTable {
    rules: IndexMap<String, SchemaRule>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, type_name: impl Into<String>, rule: SchemaRule) -> Self {
        self.rules.insert(type_name.into(), rule);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&SchemaRule> {
        self.rules.get(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parses a table from YAML (or JSON) text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads a table from a YAML or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::from_yaml(&fs::read_to_string(path)?)?;
        info!("Loaded schema with {} types from {}", table.len(), path.display());
        Ok(table)
    }
}

type RuleRow = (&'static str, &'static [&'static str], &'static [&'static str], &'static [&'static str]);

/// (type, required, allowed, references)
const DRAFT_RULES: &[RuleRow] = &[
    (
        BASE_TYPE,
        &[],
        &["name", "description", "additionalType", "alternateName", "identifier", "url"],
        &["identifier", "url"],
    ),
    ("CreativeWork", &[], &["about", "conformsTo", "version"], &["about", "conformsTo"]),
    (
        "Dataset",
        &["conformsTo", "hasPart", "mainEntity"],
        &["mentions"],
        &["conformsTo", "hasPart", "mainEntity", "mentions"],
    ),
    (
        "ComputationalWorkflow",
        &["input", "output", "programmingLanguage"],
        &["hasPart", "connection"],
        &["input", "output", "programmingLanguage", "hasPart", "connection"],
    ),
    ("File", &[], &["exampleOfWork"], &["exampleOfWork"]),
    ("SoftwareSourceCode", &[], &[], &[]),
    ("HowTo", &["step"], &[], &["step"]),
    ("ComputerLanguage", &[], &["version"], &[]),
    ("FormalParameter", &["name"], &["encodingFormat", "defaultValue"], &[]),
    (
        "HowToStep",
        &["position", "workExample"],
        &["connection"],
        &["workExample", "connection"],
    ),
    ("SoftwareApplication", &[], &["input", "output"], &["input", "output"]),
    (
        "ParameterConnection",
        &["sourceParameter", "targetParameter"],
        &[],
        &["sourceParameter", "targetParameter"],
    ),
    ("Person", &[], &[], &[]),
    (
        "OrganizeAction",
        &["agent", "instrument", "object", "result", "startTime"],
        &[],
        &["agent", "instrument", "object", "result"],
    ),
    (
        "CreateAction",
        &["startTime", "endTime", "instrument", "object", "result"],
        &["environment"],
        &["instrument", "object", "result"],
    ),
    ("ControlAction", &["instrument", "object"], &[], &["instrument", "object"]),
    ("PropertyValue", &["value"], &["exampleOfWork"], &["exampleOfWork"]),
];

/// Draft provenance-crate schema, extended with parameter connections.
pub static PROVENANCE_DRAFT_SCHEMA: Lazy<SchemaTable> = Lazy::new(|| {
    DRAFT_RULES
        .iter()
        .fold(SchemaTable::new(), |table, (name, required, allowed, references)| {
            table.with_rule(*name, SchemaRule::from_lists(required, allowed, references))
        })
});

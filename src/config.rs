//! Run Configuration
//!
//! Settings shared by inference and graph construction. Every field has
//! a default, so an empty file (or no file at all) is a valid
//! configuration.
//!
//! # Example YAML Format
//!
//! ```yaml
//! workflow_id: reverse_sort.json
//! orchestration_endpoint_id: b782400e-3e59-412c-8f73-56cd0782301f
//! inbound_source: declared
//! producer_policy: reject
//! ```

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plan::parser::{ParseOptions, DEFAULT_PROVENANCE_MARKER};

/// JSON-LD context written into every generated document.
pub const DEFAULT_CONTEXT: &str = "https://w3id.org/ro/crate/1.1/context";

/// Where an inbound auto transfer reads from on the orchestration endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InboundSourcePath {
    /// The path as declared by the consuming function
    #[default]
    Declared,
    /// The consumer's localized path
    Localized,
}

/// What to do when more than one function produces the same parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProducerPolicy {
    /// Fail with `MultipleProducers`
    #[default]
    Reject,
    /// Keep the producer that appears last in tool order
    LastWriterWins,
}

/// A profile the generated crate conforms to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub version: String,
}

impl Profile {
    fn new(base: &str, version: &str, name: &str) -> Self {
        Self {
            id: format!("{}{}", base, version),
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

/// The language the workflow is written in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Language {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for Language {
    fn default() -> Self {
        Self {
            id: "#globus-flows".to_string(),
            name: "Globus Flows".to_string(),
            url: Some("https://www.globus.org/platform/services/flows".to_string()),
            version: None,
        }
    }
}

fn default_workflow_id() -> String {
    "flow.json".to_string()
}

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

fn default_marker() -> Option<String> {
    Some(DEFAULT_PROVENANCE_MARKER.to_string())
}

fn default_profiles() -> Vec<Profile> {
    vec![
        Profile::new("https://w3id.org/ro/wfrun/process/", "0.1", "Process Run Crate"),
        Profile::new("https://w3id.org/ro/wfrun/workflow/", "0.1", "Workflow Run Crate"),
        Profile::new("https://w3id.org/ro/wfrun/provenance/", "0.1", "Provenance Run Crate"),
        Profile::new("https://w3id.org/workflowhub/workflow-ro-crate/", "1.0", "Workflow RO-Crate"),
    ]
}

/// Settings for one provenance build.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProvConfig {
    /// Id of the workflow node; prefixes every local node id
    #[serde(default = "default_workflow_id")]
    pub workflow_id: String,

    /// Storage endpoint of the orchestration server
    #[serde(default)]
    pub orchestration_endpoint_id: String,

    #[serde(default)]
    pub inbound_source: InboundSourcePath,

    #[serde(default)]
    pub producer_policy: ProducerPolicy,

    /// Name marker of provenance-capture transfer states
    #[serde(default = "default_marker")]
    pub provenance_marker: Option<String>,

    #[serde(default = "default_context")]
    pub context: String,

    #[serde(default)]
    pub language: Language,

    #[serde(default = "default_profiles")]
    pub profiles: Vec<Profile>,
}

impl Default for ProvConfig {
    fn default() -> Self {
        Self {
            workflow_id: default_workflow_id(),
            orchestration_endpoint_id: String::new(),
            inbound_source: InboundSourcePath::default(),
            producer_policy: ProducerPolicy::default(),
            provenance_marker: default_marker(),
            context: default_context(),
            language: Language::default(),
            profiles: default_profiles(),
        }
    }
}

impl ProvConfig {
    /// Creates a default configuration for the given workflow and
    /// orchestration endpoint.
    pub fn new(workflow_id: impl Into<String>, orchestration_endpoint_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            orchestration_endpoint_id: orchestration_endpoint_id.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a YAML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: ProvConfig = serde_yaml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Parser options derived from this configuration.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            provenance_marker: self.provenance_marker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProvConfig::default();
        assert_eq!(config.workflow_id, "flow.json");
        assert_eq!(config.inbound_source, InboundSourcePath::Declared);
        assert_eq!(config.producer_policy, ProducerPolicy::Reject);
        assert_eq!(config.profiles.len(), 4);
        assert_eq!(config.profiles[0].id, "https://w3id.org/ro/wfrun/process/0.1");
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: ProvConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ProvConfig::default());
    }

    #[test]
    fn test_policies_from_yaml() {
        let config: ProvConfig = serde_yaml::from_str(
            "workflow_id: rs.json\ninbound_source: localized\nproducer_policy: last_writer_wins\nprovenance_marker: null\n",
        )
        .unwrap();
        assert_eq!(config.workflow_id, "rs.json");
        assert_eq!(config.inbound_source, InboundSourcePath::Localized);
        assert_eq!(config.producer_policy, ProducerPolicy::LastWriterWins);
        assert_eq!(config.parse_options().provenance_marker, None);
    }

    #[test]
    fn test_load_json_config() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"orchestration_endpoint_id": "orch"}"#).unwrap();

        let config = ProvConfig::load(&path).unwrap();
        assert_eq!(config.orchestration_endpoint_id, "orch");
        assert_eq!(config.workflow_id, "flow.json");
    }

    #[test]
    fn test_load_missing_config() {
        assert!(ProvConfig::load("/nonexistent/config.yaml").is_err());
    }
}

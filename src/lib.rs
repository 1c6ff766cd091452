//! flowprov - Prospective Provenance for Flow Plans
//!
//! Turns declarative, state-machine flow plans into linked-data provenance
//! graphs describing the workflow before it runs: its steps, the tools
//! behind them, their formal parameters and how data moves between them.
//! Flows can also be described by their tools alone, in which case the
//! data transfers between storage endpoints are inferred.
//!
//! # Architecture
//!
//! - [`plan`]: Flow plan model, reference resolution and traversal
//! - [`params`]: Formal parameters, tools and transfer inference
//! - [`graph`]: Provenance graph model and builder
//! - [`validation`]: Schema validation and partial graph comparison
//! - [`config`]: Build configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use flowprov::{build_from_plan, load_input, load_plan, ProvConfig, Validator};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plan = load_plan("flow.json")?;
//!     let input = load_input("input.json")?;
//!     let config = ProvConfig::new("flow.json", "b782400e-3e59-412c-8f73-56cd0782301f");
//!
//!     let graph = build_from_plan(&plan, &input, &config)?;
//!     Validator::default().validate(&graph.to_value()?)?;
//!     graph.save("ro-crate-metadata.json")?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod params;
pub mod plan;
pub mod validation;

pub use config::ProvConfig;
pub use error::{ProvError, Result};
pub use graph::{build_from_plan, build_from_tools, GraphDocument};
pub use params::{augmented_sequence, infer_transfers, ParameterRegistry, ToolManifest};
pub use plan::{load_input, load_plan, FlowPlan};
pub use validation::{Comparator, CrateCategory, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "flowprov";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "flowprov");
    }

    #[test]
    fn test_tools_graph_validates_end_to_end() {
        let registry = ToolManifest::from_yaml(include_str!("../fixtures/tools/chain.yaml"))
            .unwrap()
            .into_registry()
            .unwrap();
        let config = ProvConfig::new("chain.json", "b782400e-3e59-412c-8f73-56cd0782301f");

        let graph = build_from_tools(&registry, &config).unwrap();
        Validator::default().validate(&graph.to_value().unwrap()).unwrap();
    }

    #[test]
    fn test_generated_plan_builds_graph() {
        let registry = ToolManifest::from_yaml(include_str!("../fixtures/tools/chain.yaml"))
            .unwrap()
            .into_registry()
            .unwrap();
        let config = ProvConfig::new("chain.json", "b782400e-3e59-412c-8f73-56cd0782301f");

        let transfers = infer_transfers(registry.tools(), &config).unwrap();
        let flow = augmented_sequence(registry.tools(), &transfers).to_flow_plan(&config);
        let input = serde_json::json!({"input": {
            "compute_endpoint": "58fb6f2d-ff78-4f39-9669-38c12d01f566",
            "FuncA_function_id": "fa", "FuncA": {"a": 1},
            "FuncB_function_id": "fb", "FuncB": {"a": 1, "b": 2, "c": "intput.txt"},
            "FuncC_function_id": "fc", "FuncC": {"b": 2, "c": "input.txt"}
        }});
        let graph = build_from_plan(&flow, &input, &config).unwrap();
        Validator::default().validate(&graph.to_value().unwrap()).unwrap();

        assert!(graph.contains("chain.json#main/FuncA"));
        assert!(graph.contains("chain.json#main/FuncC"));
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}

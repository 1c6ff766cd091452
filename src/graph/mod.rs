//! Provenance Graph Module
//!
//! Linked-data graph documents and their construction from flow plans
//! or parameter registries.
//!
//! # Structure
//!
//! - [`model`]: Nodes, links and documents
//! - [`builder`]: Workflow, step, tool, parameter and connection nodes

pub mod builder;
pub mod model;

pub use builder::{build_from_plan, build_from_tools};
pub use model::{GraphDocument, GraphNode, Link, PropertyValue};

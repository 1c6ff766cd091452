//! Validation Module
//!
//! Schema validation of graph documents and category-scoped comparison
//! against reference documents.
//!
//! # Structure
//!
//! - [`schema`]: Per-type rule tables
//! - [`validator`]: Fail-fast schema validation
//! - [`category`]: Node categories and classifiers
//! - [`comparator`]: Partial graph comparison

pub mod category;
pub mod comparator;
pub mod schema;
pub mod validator;

pub use category::{classify_node, CrateCategory, DefaultClassifier, NodeClassifier};
pub use comparator::Comparator;
pub use schema::{SchemaRule, SchemaTable, PROVENANCE_DRAFT_SCHEMA};
pub use validator::Validator;

//! Parameter Flow Module
//!
//! Formal parameters, the tools using them, and the inference of the
//! transfers that move file parameters between endpoints.
//!
//! # Structure
//!
//! - [`formal`]: Formal parameters and their usages
//! - [`tool`]: Provenance and opaque tools
//! - [`registry`]: Checked registry of parameters and tools
//! - [`inference`]: Auto transfers and the augmented step sequence
//! - [`manifest`]: YAML/JSON tool declarations

pub mod formal;
pub mod inference;
pub mod manifest;
pub mod registry;
pub mod tool;

pub use formal::{Direction, FormalParameter, ParameterKind, ParameterUsage};
pub use inference::{
    augmented_sequence, infer_transfers, AutoTransfer, FlowSequence, SequenceEntry, TransferKind,
    TransferPlan,
};
pub use manifest::ToolManifest;
pub use registry::{ParameterRegistry, ParameterSummary};
pub use tool::{FileUsage, FunctionParameters, HasFileParameters, Tool, ToolStep};

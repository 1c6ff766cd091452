//! Flow Plan Module
//!
//! Data structures and parsing for state-machine flow plans.
//!
//! # Structure
//!
//! - [`model`]: Raw plan documents and typed step records
//! - [`resolver`]: Literal / lookup / expression field resolution
//! - [`parser`]: Traversal from the start state with cycle detection

pub mod model;
pub mod parser;
pub mod resolver;

pub use model::{ActionKind, ComputeStep, FlowPlan, PlanStep, State, Task, TransferItem, TransferStep};
pub use parser::{load_input, load_plan, parse_sequence, parse_states, ParseOptions};
pub use resolver::{resolve_field, FieldValue};

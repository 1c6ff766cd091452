//! Error Types
//!
//! Every failure in flowprov is a named condition carried by [`ProvError`].
//! Errors are never recovered locally: each one means the input documents
//! are structurally inconsistent and the provenance record built from them
//! could not be trusted.

use thiserror::Error;

/// All errors produced by plan parsing, inference, graph construction,
/// validation and comparison.
#[derive(Error, Debug)]
pub enum ProvError {
    // ─────────────────────────────────────────────────────────────
    // Flow plan traversal
    // ─────────────────────────────────────────────────────────────
    #[error("Loop detected in flow plan at state '{state}'")]
    CycleDetected { state: String },

    #[error("State '{state}' not found in flow plan (referenced from '{referenced_by}')")]
    UnknownState { state: String, referenced_by: String },

    #[error("State '{state}' has unknown action type '{action}'")]
    UnknownActionType { state: String, action: String },

    #[error("State '{state}' is malformed: {message}")]
    MalformedState { state: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Reference resolution
    // ─────────────────────────────────────────────────────────────
    #[error("Input reference '{path}' cannot be resolved: segment '{segment}' is missing")]
    MissingInputReference { path: String, segment: String },

    #[error("Field '{key}' uses an expression form, which is not evaluated")]
    UnsupportedExpressionForm { key: String },

    #[error("Field '{key}' is missing (no literal, lookup or expression form)")]
    MissingField { key: String },

    // ─────────────────────────────────────────────────────────────
    // Parameter registry and transfer inference
    // ─────────────────────────────────────────────────────────────
    #[error("Function name '{function}' is declared by more than one tool")]
    DuplicateFunctionName { function: String },

    #[error("Formal parameter '{name}' is declared more than once")]
    DuplicateParameterName { name: String },

    #[error("Function '{function}' uses undeclared formal parameter '{parameter}'")]
    UnknownParameter { function: String, parameter: String },

    #[error("Formal parameter '{parameter}' is produced by both '{first}' and '{second}'")]
    MultipleProducers {
        parameter: String,
        first: String,
        second: String,
    },

    #[error("Transfer '{state}' has no compute step on its {side} side")]
    UnattributedTransfer { state: String, side: String },

    // ─────────────────────────────────────────────────────────────
    // Graph documents and schema validation
    // ─────────────────────────────────────────────────────────────
    #[error("Node id '{id}' already exists with different content")]
    GraphIdCollision { id: String },

    #[error("Malformed graph document: {message}")]
    MalformedDocument { message: String },

    #[error("Node '{node}': type '{type_name}' is not declared in the schema")]
    SchemaTypeUnknown { node: String, type_name: String },

    #[error("Node '{node}': required key '{key}' is missing")]
    MissingRequiredKey { node: String, key: String },

    #[error("Node '{node}': key '{key}' is not allowed for its types")]
    DisallowedKey { node: String, key: String },

    #[error("Node '{node}': key '{key}' must hold a reference or list of references")]
    InvalidReferenceShape { node: String, key: String },

    #[error("Node '{node}': key '{key}' references unknown node '{target}'")]
    DanglingReference {
        node: String,
        key: String,
        target: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Partial comparison
    // ─────────────────────────────────────────────────────────────
    #[error("Contexts do not match: '{actual}' != '{expected}'")]
    ContextMismatch { actual: String, expected: String },

    #[error("Path: {path}\n{message}")]
    ComparisonFailed { path: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // I/O and decoding
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ProvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = ProvError::DanglingReference {
            node: "#step".to_string(),
            key: "workExample".to_string(),
            target: "#tool".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("#step"));
        assert!(msg.contains("workExample"));
        assert!(msg.contains("#tool"));
    }

    #[test]
    fn test_io_error_converts() {
        fn read() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/flowprov/file.json")?)
        }
        assert!(matches!(read(), Err(ProvError::Io(_))));
    }
}

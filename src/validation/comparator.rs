//! Partial Graph Comparison
//!
//! Compares a generated graph against a reference graph, restricted to
//! the node categories the caller cares about. A prospective build can
//! then be checked against a full fixture without the execution records
//! that do not exist yet.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, info};
use serde_json::{Map, Value};

use super::category::{CrateCategory, DefaultClassifier, NodeClassifier};
use crate::error::{ProvError, Result};

fn failure(path: &[String], message: String) -> ProvError {
    ProvError::ComparisonFailed {
        path: path.join(" | "),
        message,
    }
}

fn index_graph(doc: &Value) -> Result<IndexMap<String, Value>> {
    let graph = doc
        .get("@graph")
        .and_then(Value::as_array)
        .ok_or_else(|| ProvError::MalformedDocument {
            message: "'@graph' must be a list".to_string(),
        })?;

    let mut index = IndexMap::new();
    for node in graph {
        let id = node["@id"].as_str().ok_or_else(|| ProvError::MalformedDocument {
            message: format!("node without string '@id': {}", node),
        })?;
        index.insert(id.to_string(), node.clone());
    }
    Ok(index)
}

/// Compares documents against one expected document.
pub struct Comparator {
    context: Value,
    graph: IndexMap<String, Value>,
    /// Categories compared when present in the expected graph
    parts_to_check: Vec<CrateCategory>,
    /// Categories also compared when only referenced
    include_refs_to: Vec<CrateCategory>,
    classifier: Box<dyn NodeClassifier>,
    skip_ids: HashSet<String>,
}

impl Comparator {
    pub fn new(
        expected: &Value,
        parts_to_check: Vec<CrateCategory>,
        include_refs_to: Vec<CrateCategory>,
    ) -> Result<Self> {
        Ok(Self {
            context: expected.get("@context").cloned().unwrap_or(Value::Null),
            graph: index_graph(expected)?,
            parts_to_check,
            include_refs_to,
            classifier: Box::new(DefaultClassifier),
            skip_ids: HashSet::new(),
        })
    }

    /// Replaces the default category classifier.
    pub fn with_classifier(mut self, classifier: impl NodeClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Excludes top-level expected nodes from comparison.
    pub fn with_skip_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    fn category_of(&self, id: &str) -> Option<CrateCategory> {
        self.graph.get(id).map(|node| self.classifier.classify(node))
    }

    /// Decides whether a value takes part in the comparison.
    ///
    /// Non-objects always do. Objects whose id is not a node of the
    /// expected graph are external and always compared. Full nodes are
    /// compared when their category is checked; bare references also
    /// when their category is in the referenceable set.
    fn in_scope(&self, value: &Value) -> bool {
        let Value::Object(map) = value else {
            return true;
        };
        let Some(id) = map.get("@id").and_then(Value::as_str) else {
            return true;
        };
        let Some(category) = self.category_of(id) else {
            return true;
        };

        let is_reference = map.len() == 1;
        self.parts_to_check.contains(&category)
            || (is_reference && self.include_refs_to.contains(&category))
    }

    /// Checks `actual` against the expected document.
    pub fn compare(&self, actual: &Value) -> Result<()> {
        let actual_context = actual.get("@context").cloned().unwrap_or(Value::Null);
        if actual_context != self.context {
            return Err(ProvError::ContextMismatch {
                actual: actual_context.to_string(),
                expected: self.context.to_string(),
            });
        }

        let actual_graph = index_graph(actual)?;
        let mut compared = 0;

        for (id, expected) in &self.graph {
            if self.skip_ids.contains(id) || !self.in_scope(expected) {
                continue;
            }
            let path = vec!["@graph".to_string(), id.clone()];
            let found = actual_graph
                .get(id)
                .ok_or_else(|| failure(&path, format!("Key {} not in actual", id)))?;

            self.compare_values(expected, found, &path)?;
            compared += 1;
        }

        info!(
            "Compared {} of {} expected nodes",
            compared,
            self.graph.len()
        );
        Ok(())
    }

    fn compare_maps(
        &self,
        expected: &Map<String, Value>,
        actual: &Map<String, Value>,
        path: &[String],
    ) -> Result<()> {
        for (key, value) in expected {
            if !self.in_scope(value) {
                continue;
            }
            let mut key_path = path.to_vec();
            key_path.push(key.clone());

            let Some(found) = actual.get(key) else {
                // Lists holding only out-of-scope items are left out entirely.
                if let Value::Array(items) = value {
                    if !items.iter().any(|item| self.in_scope(item)) {
                        continue;
                    }
                }
                return Err(failure(&key_path, format!("Key {} not in actual", key)));
            };

            self.compare_values(value, found, &key_path)?;
        }
        Ok(())
    }

    fn compare_values(&self, expected: &Value, actual: &Value, path: &[String]) -> Result<()> {
        match (expected, actual) {
            (Value::Object(e), Value::Object(a)) => self.compare_maps(e, a, path),
            (Value::Object(_), _) => Err(failure(
                path,
                format!("Expected an object, found: {}", actual),
            )),
            (Value::Array(items), _) if items.first().map_or(false, Value::is_object) => {
                let expected_by_id = by_id(items.iter().filter(|i| self.in_scope(i)), path)?;
                let actual_by_id = match actual {
                    Value::Array(found) => by_id(found.iter(), path)?,
                    single => by_id(std::iter::once(single), path)?,
                };
                debug!(
                    "Comparing {} linked items at {}",
                    expected_by_id.len(),
                    path.join(" | ")
                );
                self.compare_maps(&expected_by_id, &actual_by_id, path)
            }
            _ if expected == actual => Ok(()),
            _ => Err(failure(
                path,
                format!(
                    "Value {}: {} does not match: {}",
                    path.last().map(String::as_str).unwrap_or_default(),
                    expected,
                    actual
                ),
            )),
        }
    }
}

/// Keys a list of linked items by their ids.
fn by_id<'v>(items: impl Iterator<Item = &'v Value>, path: &[String]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for item in items {
        let id = item["@id"]
            .as_str()
            .ok_or_else(|| failure(path, format!("Item without '@id': {}", item)))?;
        map.insert(id.to_string(), item.clone());
    }
    Ok(map)
}

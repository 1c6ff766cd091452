//! Graph Document Validation
//!
//! Checks a graph document against a [`SchemaTable`]:
//! - Document shape (`@context`, `@graph`, node ids and types)
//! - Known types and permitted keys
//! - Required keys
//! - Reference shape and reference integrity
//!
//! Validation stops at the first violation.

use std::collections::HashSet;

use log::{debug, info};
use serde_json::{Map, Value};

use super::schema::{SchemaRule, SchemaTable, BASE_TYPE, EXEMPT_REFERENCE_KEYS, PROVENANCE_DRAFT_SCHEMA};
use crate::error::{ProvError, Result};

/// True if a value is one reference (`{"@id": "..."}` and nothing else)
/// or a list of such references. Empty lists count as references.
pub fn is_reference(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_single_reference),
        other => is_single_reference(other),
    }
}

fn is_single_reference(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.len() == 1 && map.get("@id").map_or(false, Value::is_string),
        _ => false,
    }
}

/// Ids of a reference or list of references, or `None` if the value is
/// not a valid reference shape.
pub fn reference_ids(value: &Value) -> Option<Vec<&str>> {
    if !is_reference(value) {
        return None;
    }
    let ids = match value {
        Value::Array(items) => items.iter().filter_map(|i| i["@id"].as_str()).collect(),
        single => single["@id"].as_str().into_iter().collect(),
    };
    Some(ids)
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn malformed(message: impl Into<String>) -> ProvError {
    ProvError::MalformedDocument {
        message: message.into(),
    }
}

/// Validates graph documents against a schema table.
pub struct Validator<'s> {
    schema: &'s SchemaTable,
}

impl Default for Validator<'static> {
    fn default() -> Self {
        Self::new(&PROVENANCE_DRAFT_SCHEMA)
    }
}

impl<'s> Validator<'s> {
    pub fn new(schema: &'s SchemaTable) -> Self {
        Self { schema }
    }

    /// Validates a whole document, failing on the first violation.
    pub fn validate(&self, doc: &Value) -> Result<()> {
        doc.get("@context")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("'@context' must be a string"))?;

        let graph = doc
            .get("@graph")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("'@graph' must be a list"))?;

        let mut ids = HashSet::new();
        let mut nodes = Vec::with_capacity(graph.len());
        for (i, item) in graph.iter().enumerate() {
            let node = item
                .as_object()
                .ok_or_else(|| malformed(format!("@graph[{}] is not an object", i)))?;
            let id = node
                .get("@id")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(format!("@graph[{}] has no string '@id'", i)))?;
            if !ids.insert(id) {
                return Err(ProvError::GraphIdCollision { id: id.to_string() });
            }
            nodes.push((id, node));
        }

        for (id, node) in &nodes {
            self.validate_node(id, node, &ids)?;
        }

        info!("Validated {} nodes", nodes.len());
        Ok(())
    }

    fn rules_for(&self, id: &str, node: &Map<String, Value>) -> Result<Vec<&'s SchemaRule>> {
        let types: Vec<&str> = match node.get("@type") {
            Some(Value::String(single)) => vec![single.as_str()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        malformed(format!("node '{}' has a non-string '@type' entry: {}", id, item))
                    })
                })
                .collect::<Result<_>>()?,
            _ => Vec::new(),
        };
        if types.is_empty() {
            return Err(malformed(format!("node '{}' has no '@type'", id)));
        }

        std::iter::once(BASE_TYPE)
            .chain(types)
            .map(|type_name| {
                self.schema
                    .get(type_name)
                    .ok_or_else(|| ProvError::SchemaTypeUnknown {
                        node: id.to_string(),
                        type_name: type_name.to_string(),
                    })
            })
            .collect()
    }

    fn validate_node(&self, id: &str, node: &Map<String, Value>, ids: &HashSet<&str>) -> Result<()> {
        let rules = self.rules_for(id, node)?;

        let keys = node.keys().filter(|k| *k != "@id" && *k != "@type");

        for key in keys.clone() {
            if !rules.iter().any(|rule| rule.permits(key)) {
                return Err(ProvError::DisallowedKey {
                    node: id.to_string(),
                    key: key.clone(),
                });
            }
        }

        for required in rules.iter().flat_map(|rule| rule.required.iter()) {
            if !node.contains_key(required) {
                return Err(ProvError::MissingRequiredKey {
                    node: id.to_string(),
                    key: required.clone(),
                });
            }
        }

        for key in keys {
            let value = &node[key];
            if rules.iter().any(|rule| rule.is_reference(key)) {
                let targets = reference_ids(value).ok_or_else(|| ProvError::InvalidReferenceShape {
                    node: id.to_string(),
                    key: key.clone(),
                })?;
                if EXEMPT_REFERENCE_KEYS.contains(&key.as_str()) {
                    continue;
                }
                if let Some(target) = targets.into_iter().find(|t| !ids.contains(t)) {
                    return Err(ProvError::DanglingReference {
                        node: id.to_string(),
                        key: key.clone(),
                        target: target.to_string(),
                    });
                }
            } else {
                let plain = match value {
                    Value::Array(items) => items.iter().all(is_scalar),
                    other => is_scalar(other),
                };
                if !plain {
                    return Err(malformed(format!(
                        "node '{}': key '{}' must hold a plain value",
                        id, key
                    )));
                }
            }
        }

        debug!("Node '{}' is valid", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvConfig;
    use crate::graph::builder::build_from_plan;
    use crate::graph::model::PropertyValue;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "@context": "https://w3id.org/ro/crate/1.1/context",
            "@graph": [
                {
                    "@id": "wf#main/step",
                    "@type": "HowToStep",
                    "position": "0",
                    "workExample": {"@id": "wf#tool"}
                },
                {
                    "@id": "wf#tool",
                    "@type": "SoftwareApplication",
                    "name": "tool",
                    "input": [],
                    "url": {"@id": "https://example.org/tool"}
                }
            ]
        })
    }

    fn node_mut(doc: &mut Value, i: usize) -> &mut Map<String, Value> {
        doc["@graph"][i].as_object_mut().unwrap()
    }

    #[test]
    fn test_reference_shapes() {
        assert!(is_reference(&json!({"@id": "id"})));
        assert!(!is_reference(&json!({"@id": "id", "other": "stuff"})));
        assert!(!is_reference(&json!({"@id": 5})));
        assert!(!is_reference(&json!({})));

        assert!(is_reference(&json!([{"@id": "id"}, {"@id": "id2"}])));
        assert!(is_reference(&json!([])));
        assert!(!is_reference(&json!([{"@id": "id"}, {}])));
        assert!(!is_reference(&json!([{"@id": "id"}, 5])));
        assert!(!is_reference(&json!([[{"@id": "id"}]])));
    }

    #[test]
    fn test_reference_ids() {
        assert_eq!(reference_ids(&json!({"@id": "id"})), Some(vec!["id"]));
        assert_eq!(
            reference_ids(&json!([{"@id": "id"}, {"@id": "id2"}])),
            Some(vec!["id", "id2"])
        );
        assert_eq!(reference_ids(&json!({"@id": "id", "other": "stuff"})), None);
    }

    #[test]
    fn test_minimal_document_passes() {
        Validator::default().validate(&minimal()).unwrap();
    }

    #[test]
    fn test_disallowed_key_then_pass() {
        let mut doc = minimal();
        node_mut(&mut doc, 0).insert("color".into(), json!("blue"));

        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::DisallowedKey { ref node, ref key } if node == "wf#main/step" && key == "color"));

        node_mut(&mut doc, 0).remove("color");
        assert!(Validator::default().validate(&doc).is_ok());
    }

    #[test]
    fn test_missing_required_key() {
        let mut doc = minimal();
        node_mut(&mut doc, 0).remove("position");
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::MissingRequiredKey { key, .. } if key == "position"));
    }

    #[test]
    fn test_unknown_type() {
        let mut doc = minimal();
        node_mut(&mut doc, 1).insert("@type".into(), json!(["SoftwareApplication", "Robot"]));
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::SchemaTypeUnknown { type_name, .. } if type_name == "Robot"));
    }

    #[test]
    fn test_dangling_reference() {
        let mut doc = minimal();
        node_mut(&mut doc, 0).insert("workExample".into(), json!({"@id": "wf#ghost"}));
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::DanglingReference { target, .. } if target == "wf#ghost"));
    }

    #[test]
    fn test_exempt_keys_may_point_outside() {
        let mut doc = minimal();
        let tool = node_mut(&mut doc, 1);
        tool.insert("identifier".into(), json!({"@id": "https://doi.org/10.5281/zenodo.1"}));
        tool.insert("url".into(), json!({"@id": "missing"}));
        Validator::default().validate(&doc).unwrap();

        let dataset = json!({
            "@id": "./",
            "@type": "Dataset",
            "conformsTo": [{"@id": "https://w3id.org/ro/wfrun/process/0.1"}],
            "hasPart": [{"@id": "wf#tool"}],
            "mainEntity": {"@id": "wf#tool"}
        });
        doc["@graph"].as_array_mut().unwrap().push(dataset);
        Validator::default().validate(&doc).unwrap();
    }

    #[test]
    fn test_other_reference_keys_must_resolve() {
        let mut doc = minimal();
        node_mut(&mut doc, 1).insert("input".into(), json!([{"@id": "missing"}]));
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(
            err,
            ProvError::DanglingReference { node, key, target }
                if node == "wf#tool" && key == "input" && target == "missing"
        ));
    }

    #[test]
    fn test_repeated_id_rejected() {
        let doc = json!({
            "@context": "https://w3id.org/ro/crate/1.1/context",
            "@graph": [
                {"@id": "wf#a", "@type": "Thing", "name": "one"},
                {"@id": "wf#a", "@type": "Thing", "name": "two"}
            ]
        });
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::GraphIdCollision { id } if id == "wf#a"));
    }

    #[test]
    fn test_non_string_type_entry_rejected() {
        let mut doc = minimal();
        node_mut(&mut doc, 1).insert("@type".into(), json!(["SoftwareApplication", 7]));
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::MalformedDocument { message } if message.contains("wf#tool")));
    }

    #[test]
    fn test_invalid_reference_shape() {
        let mut doc = minimal();
        node_mut(&mut doc, 0).insert("workExample".into(), json!("wf#tool"));
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::InvalidReferenceShape { key, .. } if key == "workExample"));
    }

    #[test]
    fn test_non_reference_must_be_plain() {
        let mut doc = minimal();
        node_mut(&mut doc, 1).insert("name".into(), json!({"@id": "wf#tool"}));
        let err = Validator::default().validate(&doc).unwrap_err();
        assert!(matches!(err, ProvError::MalformedDocument { .. }));
    }

    #[test]
    fn test_malformed_documents() {
        let validator = Validator::default();
        assert!(matches!(
            validator.validate(&json!({"@graph": []})),
            Err(ProvError::MalformedDocument { .. })
        ));
        assert!(matches!(
            validator.validate(&json!({"@context": "c", "@graph": [{"@type": "Thing"}]})),
            Err(ProvError::MalformedDocument { .. })
        ));
        assert!(matches!(
            validator.validate(&json!({"@context": "c", "@graph": [{"@id": "x", "@type": []}]})),
            Err(ProvError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_custom_schema() {
        let schema = SchemaTable::from_yaml("Thing:\n  allowed: [name]\nWidget: {}\n").unwrap();
        let doc = json!({"@context": "c", "@graph": [{"@id": "w", "@type": "Widget", "name": "w"}]});
        Validator::new(&schema).validate(&doc).unwrap();
    }

    #[test]
    fn test_built_graph_validates() {
        let plan = serde_json::from_str(include_str!("../../fixtures/globus_prov/plan.json")).unwrap();
        let input = serde_json::from_str(include_str!("../../fixtures/globus_prov/input.json")).unwrap();
        let config = ProvConfig::new("reverse_sort.json", "b782400e-3e59-412c-8f73-56cd0782301f");

        let mut graph = build_from_plan(&plan, &input, &config).unwrap();
        Validator::default().validate(&graph.to_value().unwrap()).unwrap();

        graph
            .set_property("reverse_sort.json#main/RevTxt", "mood", PropertyValue::text("calm"))
            .unwrap();
        let err = Validator::default().validate(&graph.to_value().unwrap()).unwrap_err();
        assert!(matches!(err, ProvError::DisallowedKey { key, .. } if key == "mood"));
    }
}

//! Graph Document Model
//!
//! Linked-data nodes and the document holding them. Nodes refer to each
//! other through [`Link`]s, never by inlining.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{ProvError, Result};

/// A reference to another node by id.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Link {
    #[serde(rename = "@id")]
    pub id: String,
}

impl Link {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Value of a node property.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Link(Link),
    Links(Vec<Link>),
    Texts(Vec<String>),
}

impl PropertyValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn link(id: impl Into<String>) -> Self {
        Self::Link(Link::new(id))
    }

    pub fn links<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Links(ids.into_iter().map(Link::new).collect())
    }
}

/// One node of a graph document.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub types: Vec<String>,
    pub properties: IndexMap<String, PropertyValue>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, types: &[&str]) -> Self {
        Self {
            id: id.into(),
            types: types.iter().map(|t| t.to_string()).collect(),
            properties: IndexMap::new(),
        }
    }

    /// Sets a property, builder style.
    pub fn with(mut self, key: &str, value: PropertyValue) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Sets a property only when a value is given.
    pub fn with_opt(self, key: &str, value: Option<PropertyValue>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }
}

impl Serialize for GraphNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len() + 2))?;
        map.serialize_entry("@id", &self.id)?;
        match self.types.as_slice() {
            [single] => map.serialize_entry("@type", single)?,
            many => map.serialize_entry("@type", many)?,
        }
        for (key, value) in &self.properties {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A complete graph document: a context and the ordered node list.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GraphDocument {
    #[serde(rename = "@context")]
    pub context: String,

    #[serde(rename = "@graph")]
    nodes: Vec<GraphNode>,

    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl GraphDocument {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Adds a node. Re-adding a node with identical content is a no-op;
    /// a different node under an existing id is a collision.
    pub fn add_node(&mut self, node: GraphNode) -> Result<()> {
        if let Some(&i) = self.index.get(&node.id) {
            if self.nodes[i] == node {
                debug!("Node '{}' already present", node.id);
                return Ok(());
            }
            return Err(ProvError::GraphIdCollision { id: node.id });
        }

        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Patches a property of an existing node after construction.
    pub fn set_property(&mut self, id: &str, key: &str, value: PropertyValue) -> Result<()> {
        let i = *self.index.get(id).ok_or_else(|| ProvError::MalformedDocument {
            message: format!("cannot set '{}' on unknown node '{}'", key, id),
        })?;
        self.nodes[i].properties.insert(key.to_string(), value);
        Ok(())
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the document as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json_pretty()?)?;
        info!("Saved graph document ({} nodes) to {}", self.len(), path.display());
        Ok(())
    }
}

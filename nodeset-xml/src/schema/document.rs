use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::node_id::{NodeIdVariant, ParsedNodeId};

use super::node::UaNode;

/// URI of the base OPC UA namespace, index 0 in every document.
pub const BASE_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelInfo {
    pub uri: String,
    pub version: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
}

/// One NodeSet document after parsing, before any cross-document resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub namespace_uri: String,
    pub model: Option<ModelInfo>,
    /// Required models in declaration order.
    pub required_models: Vec<ModelInfo>,
    pub nodes: BTreeMap<NodeIdVariant, UaNode>,
    /// Document-local namespace index to namespace URI.
    pub namespace_index_map: BTreeMap<u16, String>,
    /// Alias name to node id string.
    pub alias_map: BTreeMap<String, String>,
    pub has_custom_types: bool,
}

impl Default for ParsedDocument {
    fn default() -> Self {
        let mut namespace_index_map = BTreeMap::new();
        namespace_index_map.insert(0, BASE_NAMESPACE_URI.to_owned());
        Self {
            namespace_uri: String::new(),
            model: None,
            required_models: Vec::new(),
            nodes: BTreeMap::new(),
            namespace_index_map,
            alias_map: BTreeMap::new(),
            has_custom_types: false,
        }
    }
}

impl ParsedDocument {
    pub fn is_base_namespace(&self) -> bool {
        self.namespace_uri == BASE_NAMESPACE_URI
    }

    pub fn node(&self, identifier: &NodeIdVariant) -> Option<&UaNode> {
        self.nodes.get(identifier)
    }

    pub fn node_mut(&mut self, identifier: &NodeIdVariant) -> Option<&mut UaNode> {
        self.nodes.get_mut(identifier)
    }

    /// Look up a node by id string, ignoring the namespace index.
    pub fn find_node(&self, node_id: &str) -> Option<&UaNode> {
        let parsed = ParsedNodeId::parse(node_id).ok()?;
        self.nodes.get(&parsed.value)
    }

    pub fn namespace_for_index(&self, index: u16) -> Option<&str> {
        self.namespace_index_map.get(&index).map(|s| s.as_str())
    }

    pub fn index_for_namespace(&self, uri: &str) -> Option<u16> {
        self.namespace_index_map
            .iter()
            .find(|(_, v)| v.as_str() == uri)
            .map(|(k, _)| *k)
    }

    /// Resolve an alias to its node id, or return the input if it is not an alias.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.alias_map.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    /// Reverse alias lookup: the alias naming `node_id`, if any.
    pub fn alias_for(&self, node_id: &str) -> Option<&str> {
        self.alias_map
            .iter()
            .find(|(_, v)| v.as_str() == node_id)
            .map(|(k, _)| k.as_str())
    }

    pub fn required_model_uris(&self) -> impl Iterator<Item = &str> {
        self.required_models.iter().map(|m| m.uri.as_str())
    }
}

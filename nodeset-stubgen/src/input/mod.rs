use std::{collections::HashMap, path::PathBuf};

use log::warn;
use nodeset_xml::{NodeRef, ParsedDocument, UaNode};

mod discovery;

pub use discovery::{CompanionFiles, FileSelectionPolicy, NodeSetDirectory};

/// A parsed document and the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: Option<PathBuf>,
    pub document: ParsedDocument,
}

impl LoadedDocument {
    pub fn new(path: Option<PathBuf>, document: ParsedDocument) -> Self {
        Self { path, document }
    }

    pub fn uri(&self) -> &str {
        &self.document.namespace_uri
    }
}

/// All documents of one session, addressed by namespace URI or by their
/// stable insertion index. [`NodeRef::document`] is that index.
#[derive(Debug, Default)]
pub struct DocumentCache {
    aliases: HashMap<String, usize>,
    items: Vec<LoadedDocument>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: LoadedDocument) -> usize {
        let idx = self.items.len();
        self.aliases.insert(document.uri().to_owned(), idx);
        self.items.push(document);
        idx
    }

    pub fn get(&self, uri: &str) -> Option<&LoadedDocument> {
        let idx = self.aliases.get(uri)?;
        self.items.get(*idx)
    }

    pub fn index_of(&self, uri: &str) -> Option<usize> {
        self.aliases.get(uri).copied()
    }

    pub fn get_by_index(&self, index: usize) -> Option<&LoadedDocument> {
        self.items.get(index)
    }

    pub(crate) fn document_mut(&mut self, index: usize) -> Option<&mut ParsedDocument> {
        self.items.get_mut(index).map(|d| &mut d.document)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedDocument> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn node(&self, node: &NodeRef) -> Option<&UaNode> {
        self.items.get(node.document)?.document.node(&node.identifier)
    }

    pub(crate) fn node_mut(&mut self, node: &NodeRef) -> Option<&mut UaNode> {
        self.items
            .get_mut(node.document)?
            .document
            .node_mut(&node.identifier)
    }

    /// Find a node by namespace URI and node id. The namespace index in
    /// `node_id` is ignored, since it is local to some other document.
    pub fn find(&self, uri: &str, node_id: &str) -> Option<NodeRef> {
        let document = self.index_of(uri)?;
        let node = self.items[document].document.find_node(node_id)?;
        Some(NodeRef::new(document, node.identifier.clone()))
    }

    /// Every node in the cache, in document then identifier order.
    pub fn node_refs(&self) -> Vec<NodeRef> {
        self.items
            .iter()
            .enumerate()
            .flat_map(|(idx, doc)| {
                doc.document
                    .nodes
                    .keys()
                    .map(move |id| NodeRef::new(idx, id.clone()))
            })
            .collect()
    }

    /// Report required models that are not part of the cache. Returns the
    /// number of missing models.
    pub fn validate(&self) -> usize {
        let mut missing = 0;
        for doc in &self.items {
            for required in doc.document.required_model_uris() {
                if self.get(required).is_none() {
                    warn!(
                        "Nodeset {} requires {}, which is not loaded",
                        doc.uri(),
                        required
                    );
                    missing += 1;
                }
            }
        }
        missing
    }
}

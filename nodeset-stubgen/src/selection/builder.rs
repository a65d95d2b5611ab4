use std::collections::HashSet;

use log::{debug, warn};
use nodeset_xml::{NodeRef, ParsedNodeId, UaNode};

use crate::{input::DocumentCache, resolve::KnownReference, StubGenError};

use super::{ItemId, ReferenceLink, SelectionTree, TreeItem};

/// Browse names of modelling rule and argument holder nodes, never members.
const MARKER_NAMES: [&str; 3] = ["Mandatory", "Optional", "Arguments"];

fn is_member(node: &UaNode) -> bool {
    node.class().is_instance() && !MARKER_NAMES.iter().any(|m| node.browse_name.contains(m))
}

/// Forward references of `node` that lead to members, with the link to
/// record on the cloned child.
fn member_edges(documents: &DocumentCache, node: &NodeRef) -> Vec<(ReferenceLink, NodeRef)> {
    let (Some(doc), Some(source)) = (documents.get_by_index(node.document), documents.node(node))
    else {
        return Vec::new();
    };
    let doc = &doc.document;
    let mut edges = Vec::new();
    for reference in source.references.iter().filter(|r| r.is_forward) {
        let Some(target) = &reference.target else {
            continue;
        };
        if !documents.node(target).is_some_and(is_member) {
            continue;
        }
        let node_id = doc.resolve_alias(&reference.reference_type).to_owned();
        let name = match doc.alias_for(&reference.reference_type) {
            Some(alias) => alias.to_owned(),
            None => reference.reference_type.clone(),
        };
        let namespace_uri = ParsedNodeId::parse(&node_id)
            .ok()
            .and_then(|id| doc.namespace_for_index(id.namespace))
            .unwrap_or_default()
            .to_owned();
        edges.push((
            ReferenceLink {
                name,
                node_id,
                namespace_uri,
            },
            target.clone(),
        ));
    }
    edges
}

/// Supertypes and type definitions reachable backwards from `start`, nearest
/// first.
fn collect_inherited(documents: &DocumentCache, start: &NodeRef) -> Vec<NodeRef> {
    let mut seen = HashSet::from([start.clone()]);
    let mut out = Vec::new();
    collect_inherited_into(documents, start, &mut seen, &mut out);
    out
}

fn collect_inherited_into(
    documents: &DocumentCache,
    node: &NodeRef,
    seen: &mut HashSet<NodeRef>,
    out: &mut Vec<NodeRef>,
) {
    let (Some(doc), Some(source)) = (documents.get_by_index(node.document), documents.node(node))
    else {
        return;
    };
    for reference in source.references.iter().filter(|r| !r.is_forward) {
        let inherits = KnownReference::HasSubtype.matches(&doc.document, &reference.reference_type)
            || KnownReference::HasTypeDefinition.matches(&doc.document, &reference.reference_type);
        if !inherits {
            continue;
        }
        let Some(target) = &reference.target else {
            continue;
        };
        if seen.insert(target.clone()) {
            out.push(target.clone());
            collect_inherited_into(documents, target, seen, out);
        }
    }
}

impl SelectionTree {
    /// Instantiate `source` as a new root with its declared and inherited
    /// members. In a selection tree the root is selected, which selects its
    /// mandatory members.
    pub fn add_root(
        &mut self,
        documents: &DocumentCache,
        source: &NodeRef,
    ) -> Result<ItemId, StubGenError> {
        let node = documents.node(source).ok_or_else(|| {
            StubGenError::not_found(format!(
                "node {} in document {}",
                source.identifier, source.document
            ))
        })?;
        let mut clone = node.clone();
        clone.is_root_node = true;
        let base_browse_name = clone.browse_name.clone();
        if self.unique_names {
            clone.browse_name = self.make_unique(&base_browse_name);
        }
        let root = self.insert(
            TreeItem::new(clone, source.clone(), base_browse_name, None),
            None,
        );

        let mut expanding = HashSet::new();
        self.expand_members(documents, root, source, source.document, &mut expanding);

        for ancestor in collect_inherited(documents, source) {
            debug!("Adding members inherited from {:?}", ancestor);
            for (link, target) in member_edges(documents, &ancestor) {
                self.attach(documents, root, link, &target, source.document, &mut expanding);
            }
        }

        if self.unique_names {
            self.set_selected(root, true);
        }
        Ok(root)
    }

    /// Add a root by namespace URI and node id.
    pub fn add_root_by_id(
        &mut self,
        documents: &DocumentCache,
        uri: &str,
        node_id: &str,
    ) -> Result<ItemId, StubGenError> {
        let source = documents
            .find(uri, node_id)
            .ok_or_else(|| StubGenError::not_found(format!("node {node_id} in {uri}")))?;
        self.add_root(documents, &source)
    }

    fn expand_members(
        &mut self,
        documents: &DocumentCache,
        item: ItemId,
        source: &NodeRef,
        root_document: usize,
        expanding: &mut HashSet<NodeRef>,
    ) {
        if !expanding.insert(source.clone()) {
            debug!("Not expanding {:?} again inside its own expansion", source);
            return;
        }
        for (link, target) in member_edges(documents, source) {
            self.attach(documents, item, link, &target, root_document, expanding);
        }
        expanding.remove(source);
    }

    fn attach(
        &mut self,
        documents: &DocumentCache,
        parent: ItemId,
        link: ReferenceLink,
        target: &NodeRef,
        root_document: usize,
        expanding: &mut HashSet<NodeRef>,
    ) {
        let Some(node) = documents.node(target) else {
            return;
        };
        let mut clone = node.clone();
        clone.is_root_node = false;
        let base_browse_name = clone.browse_name.clone();
        if self.unique_names {
            clone.browse_name = self.make_unique(&base_browse_name);
        }
        remap_namespace(documents, &mut clone, root_document);

        let child = self.insert(
            TreeItem::new(clone, target.clone(), base_browse_name, Some(link)),
            Some(parent),
        );
        self.expand_members(documents, child, target, root_document, expanding);
    }
}

/// Rewrite the namespace index of a member cloned from another document to
/// the index the root's document uses for it.
fn remap_namespace(documents: &DocumentCache, node: &mut UaNode, root_document: usize) {
    let Some(root) = documents.get_by_index(root_document) else {
        return;
    };
    if node.namespace_uri == root.uri() {
        return;
    }
    match root.document.index_for_namespace(&node.namespace_uri) {
        Some(index) => {
            if let Err(e) = node.set_namespace_index(index) {
                warn!("Could not remap {}: {e}", node.node_id);
            }
        }
        None => warn!(
            "Namespace {} of {} is not known to {}, keeping its node id",
            node.namespace_uri,
            node.node_id,
            root.uri()
        ),
    }
}

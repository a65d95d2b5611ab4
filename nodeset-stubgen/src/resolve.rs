//! Cross-document linking of a session's parsed documents.
//!
//! Each pass completes over every document before the next one starts. A
//! lookup miss is logged and leaves the link empty.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use nodeset_xml::{
    node_id::strip_namespace_prefix, DataTypeInfo, NodeClass, NodeKind, NodeRef, ParsedDocument,
    ParsedNodeId,
};

use crate::input::DocumentCache;

/// Reference types the resolver and the tree builder act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownReference {
    Organizes,
    HasModellingRule,
    HasEncoding,
    HasTypeDefinition,
    HasSubtype,
    HasProperty,
    HasComponent,
}

impl KnownReference {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Organizes => "Organizes",
            Self::HasModellingRule => "HasModellingRule",
            Self::HasEncoding => "HasEncoding",
            Self::HasTypeDefinition => "HasTypeDefinition",
            Self::HasSubtype => "HasSubtype",
            Self::HasProperty => "HasProperty",
            Self::HasComponent => "HasComponent",
        }
    }

    pub fn node_id(&self) -> &'static str {
        match self {
            Self::Organizes => "i=35",
            Self::HasModellingRule => "i=37",
            Self::HasEncoding => "i=38",
            Self::HasTypeDefinition => "i=40",
            Self::HasSubtype => "i=45",
            Self::HasProperty => "i=46",
            Self::HasComponent => "i=47",
        }
    }

    /// Whether `reference_type`, as written in `document`, names this type
    /// either directly or through the document's aliases.
    pub fn matches(&self, document: &ParsedDocument, reference_type: &str) -> bool {
        reference_type == self.name() || document.resolve_alias(reference_type) == self.node_id()
    }
}

/// Counts of links the resolver could not establish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub unresolved_parents: usize,
    pub unresolved_references: usize,
    pub unresolved_data_types: usize,
    pub missing_required_models: usize,
}

impl ResolveReport {
    pub fn is_complete(&self) -> bool {
        *self == Self::default()
    }
}

/// Run all resolution passes over the cache.
pub fn resolve(documents: &mut DocumentCache) -> ResolveReport {
    let mut report = ResolveReport {
        missing_required_models: documents.validate(),
        ..Default::default()
    };
    link_parents(documents, &mut report);
    link_references(documents, &mut report);
    inherit_data_type_fields(documents);
    link_data_types(documents, &mut report);
    link_methods(documents);
    info!(
        "Resolved {} documents, {} unresolved references, {} unresolved data types",
        documents.len(),
        report.unresolved_references,
        report.unresolved_data_types
    );
    report
}

fn link_parents(documents: &mut DocumentCache, report: &mut ResolveReport) {
    for index in 0..documents.len() {
        let Some(doc) = documents.get_by_index(index) else {
            continue;
        };
        let mut links = Vec::new();
        for node in doc.document.nodes.values() {
            if node.parent_node_id.is_empty() {
                continue;
            }
            match doc.document.find_node(&node.parent_node_id) {
                Some(parent) => links.push((
                    NodeRef::new(index, node.identifier.clone()),
                    NodeRef::new(index, parent.identifier.clone()),
                )),
                None => {
                    warn!(
                        "Parent {} of {} not found in {}",
                        node.parent_node_id,
                        node.node_id,
                        doc.uri()
                    );
                    report.unresolved_parents += 1;
                }
            }
        }
        for (node, parent) in links {
            if let Some(node) = documents.node_mut(&node) {
                node.parent_node = Some(parent);
            }
        }
    }
}

/// Depth-first walk over the reference graph, visiting every node once.
fn link_references(documents: &mut DocumentCache, report: &mut ResolveReport) {
    let mut visited: HashSet<NodeRef> = HashSet::new();
    for start in documents.node_refs() {
        if visited.contains(&start) {
            continue;
        }
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let (targets, optional) = resolve_node_references(documents, &current, report);
            let Some(node) = documents.node_mut(&current) else {
                continue;
            };
            for (reference, target) in node.references.iter_mut().zip(targets.iter()) {
                reference.target = target.clone();
            }
            if optional {
                node.mark_optional();
            }
            stack.extend(
                targets
                    .into_iter()
                    .flatten()
                    .filter(|t| !visited.contains(t)),
            );
        }
    }
}

/// Locate the target of each reference of `current`. Also reports whether a
/// modelling rule marks the node optional.
fn resolve_node_references(
    documents: &DocumentCache,
    current: &NodeRef,
    report: &mut ResolveReport,
) -> (Vec<Option<NodeRef>>, bool) {
    let (Some(doc), Some(node)) = (
        documents.get_by_index(current.document),
        documents.node(current),
    ) else {
        return (Vec::new(), false);
    };
    let mut optional = false;
    let mut targets = Vec::with_capacity(node.references.len());
    for reference in &node.references {
        let target = reference
            .namespace_uri
            .as_deref()
            .and_then(|uri| documents.find(uri, &reference.target_node_id));
        if target.is_none() {
            warn!(
                "Reference target {} ({}) of {} in {} could not be resolved",
                reference.target_node_id,
                reference.namespace_uri.as_deref().unwrap_or("unknown namespace"),
                node.node_id,
                doc.uri()
            );
            report.unresolved_references += 1;
        }
        if let Some(target_node) = target.as_ref().and_then(|t| documents.node(t)) {
            if KnownReference::HasModellingRule.matches(&doc.document, &reference.reference_type)
                && target_node.browse_name.contains("Optional")
            {
                optional = true;
            }
        }
        targets.push(target);
    }
    (targets, optional)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

/// Flatten data type inheritance, so each DataType carries the fields of all
/// its supertypes. Cycles in the subtype graph are cut at the first revisit.
fn inherit_data_type_fields(documents: &mut DocumentCache) {
    let mut state = HashMap::new();
    for node in documents.node_refs() {
        inherit_fields_from_supertypes(documents, &node, &mut state);
    }
}

fn inherit_fields_from_supertypes(
    documents: &mut DocumentCache,
    node: &NodeRef,
    state: &mut HashMap<NodeRef, VisitState>,
) {
    if state.contains_key(node) {
        return;
    }
    let supertypes: Vec<NodeRef> = match (
        documents.node(node),
        documents.get_by_index(node.document),
    ) {
        (Some(n), Some(doc)) if n.class() == NodeClass::DataType => n
            .references
            .iter()
            .filter(|r| !r.is_forward && KnownReference::HasSubtype.matches(&doc.document, &r.reference_type))
            .filter_map(|r| r.target.clone())
            .collect(),
        _ => return,
    };
    state.insert(node.clone(), VisitState::Visiting);

    for supertype in supertypes {
        if state.get(&supertype) == Some(&VisitState::Visiting) {
            debug!("Subtype cycle between {:?} and {:?}", node, supertype);
            continue;
        }
        inherit_fields_from_supertypes(documents, &supertype, state);
        let Some(fields) = documents
            .node(&supertype)
            .and_then(|s| s.data_type().ok())
            .map(|d| d.fields.clone())
        else {
            continue;
        };
        if let Some(info) = documents.node_mut(node).and_then(|n| n.data_type_mut().ok()) {
            info.inherit_fields(&fields);
        }
    }
    state.insert(node.clone(), VisitState::Done);
}

/// Find the DataType node a declared data type name refers to. The name is an
/// alias or a node id local to `document`.
pub(crate) fn find_data_type(
    documents: &DocumentCache,
    document: usize,
    declared: &str,
) -> Option<NodeRef> {
    let doc = &documents.get_by_index(document)?.document;
    let id = ParsedNodeId::parse(doc.resolve_alias(declared)).ok()?;
    let is_data_type = |r: &NodeRef| {
        documents
            .node(r)
            .is_some_and(|n| n.class() == NodeClass::DataType)
    };

    if let Some(uri) = doc.namespace_for_index(id.namespace) {
        if let Some(index) = documents.index_of(uri) {
            let candidate = NodeRef::new(index, id.value.clone());
            if is_data_type(&candidate) {
                return Some(candidate);
            }
        }
    }
    (0..documents.len())
        .map(|index| NodeRef::new(index, id.value.clone()))
        .find(is_data_type)
}

fn link_data_types(documents: &mut DocumentCache, report: &mut ResolveReport) {
    let mut links: Vec<(NodeRef, DataTypeInfo)> = Vec::new();
    for node_ref in documents.node_refs() {
        let Some(node) = documents.node(&node_ref) else {
            continue;
        };
        if !matches!(node.kind, NodeKind::Variable(_) | NodeKind::VariableType { .. }) {
            continue;
        }
        let Ok(placeholder) = node.data_type() else {
            continue;
        };
        if placeholder.definition_name.is_empty() {
            continue;
        }
        let resolved = find_data_type(documents, node_ref.document, &placeholder.definition_name)
            .and_then(|r| documents.node(&r))
            .and_then(|n| n.data_type().ok());
        match resolved {
            Some(info) => links.push((node_ref.clone(), info.clone())),
            None => {
                warn!(
                    "Data type {} of {} could not be resolved",
                    placeholder.definition_name, node.node_id
                );
                report.unresolved_data_types += 1;
            }
        }
    }
    for (node_ref, info) in links {
        if let Some(data_type) = documents.node_mut(&node_ref).and_then(|n| n.data_type_mut().ok()) {
            *data_type = info;
        }
    }
}

fn link_methods(documents: &mut DocumentCache) {
    let mut links = Vec::new();
    for node_ref in documents.node_refs() {
        let Some(node) = documents.node(&node_ref) else {
            continue;
        };
        if node.class() != NodeClass::Method {
            continue;
        }
        let mut input = None;
        let mut output = None;
        for target in node.references.iter().filter_map(|r| r.target.as_ref()) {
            let Some(child) = documents.node(target) else {
                continue;
            };
            if child.class() != NodeClass::Variable {
                continue;
            }
            match strip_namespace_prefix(&child.browse_name) {
                "InputArguments" => input = Some(target.clone()),
                "OutputArguments" => output = Some(target.clone()),
                _ => {}
            }
        }
        links.push((node_ref, input, output));
    }
    for (node_ref, input, output) in links {
        if let Some(method) = documents.node_mut(&node_ref).and_then(|n| n.method_mut().ok()) {
            method.input_arguments = input;
            method.output_arguments = output;
        }
    }
}

#[cfg(test)]
mod tests {
    use nodeset_xml::{parse_nodeset2_str, NodeIdVariant};

    use crate::{fixtures, input::LoadedDocument};

    use super::*;

    fn cache(xml: &[&str]) -> DocumentCache {
        let mut cache = DocumentCache::new();
        for x in xml {
            cache.insert(LoadedDocument::new(None, parse_nodeset2_str(x).unwrap()));
        }
        cache
    }

    fn num(document: usize, id: u32) -> NodeRef {
        NodeRef::new(document, NodeIdVariant::Numeric(id))
    }

    #[test]
    fn links_references_across_documents() {
        let mut docs = cache(&[fixtures::BASE, fixtures::PUMP, fixtures::MOTOR]);
        let report = resolve(&mut docs);
        assert_eq!(report.missing_required_models, 0);

        let pump = docs.node(&num(1, 1001)).unwrap();
        let supertype = pump.references[0].target.clone().unwrap();
        assert_eq!(supertype, num(2, 1101));
        assert_eq!(docs.node(&supertype).unwrap().browse_name, "1:MachineType");

        // Every resolved target points into the loaded set.
        for node_ref in docs.node_refs() {
            for reference in &docs.node(&node_ref).unwrap().references {
                if let Some(target) = &reference.target {
                    assert!(docs.node(target).is_some());
                }
            }
        }
    }

    #[test]
    fn parent_and_modelling_rules() {
        let mut docs = cache(&[fixtures::BASE, fixtures::PUMP, fixtures::MOTOR]);
        resolve(&mut docs);

        let speed = docs.node(&num(1, 6001)).unwrap();
        assert_eq!(speed.parent_node, Some(num(1, 1001)));
        assert!(!speed.is_optional);

        let temperature = docs.node(&num(1, 6002)).unwrap();
        assert!(temperature.is_optional);
    }

    #[test]
    fn data_types_and_methods() {
        let mut docs = cache(&[fixtures::BASE, fixtures::PUMP, fixtures::MOTOR]);
        resolve(&mut docs);

        let speed = docs.node(&num(1, 6001)).unwrap();
        let data_type = speed.data_type().unwrap();
        assert!(data_type.is_resolved());
        assert_eq!(data_type.node_id, "i=11");
        assert_eq!(data_type.namespace_uri, nodeset_xml::BASE_NAMESPACE_URI);

        let mode = docs.node(&num(1, 6003)).unwrap().data_type().unwrap();
        assert!(mode.is_enum);
        assert_eq!(mode.fields.len(), 3);

        let start = docs.node(&num(1, 7001)).unwrap().method().unwrap();
        assert_eq!(start.input_arguments, Some(num(1, 6010)));
        assert_eq!(start.output_arguments, None);
    }

    #[test]
    fn inherits_structure_fields() {
        let mut docs = cache(&[fixtures::BASE, fixtures::PUMP, fixtures::MOTOR]);
        resolve(&mut docs);

        // PumpStatus -> MachineStatus (other document) -> Structure
        let status = docs.node(&num(1, 3002)).unwrap().data_type().unwrap();
        let names: Vec<_> = status.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Running", "Flow"]);
    }

    #[test]
    fn unresolved_targets_are_reported() {
        let mut docs = cache(&[fixtures::PUMP]);
        let report = resolve(&mut docs);
        assert!(report.unresolved_references > 0);
        assert_eq!(report.missing_required_models, 2);
        let pump = docs.node(&num(0, 1001)).unwrap();
        assert!(pump.references[0].target.is_none());
        assert!(!report.is_complete());
    }

    #[test]
    fn subtype_cycle_terminates() {
        let xml = r#"<UANodeSet>
  <Models><Model ModelUri="http://example.org/UA/Cycle/" /></Models>
  <Aliases><Alias Alias="HasSubtype">i=45</Alias></Aliases>
  <UADataType NodeId="ns=1;i=1" BrowseName="1:A">
    <References><Reference ReferenceType="HasSubtype" IsForward="false">ns=1;i=2</Reference></References>
    <Definition Name="1:A"><Field Name="a" DataType="i=11" /></Definition>
  </UADataType>
  <UADataType NodeId="ns=1;i=2" BrowseName="1:B">
    <References><Reference ReferenceType="i=45" IsForward="false">ns=1;i=1</Reference></References>
    <Definition Name="1:B"><Field Name="b" DataType="i=12" /></Definition>
  </UADataType>
</UANodeSet>"#;
        let mut docs = cache(&[xml]);
        let report = resolve(&mut docs);
        assert_eq!(report.unresolved_references, 0);

        let a = docs.node(&num(0, 1)).unwrap().data_type().unwrap();
        let b = docs.node(&num(0, 2)).unwrap().data_type().unwrap();
        let a_names: Vec<_> = a.fields.iter().map(|f| f.name.as_str()).collect();
        let b_names: Vec<_> = b.fields.iter().map(|f| f.name.as_str()).collect();
        // The cycle is cut when A is revisited from B, so B keeps only its own field.
        assert_eq!(a_names, vec!["b", "a"]);
        assert_eq!(b_names, vec!["b"]);
    }
}

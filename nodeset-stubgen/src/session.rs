//! One generation run: the selected model, every model it requires, and the
//! resolved links between them.

use std::path::PathBuf;

use log::{info, warn};
use nodeset_xml::{load_nodeset2_file, NodeClass, NodeRef, ParsedDocument, UaNode};

use crate::{
    error::StubGenErrorKind,
    input::{CompanionFiles, DocumentCache, LoadedDocument, NodeSetDirectory},
    resolve::{resolve, ResolveReport},
    selection::SelectionTree,
    StubGenError,
};

/// Where to load a session from: a nodeset folder tree and the folder of the
/// model the user picked.
#[derive(Debug, Clone)]
pub struct NodeSetSelection {
    pub directory: NodeSetDirectory,
    /// Folder of the selected model, relative to the directory root.
    pub selected_dir: String,
}

impl NodeSetSelection {
    pub fn new(directory: NodeSetDirectory, selected_dir: impl Into<String>) -> Self {
        Self {
            directory,
            selected_dir: selected_dir.into(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    documents: DocumentCache,
    selected_model_uri: String,
    report: ResolveReport,
}

impl Session {
    /// Locate, parse and resolve the selected model and everything it requires.
    /// Any document that fails to load aborts the session.
    pub fn load(selection: &NodeSetSelection) -> Result<Self, StubGenError> {
        let directory = &selection.directory;
        let selected_path = directory
            .nodeset_file_in(&directory.root().join(&selection.selected_dir))
            .map_err(|e| e.with_context(format!("selecting {}", selection.selected_dir)))?;
        let selected = load_document(selected_path)?;
        let selected_uri = selected.uri().to_owned();
        info!("Selected model {}", selected_uri);

        let required: Vec<String> = selected
            .document
            .namespace_index_map
            .values()
            .filter(|uri| **uri != selected_uri)
            .cloned()
            .collect();

        let mut files = Vec::with_capacity(required.len());
        for uri in &required {
            match directory.nodeset_file(uri) {
                Ok(path) => files.push(path),
                Err(e) => warn!("{e}"),
            }
        }
        if files.len() != required.len() {
            return Err(StubGenError::new(StubGenErrorKind::ModelFileMismatch {
                models: required.len(),
                files: files.len(),
            })
            .with_context(format!("loading models required by {selected_uri}")));
        }

        let mut documents = vec![selected];
        for file in files {
            documents.push(load_document(file)?);
        }
        Ok(Self::from_documents(documents, &selected_uri))
    }

    /// Build a session from documents that are already parsed. Documents are
    /// ordered by the selected document's namespace table, anything it does
    /// not list goes last.
    pub fn from_documents(mut documents: Vec<LoadedDocument>, selected_uri: &str) -> Self {
        let order: Vec<String> = documents
            .iter()
            .find(|d| d.uri() == selected_uri)
            .map(|d| d.document.namespace_index_map.values().cloned().collect())
            .unwrap_or_default();
        documents.sort_by_key(|d| {
            order
                .iter()
                .position(|uri| uri == d.uri())
                .unwrap_or(usize::MAX)
        });

        let mut cache = DocumentCache::new();
        for document in documents {
            if cache.get(document.uri()).is_some() {
                warn!("Nodeset {} loaded twice, keeping the first", document.uri());
                continue;
            }
            cache.insert(document);
        }
        if cache.get(selected_uri).is_none() {
            warn!("Selected model {selected_uri} is not among the loaded nodesets");
        }
        let report = resolve(&mut cache);

        Self {
            documents: cache,
            selected_model_uri: selected_uri.to_owned(),
            report,
        }
    }

    pub fn documents(&self) -> &DocumentCache {
        &self.documents
    }

    pub fn selected_model_uri(&self) -> &str {
        &self.selected_model_uri
    }

    pub fn selected_document(&self) -> Option<&LoadedDocument> {
        self.documents.get(&self.selected_model_uri)
    }

    pub fn report(&self) -> &ResolveReport {
        &self.report
    }

    pub fn node(&self, node: &NodeRef) -> Option<&UaNode> {
        self.documents.node(node)
    }

    pub fn find_node(&self, uri: &str, node_id: &str) -> Option<NodeRef> {
        self.documents.find(uri, node_id)
    }

    /// Session-wide index of a namespace, the position of its document.
    pub fn namespace_index(&self, uri: &str) -> Option<usize> {
        self.documents.index_of(uri)
    }

    /// Non-abstract ObjectTypes of the selected model, the types a user can
    /// instantiate.
    pub fn type_candidates(&self) -> Vec<NodeRef> {
        let Some(index) = self.documents.index_of(&self.selected_model_uri) else {
            return Vec::new();
        };
        let Some(doc) = self.documents.get_by_index(index) else {
            return Vec::new();
        };
        doc.document
            .nodes
            .values()
            .filter(|n| n.class() == NodeClass::ObjectType && n.is_abstract() == Ok(false))
            .map(|n| NodeRef::new(index, n.identifier.clone()))
            .collect()
    }

    /// Instantiate every type candidate for browsing.
    pub fn browse_tree(&self) -> SelectionTree {
        let mut tree = SelectionTree::browsing();
        for candidate in self.type_candidates() {
            if let Err(e) = tree.add_root(&self.documents, &candidate) {
                warn!("{e}");
            }
        }
        tree
    }

    /// Build-system files next to the NodeSet file of `uri`.
    pub fn companion_files(&self, uri: &str) -> CompanionFiles {
        match self.documents.get(uri).and_then(|d| d.path.as_ref()) {
            Some(path) => NodeSetDirectory::companion_files(path),
            None => CompanionFiles::default(),
        }
    }
}

fn load_document(path: PathBuf) -> Result<LoadedDocument, StubGenError> {
    let document: ParsedDocument = load_nodeset2_file(&path)
        .map_err(|e| StubGenError::from(e).in_file(path.display().to_string()))?;
    Ok(LoadedDocument::new(Some(path), document))
}

/// Load a session on the blocking thread pool.
pub async fn load_session_async(selection: NodeSetSelection) -> Result<Session, StubGenError> {
    tokio::task::spawn_blocking(move || Session::load(&selection))
        .await
        .map_err(|e| StubGenError::other(format!("Session loading task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use nodeset_xml::{parse_nodeset2_str, NodeIdVariant};

    use crate::fixtures;

    use super::*;

    fn doc(xml: &str) -> LoadedDocument {
        LoadedDocument::new(None, parse_nodeset2_str(xml).unwrap())
    }

    #[test]
    fn documents_follow_namespace_table() {
        let session = Session::from_documents(
            vec![doc(fixtures::MOTOR), doc(fixtures::PUMP), doc(fixtures::BASE)],
            fixtures::PUMP_URI,
        );
        let uris: Vec<_> = session.documents().iter().map(|d| d.uri()).collect();
        assert_eq!(
            uris,
            vec![nodeset_xml::BASE_NAMESPACE_URI, fixtures::PUMP_URI, fixtures::MOTOR_URI]
        );
        assert_eq!(session.namespace_index(fixtures::MOTOR_URI), Some(2));
        assert!(session.report().is_complete());
    }

    #[test]
    fn candidates_are_concrete_object_types() {
        let session = Session::from_documents(
            vec![doc(fixtures::BASE), doc(fixtures::PUMP), doc(fixtures::MOTOR)],
            fixtures::PUMP_URI,
        );
        let candidates = session.type_candidates();
        assert_eq!(
            candidates,
            vec![NodeRef::new(1, NodeIdVariant::Numeric(1001))]
        );

        let motor = Session::from_documents(
            vec![doc(fixtures::BASE), doc(fixtures::MOTOR)],
            fixtures::MOTOR_URI,
        );
        // MachineType is abstract.
        assert!(motor.type_candidates().is_empty());
    }
}

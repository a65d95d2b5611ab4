//! Saved project state: which roots were added and which members selected.

use std::{collections::HashSet, path::Path};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    input::DocumentCache,
    selection::{ItemId, SelectionTree},
    StubGenError,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SavedRootNode {
    pub uri: String,
    pub node_id: String,
    pub display_name: String,
    pub description: String,
    pub browse_name: String,
    pub original_unique_browse_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SavedNode {
    pub node_id: String,
    pub display_name: String,
    pub description: String,
    pub browse_name: String,
    pub original_unique_browse_name: String,
    /// Position of the owning root in `rootNodes`.
    #[serde(default)]
    pub root_index: Option<usize>,
    /// Source browse names from below the root down to this member.
    #[serde(default)]
    pub browse_path: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub project_name: String,
    #[serde(rename = "selectedNodeSetXML")]
    pub selected_node_set_xml: String,
    #[serde(default)]
    pub root_nodes: Vec<SavedRootNode>,
    #[serde(default)]
    pub selected_nodes: Vec<SavedNode>,
}

struct SavedFields<'a> {
    display_name: &'a str,
    description: &'a str,
    browse_name: &'a str,
    original_unique_browse_name: &'a str,
}

fn restore_fields(tree: &mut SelectionTree, id: ItemId, fields: SavedFields<'_>) {
    let Some(item) = tree.get_mut(id) else {
        return;
    };
    item.set_display_name(fields.display_name);
    item.set_description(fields.description);
    if !fields.original_unique_browse_name.is_empty() {
        item.original_unique_browse_name = fields.original_unique_browse_name.to_owned();
    }
    let current = item.node.browse_name.clone();
    if fields.browse_name.is_empty() || fields.browse_name == current {
        return;
    }
    if tree.is_browse_name_unique(fields.browse_name) {
        tree.set_browse_name(id, fields.browse_name);
    } else {
        warn!(
            "Keeping browse name {} for {}, {} is taken",
            current, fields.original_unique_browse_name, fields.browse_name
        );
    }
}

/// Follow `path` down from `root`, one child per step, matching the
/// browse names members had in their source document.
fn follow_path(tree: &SelectionTree, root: ItemId, path: &[String]) -> Option<ItemId> {
    path.iter().try_fold(root, |current, name| {
        tree.get(current)?
            .children()
            .iter()
            .copied()
            .find(|child| tree.get(*child).is_some_and(|i| &i.base_browse_name == name))
    })
}

impl ProjectState {
    /// Record the roots and the selected members of `tree`.
    pub fn capture(
        tree: &SelectionTree,
        project_name: impl Into<String>,
        selected_node_set_xml: impl Into<String>,
    ) -> Self {
        let mut state = Self {
            project_name: project_name.into(),
            selected_node_set_xml: selected_node_set_xml.into(),
            ..Default::default()
        };
        for (root_index, root) in tree.roots().iter().enumerate() {
            let Some(item) = tree.get(*root) else {
                continue;
            };
            let node = &item.node;
            state.root_nodes.push(SavedRootNode {
                uri: node.namespace_uri.clone(),
                node_id: node.node_id.clone(),
                display_name: node.display_name.clone(),
                description: node.description.clone(),
                browse_name: node.browse_name.clone(),
                original_unique_browse_name: item.original_unique_browse_name.clone(),
            });
            state.capture_members(tree, *root, root_index, &mut Vec::new());
        }
        state
    }

    fn capture_members(
        &mut self,
        tree: &SelectionTree,
        parent: ItemId,
        root_index: usize,
        path: &mut Vec<String>,
    ) {
        let Some(item) = tree.get(parent) else {
            return;
        };
        for child in item.children() {
            let Some(member) = tree.get(*child) else {
                continue;
            };
            if !member.is_selected() {
                continue;
            }
            path.push(member.base_browse_name.clone());
            let node = &member.node;
            self.selected_nodes.push(SavedNode {
                node_id: node.node_id.clone(),
                display_name: node.display_name.clone(),
                description: node.description.clone(),
                browse_name: node.browse_name.clone(),
                original_unique_browse_name: member.original_unique_browse_name.clone(),
                root_index: Some(root_index),
                browse_path: path.clone(),
            });
            self.capture_members(tree, *child, root_index, path);
            path.pop();
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StubGenError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            StubGenError::io("Failed to write project", e).in_file(path.display().to_string())
        })?;
        info!("Saved project {} to {}", self.project_name, path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StubGenError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            StubGenError::io("Failed to read project", e).in_file(path.display().to_string())
        })?;
        serde_json::from_str(&data)
            .map_err(|e| StubGenError::from(e).in_file(path.display().to_string()))
    }

    /// Replay the saved roots into `tree`, then select exactly the saved
    /// members below them.
    ///
    /// Members are found by their root's position and their browse path
    /// under it, so names uniquified differently on replay still match.
    /// Entries without a path fall back to the original unique name.
    pub fn apply(
        &self,
        documents: &DocumentCache,
        tree: &mut SelectionTree,
    ) -> Result<(), StubGenError> {
        let mut roots = Vec::with_capacity(self.root_nodes.len());
        for root in &self.root_nodes {
            let id = tree
                .add_root_by_id(documents, &root.uri, &root.node_id)
                .map_err(|e| e.with_context(format!("restoring root {}", root.browse_name)))?;
            roots.push(id);
        }

        let mut found = Vec::with_capacity(self.selected_nodes.len());
        for saved in &self.selected_nodes {
            let id = match saved.root_index {
                Some(index) => roots
                    .get(index)
                    .and_then(|root| follow_path(tree, *root, &saved.browse_path)),
                None => tree.find_by_original_unique_name(&saved.original_unique_browse_name),
            };
            match id {
                Some(id) => found.push((id, saved)),
                None => warn!("Saved node {} not found", saved.original_unique_browse_name),
            }
        }

        let selected: HashSet<ItemId> = found.iter().map(|(id, _)| *id).collect();
        for root in &roots {
            for id in tree.subtree(*root).into_iter().skip(1) {
                tree.set_selected(id, selected.contains(&id));
            }
        }

        for (root, id) in self.root_nodes.iter().zip(&roots) {
            restore_fields(
                tree,
                *id,
                SavedFields {
                    display_name: &root.display_name,
                    description: &root.description,
                    browse_name: &root.browse_name,
                    original_unique_browse_name: &root.original_unique_browse_name,
                },
            );
        }
        for (id, saved) in found {
            restore_fields(
                tree,
                id,
                SavedFields {
                    display_name: &saved.display_name,
                    description: &saved.description,
                    browse_name: &saved.browse_name,
                    original_unique_browse_name: &saved.original_unique_browse_name,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nodeset_xml::parse_nodeset2_str;

    use crate::{fixtures, input::LoadedDocument, session::Session};

    use super::*;

    #[test]
    fn serialized_keys() {
        let state = ProjectState {
            project_name: "PumpServer".to_owned(),
            selected_node_set_xml: "Pump".to_owned(),
            root_nodes: vec![SavedRootNode {
                uri: "http://example.org/UA/Pump/".to_owned(),
                node_id: "ns=1;i=1001".to_owned(),
                browse_name: "1:PumpType".to_owned(),
                original_unique_browse_name: "1:PumpType".to_owned(),
                ..Default::default()
            }],
            selected_nodes: Vec::new(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["selectedNodeSetXML"], "Pump");
        assert_eq!(json["projectName"], "PumpServer");
        assert_eq!(json["rootNodes"][0]["nodeId"], "ns=1;i=1001");
        assert_eq!(json["rootNodes"][0]["originalUniqueBrowseName"], "1:PumpType");
        assert!(json["selectedNodes"].as_array().unwrap().is_empty());

        let back: ProjectState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let state: ProjectState =
            serde_json::from_str(r#"{"projectName": "x", "selectedNodeSetXML": "DI"}"#).unwrap();
        assert!(state.root_nodes.is_empty());
        assert!(state.selected_nodes.is_empty());
    }

    fn session() -> Session {
        let docs = [fixtures::BASE, fixtures::PUMP, fixtures::MOTOR]
            .iter()
            .map(|x| LoadedDocument::new(None, parse_nodeset2_str(x).unwrap()))
            .collect();
        Session::from_documents(docs, fixtures::PUMP_URI)
    }

    fn active_names(tree: &SelectionTree) -> Vec<String> {
        tree.active_items()
            .into_iter()
            .map(|id| tree.get(id).unwrap().node.browse_name.clone())
            .collect()
    }

    #[test]
    fn replays_after_first_root_removed() {
        let session = session();
        let mut tree = SelectionTree::new();
        let first = tree
            .add_root_by_id(session.documents(), fixtures::PUMP_URI, "ns=1;i=1001")
            .unwrap();
        let second = tree
            .add_root_by_id(session.documents(), fixtures::PUMP_URI, "ns=1;i=1001")
            .unwrap();
        tree.remove_root(first).unwrap();
        let temperature = tree.find_by_browse_name(second, "Temperature").unwrap();
        tree.set_selected(temperature, true);
        tree.get_mut(temperature).unwrap().set_display_name("Bearing temperature");
        tree.get_mut(second).unwrap().set_display_name("Feed pump");

        let state = ProjectState::capture(&tree, "PumpServer", "Pump");
        assert_eq!(state.root_nodes[0].browse_name, "1:PumpType_1");
        let saved = state
            .selected_nodes
            .iter()
            .find(|n| n.browse_name == "1:Temperature_1")
            .unwrap();
        assert_eq!(saved.root_index, Some(0));
        assert_eq!(saved.browse_path, vec!["1:Temperature"]);

        // A fresh tree names the replayed clones without suffixes.
        let mut restored = SelectionTree::new();
        state.apply(session.documents(), &mut restored).unwrap();
        assert_eq!(active_names(&restored), active_names(&tree));

        let root = restored.roots()[0];
        assert_eq!(restored.get(root).unwrap().node.display_name, "Feed pump");
        let temperature = restored.find_by_browse_name(root, "Temperature").unwrap();
        let item = restored.get(temperature).unwrap();
        assert!(item.is_selected());
        assert_eq!(item.node.display_name, "Bearing temperature");
        assert_eq!(item.original_unique_browse_name, "1:Temperature_1");
    }

    #[test]
    fn entries_without_path_match_by_name() {
        let session = session();
        let state: ProjectState = serde_json::from_value(serde_json::json!({
            "projectName": "PumpServer",
            "selectedNodeSetXML": "Pump",
            "rootNodes": [{
                "uri": fixtures::PUMP_URI,
                "nodeId": "ns=1;i=1001",
                "displayName": "PumpType",
                "description": "",
                "browseName": "1:PumpType",
                "originalUniqueBrowseName": "1:PumpType"
            }],
            "selectedNodes": [{
                "nodeId": "ns=1;i=6002",
                "displayName": "Temperature",
                "description": "",
                "browseName": "1:Temperature",
                "originalUniqueBrowseName": "1:Temperature"
            }]
        }))
        .unwrap();
        assert_eq!(state.selected_nodes[0].root_index, None);

        let mut tree = SelectionTree::new();
        state.apply(session.documents(), &mut tree).unwrap();
        let root = tree.roots()[0];
        let temperature = tree.find_by_browse_name(root, "Temperature").unwrap();
        assert!(tree.get(temperature).unwrap().is_selected());
    }
}

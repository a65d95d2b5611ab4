//! The forest of cloned node instances a user browses and selects from.
//!
//! Items live in an arena and are addressed by [`ItemId`]. Parents own their
//! children through the `children` list; the `parent` back link is a plain id.

use std::collections::{BTreeMap, HashMap};

use nodeset_xml::{node_id::strip_namespace_prefix, NodeRef, UaNode};

use crate::{utils::sanitize_name, StubGenError};

mod builder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(usize);

impl ItemId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The reference that attached an item to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceLink {
    /// Reference type name, such as `HasComponent`.
    pub name: String,
    /// Alias-resolved node id of the reference type, local to `namespace_uri`'s
    /// defining document.
    pub node_id: String,
    pub namespace_uri: String,
}

#[derive(Debug, Clone)]
pub struct TreeItem {
    /// Owned clone of the resolved node.
    pub node: UaNode,
    /// The node this item was cloned from.
    pub source: NodeRef,
    /// Browse name of the source node, before uniquification.
    pub base_browse_name: String,
    /// Browse name assigned when the item was created. Stable across edits.
    pub original_unique_browse_name: String,
    /// `None` for roots.
    pub reference: Option<ReferenceLink>,
    field_values: BTreeMap<String, String>,
    is_selected: bool,
    is_parent_selected: bool,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
}

impl TreeItem {
    fn new(
        node: UaNode,
        source: NodeRef,
        base_browse_name: String,
        reference: Option<ReferenceLink>,
    ) -> Self {
        Self {
            original_unique_browse_name: node.browse_name.clone(),
            node,
            source,
            base_browse_name,
            reference,
            field_values: BTreeMap::new(),
            is_selected: false,
            is_parent_selected: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.node.is_root_node
    }

    pub fn is_optional(&self) -> bool {
        self.node.is_optional
    }

    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    /// Identifier used for this item in generated code.
    pub fn generated_name(&self) -> String {
        sanitize_name(&format!(
            "{}_{}",
            strip_namespace_prefix(&self.node.browse_name),
            self.node.identifier.value_string()
        ))
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.node.display_name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.node.description = description.into();
    }

    /// Initial value of a structure field, or of the variable itself when its
    /// type has no fields, in which case `field` is the browse name without
    /// namespace prefix.
    pub fn set_field_value(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.field_values.insert(field.into(), value.into());
    }

    pub fn field_value(&self, field: &str) -> Option<&str> {
        self.field_values.get(field).map(|v| v.as_str())
    }
}

/// A selection or browsing forest.
#[derive(Debug, Clone)]
pub struct SelectionTree {
    items: Vec<Option<TreeItem>>,
    roots: Vec<ItemId>,
    unique_names: bool,
    /// How many live items carry each browse name.
    name_counts: HashMap<String, usize>,
}

impl Default for SelectionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionTree {
    /// A tree for the user's persistent selection. Browse names are kept
    /// unique and new roots start out selected.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            roots: Vec::new(),
            unique_names: true,
            name_counts: HashMap::new(),
        }
    }

    /// A tree for browsing candidate types, without uniquification or selection.
    pub fn browsing() -> Self {
        Self {
            unique_names: false,
            ..Self::new()
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&TreeItem> {
        self.items.get(id.0).and_then(|i| i.as_ref())
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut TreeItem> {
        self.items.get_mut(id.0).and_then(|i| i.as_mut())
    }

    pub fn roots(&self) -> &[ItemId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.items.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub(crate) fn insert(&mut self, mut item: TreeItem, parent: Option<ItemId>) -> ItemId {
        let id = ItemId(self.items.len());
        item.parent = parent;
        self.track_name(&item.node.browse_name);
        self.items.push(Some(item));
        match parent {
            Some(parent) => {
                if let Some(p) = self.get_mut(parent) {
                    p.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        id
    }

    fn track_name(&mut self, name: &str) {
        *self.name_counts.entry(name.to_owned()).or_default() += 1;
    }

    fn untrack_name(&mut self, name: &str) {
        if let Some(count) = self.name_counts.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.name_counts.remove(name);
            }
        }
    }

    pub fn is_browse_name_unique(&self, name: &str) -> bool {
        !self.name_counts.contains_key(name)
    }

    /// Rename an item, keeping the name index current.
    pub fn set_browse_name(&mut self, id: ItemId, name: impl Into<String>) {
        let name = name.into();
        let Some(item) = self.get_mut(id) else {
            return;
        };
        let old = std::mem::replace(&mut item.node.browse_name, name.clone());
        self.untrack_name(&old);
        self.track_name(&name);
    }

    /// `name` if no item uses it yet, otherwise the first free `name_<n>`.
    pub fn make_unique(&self, name: &str) -> String {
        let mut candidate = name.to_owned();
        let mut suffix = 1;
        while !self.is_browse_name_unique(&candidate) {
            candidate = format!("{name}_{suffix}");
            suffix += 1;
        }
        candidate
    }

    /// Select or deselect an item. Selecting cascades to every non-optional
    /// descendant, deselecting cascades to all of them.
    pub fn set_selected(&mut self, id: ItemId, selected: bool) {
        let Some(item) = self.get_mut(id) else {
            return;
        };
        item.is_selected = selected;
        let children = item.children.clone();
        for child in children {
            self.update_child(child, selected);
        }
    }

    fn update_child(&mut self, child: ItemId, parent_selected: bool) {
        self.set_parent_selected(child, parent_selected);
        let Some(item) = self.get(child) else {
            return;
        };
        if !parent_selected {
            self.set_selected(child, false);
        } else if !item.is_optional() {
            self.set_selected(child, true);
        }
    }

    fn set_parent_selected(&mut self, id: ItemId, parent_selected: bool) {
        if let Some(item) = self.get_mut(id) {
            item.is_parent_selected = parent_selected;
            if !parent_selected {
                item.is_selected = false;
            }
        }
    }

    /// Direct children of a root always count as having a selected parent.
    pub fn is_parent_selected(&self, id: ItemId) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        if item.is_root() {
            return item.is_parent_selected;
        }
        match item.parent.and_then(|p| self.get(p)) {
            Some(parent) if parent.is_root() => true,
            _ => item.is_parent_selected,
        }
    }

    pub fn remove_root(&mut self, id: ItemId) -> Result<(), StubGenError> {
        let Some(position) = self.roots.iter().position(|r| *r == id) else {
            return Err(StubGenError::not_found(format!(
                "root item {}",
                id.index()
            )));
        };
        self.roots.remove(position);
        for item in self.subtree(id) {
            if let Some(removed) = self.items[item.0].take() {
                self.untrack_name(&removed.node.browse_name);
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.roots.clear();
        self.name_counts.clear();
    }

    /// `id` and all its descendants, in pre-order.
    pub fn subtree(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(item) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(item.children.iter().rev().copied());
        }
        out
    }

    /// Every item, roots in insertion order, each followed by its subtree.
    pub fn pre_order(&self) -> Vec<ItemId> {
        self.roots.iter().flat_map(|r| self.subtree(*r)).collect()
    }

    /// Roots and selected items whose ancestors are all active, in pre-order.
    pub fn active_items(&self) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self.roots.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(item) = self.get(current) else {
                continue;
            };
            if !item.is_root() && !item.is_selected {
                continue;
            }
            out.push(current);
            stack.extend(item.children.iter().rev().copied());
        }
        out
    }

    pub fn find_by_original_unique_name(&self, name: &str) -> Option<ItemId> {
        self.pre_order().into_iter().find(|id| {
            self.get(*id)
                .is_some_and(|i| i.original_unique_browse_name == name)
        })
    }

    /// First item below `root` whose browse name, without namespace prefix,
    /// is `name` or a uniquified form of it.
    pub fn find_by_browse_name(&self, root: ItemId, name: &str) -> Option<ItemId> {
        self.subtree(root).into_iter().find(|id| {
            self.get(*id).is_some_and(|i| {
                strip_namespace_prefix(&i.node.browse_name) == name
                    || strip_namespace_prefix(&i.base_browse_name) == name
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use nodeset_xml::{NodeClass, NodeIdVariant};

    use super::*;

    fn node(id: u32, name: &str, optional: bool) -> UaNode {
        let mut node = UaNode::new(
            NodeClass::Variable,
            format!("ns=1;i={id}"),
            NodeIdVariant::Numeric(id),
            "http://example.org/UA/Pump/",
        );
        node.browse_name = name.to_owned();
        node.is_optional = optional;
        node
    }

    fn add(tree: &mut SelectionTree, parent: Option<ItemId>, id: u32, name: &str, optional: bool) -> ItemId {
        let mut n = node(id, name, optional);
        n.is_root_node = parent.is_none();
        let source = NodeRef::new(1, NodeIdVariant::Numeric(id));
        let name = tree.make_unique(&n.browse_name);
        n.browse_name = name;
        tree.insert(TreeItem::new(n, source, String::new(), None), parent)
    }

    /// root -> a -> a1 (optional), root -> b (optional) -> b1
    fn sample() -> (SelectionTree, [ItemId; 5]) {
        let mut tree = SelectionTree::new();
        let root = add(&mut tree, None, 1, "1:Root", false);
        let a = add(&mut tree, Some(root), 2, "1:A", false);
        let a1 = add(&mut tree, Some(a), 3, "1:A1", true);
        let b = add(&mut tree, Some(root), 4, "1:B", true);
        let b1 = add(&mut tree, Some(b), 5, "1:B1", false);
        (tree, [root, a, a1, b, b1])
    }

    #[test]
    fn cascade_skips_optional_members() {
        let (mut tree, [root, a, a1, b, b1]) = sample();
        tree.set_selected(root, true);
        assert!(tree.get(a).unwrap().is_selected());
        assert!(!tree.get(a1).unwrap().is_selected());
        assert!(!tree.get(b).unwrap().is_selected());
        assert!(!tree.get(b1).unwrap().is_selected());
        assert_eq!(tree.active_items(), vec![root, a]);

        tree.set_selected(b, true);
        assert!(tree.get(b1).unwrap().is_selected());
        assert_eq!(tree.active_items(), vec![root, a, b, b1]);
    }

    #[test]
    fn deselect_clears_whole_subtree() {
        let (mut tree, [root, a, a1, b, b1]) = sample();
        tree.set_selected(root, true);
        tree.set_selected(a1, true);
        tree.set_selected(b, true);

        tree.set_selected(root, false);
        for id in [a, a1, b, b1] {
            assert!(!tree.get(id).unwrap().is_selected());
        }
        assert!(!tree.is_parent_selected(a1));
        // Roots stay active regardless.
        assert_eq!(tree.active_items(), vec![root]);

        // Reselecting brings back the mandatory members only.
        tree.set_selected(root, true);
        assert!(tree.get(a).unwrap().is_selected());
        assert!(!tree.get(a1).unwrap().is_selected());
        assert!(tree.is_parent_selected(a1));
        assert!(tree.is_parent_selected(b));
    }

    #[test]
    fn unique_names() {
        let mut tree = SelectionTree::new();
        assert_eq!(tree.make_unique("1:X"), "1:X");
        add(&mut tree, None, 1, "1:X", false);
        add(&mut tree, None, 1, "1:X", false);
        add(&mut tree, None, 1, "1:X", false);
        let names: Vec<_> = tree
            .roots()
            .iter()
            .map(|r| tree.get(*r).unwrap().node.browse_name.clone())
            .collect();
        assert_eq!(names, vec!["1:X", "1:X_1", "1:X_2"]);
        assert_eq!(tree.get(tree.roots()[1]).unwrap().generated_name(), "X_1_1");
    }

    #[test]
    fn remove_and_lookup() {
        let (mut tree, [root, _a, a1, b, _b1]) = sample();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.find_by_browse_name(root, "A1"), Some(a1));
        assert_eq!(tree.find_by_original_unique_name("1:B"), Some(b));

        tree.set_browse_name(b, "1:Renamed");
        assert_eq!(tree.find_by_original_unique_name("1:B"), Some(b));
        assert!(tree.is_browse_name_unique("1:B"));
        assert!(!tree.is_browse_name_unique("1:Renamed"));

        assert!(tree.remove_root(a1).is_err());
        tree.remove_root(root).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert!(tree.pre_order().is_empty());
        // Names of removed items are free again.
        assert!(tree.is_browse_name_unique("1:Root"));
        assert_eq!(tree.make_unique("1:A"), "1:A");
    }

    #[test]
    fn name_index_counts_duplicates() {
        let mut tree = SelectionTree::browsing();
        let first = add(&mut tree, None, 1, "1:X", false);
        // Browsing trees may hold the same name twice.
        let mut n = node(1, "1:X", false);
        n.is_root_node = true;
        let second = tree.insert(
            TreeItem::new(n, NodeRef::new(1, NodeIdVariant::Numeric(1)), String::new(), None),
            None,
        );
        tree.remove_root(first).unwrap();
        assert!(!tree.is_browse_name_unique("1:X"));
        tree.remove_root(second).unwrap();
        assert!(tree.is_browse_name_unique("1:X"));
    }
}

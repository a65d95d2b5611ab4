//! Typed node graph produced by the NodeSet parser.
//!
//! Nodes own their references. Links between nodes (`parent_node`,
//! `Reference::target`, method argument holders) are plain [`NodeRef`]
//! lookup keys into the owning document set, so the reference graph can be
//! cyclic without any shared ownership.

use std::fmt::Display;

use thiserror::Error;

use crate::node_id::{with_namespace_index, NodeIdError, NodeIdVariant};

/// The six node element kinds of a NodeSet document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
    DataType,
    VariableType,
    ObjectType,
}

impl NodeClass {
    /// Map a NodeSet element name such as `UAObject` to its class.
    pub fn from_element(name: &str) -> Option<Self> {
        Some(match name {
            "UAObject" => Self::Object,
            "UAVariable" => Self::Variable,
            "UAMethod" => Self::Method,
            "UADataType" => Self::DataType,
            "UAVariableType" => Self::VariableType,
            "UAObjectType" => Self::ObjectType,
            _ => return None,
        })
    }

    pub fn element_name(&self) -> &'static str {
        match self {
            Self::Object => "UAObject",
            Self::Variable => "UAVariable",
            Self::Method => "UAMethod",
            Self::DataType => "UADataType",
            Self::VariableType => "UAVariableType",
            Self::ObjectType => "UAObjectType",
        }
    }

    /// Classes that can be instantiated as members of a type.
    pub fn is_instance(&self) -> bool {
        matches!(self, Self::Object | Self::Variable | Self::Method)
    }
}

impl Display for NodeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.element_name())
    }
}

/// Stable key of a node: the index of its document in the loaded set and its
/// identifier within that document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub document: usize,
    pub identifier: NodeIdVariant,
}

impl NodeRef {
    pub fn new(document: usize, identifier: NodeIdVariant) -> Self {
        Self {
            document,
            identifier,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{attribute} is not applicable to {class} nodes")]
/// Returned by variant-specific accessors on a node of the wrong class.
pub struct NotApplicable {
    pub attribute: &'static str,
    pub class: NodeClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference type as written in the document, either an alias or a node id.
    pub reference_type: String,
    pub target_node_id: String,
    pub is_forward: bool,
    /// Namespace URI of the target, if the document maps its namespace index.
    pub namespace_uri: Option<String>,
    /// Set by the resolver once the target is located.
    pub target: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeField {
    pub name: String,
    /// Declared type of the field. Empty for enumeration values.
    pub data_type: String,
    /// Numeric value for enumeration fields.
    pub value: Option<i64>,
}

/// Data type descriptor. On a variable this starts out as a placeholder
/// holding only the declared type name, and is replaced by the resolved
/// DataType node's descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataTypeInfo {
    /// Id of the DataType node. Empty on an unresolved placeholder.
    pub node_id: String,
    /// Namespace URI of the DataType node.
    pub namespace_uri: String,
    pub definition_name: String,
    pub fields: Vec<DataTypeField>,
    pub is_enum: bool,
}

impl DataTypeInfo {
    pub fn placeholder(declared: impl Into<String>) -> Self {
        Self {
            definition_name: declared.into(),
            ..Default::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.node_id.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&DataTypeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Merge the fields of a supertype. Supertype fields come first, and a
    /// field already declared here keeps its own definition.
    pub fn inherit_fields(&mut self, parent: &[DataTypeField]) {
        if parent.is_empty() {
            return;
        }
        let mut merged: Vec<DataTypeField> = Vec::with_capacity(parent.len() + self.fields.len());
        for field in parent {
            if merged.iter().any(|f| f.name == field.name) {
                continue;
            }
            match self.field(&field.name) {
                Some(own) => merged.push(own.clone()),
                None => merged.push(field.clone()),
            }
        }
        for field in self.fields.drain(..) {
            if !merged.iter().any(|f| f.name == field.name) {
                merged.push(field);
            }
        }
        self.fields = merged;
    }
}

/// One entry of a method argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub data_type: String,
    pub value_rank: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableAttributes {
    pub data_type: DataTypeInfo,
    /// Only populated when the variable holds a method's argument list.
    pub arguments: Vec<Argument>,
    pub array_dimensions: Vec<u32>,
    pub value_rank: i32,
}

impl Default for VariableAttributes {
    fn default() -> Self {
        Self {
            data_type: DataTypeInfo::default(),
            arguments: Vec::new(),
            array_dimensions: Vec::new(),
            value_rank: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodAttributes {
    pub input_arguments: Option<NodeRef>,
    pub output_arguments: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Variable(VariableAttributes),
    Method(MethodAttributes),
    DataType(DataTypeInfo),
    VariableType {
        attributes: VariableAttributes,
        is_abstract: bool,
    },
    ObjectType {
        is_abstract: bool,
    },
}

impl NodeKind {
    pub fn new(class: NodeClass) -> Self {
        match class {
            NodeClass::Object => Self::Object,
            NodeClass::Variable => Self::Variable(VariableAttributes::default()),
            NodeClass::Method => Self::Method(MethodAttributes::default()),
            NodeClass::DataType => Self::DataType(DataTypeInfo::default()),
            NodeClass::VariableType => Self::VariableType {
                attributes: VariableAttributes::default(),
                is_abstract: false,
            },
            NodeClass::ObjectType => Self::ObjectType { is_abstract: false },
        }
    }

    pub fn class(&self) -> NodeClass {
        match self {
            Self::Object => NodeClass::Object,
            Self::Variable(_) => NodeClass::Variable,
            Self::Method(_) => NodeClass::Method,
            Self::DataType(_) => NodeClass::DataType,
            Self::VariableType { .. } => NodeClass::VariableType,
            Self::ObjectType { .. } => NodeClass::ObjectType,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UaNode {
    pub node_id: String,
    pub identifier: NodeIdVariant,
    pub browse_name: String,
    pub display_name: String,
    pub description: String,
    pub parent_node_id: String,
    /// Set by the resolver, within the same document.
    pub parent_node: Option<NodeRef>,
    /// URI of the owning document's namespace.
    pub namespace_uri: String,
    pub is_optional: bool,
    pub is_root_node: bool,
    pub references: Vec<Reference>,
    pub kind: NodeKind,
}

impl UaNode {
    pub fn new(
        class: NodeClass,
        node_id: impl Into<String>,
        identifier: NodeIdVariant,
        namespace_uri: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            identifier,
            browse_name: String::new(),
            display_name: String::new(),
            description: String::new(),
            parent_node_id: String::new(),
            parent_node: None,
            namespace_uri: namespace_uri.into(),
            is_optional: false,
            is_root_node: false,
            references: Vec::new(),
            kind: NodeKind::new(class),
        }
    }

    pub fn class(&self) -> NodeClass {
        self.kind.class()
    }

    fn not_applicable(&self, attribute: &'static str) -> NotApplicable {
        NotApplicable {
            attribute,
            class: self.class(),
        }
    }

    /// Optional is sticky, once set it is never cleared.
    pub fn mark_optional(&mut self) {
        self.is_optional = true;
    }

    pub fn data_type(&self) -> Result<&DataTypeInfo, NotApplicable> {
        match &self.kind {
            NodeKind::Variable(v) | NodeKind::VariableType { attributes: v, .. } => {
                Ok(&v.data_type)
            }
            NodeKind::DataType(d) => Ok(d),
            _ => Err(self.not_applicable("data type")),
        }
    }

    pub fn data_type_mut(&mut self) -> Result<&mut DataTypeInfo, NotApplicable> {
        let err = self.not_applicable("data type");
        match &mut self.kind {
            NodeKind::Variable(v) | NodeKind::VariableType { attributes: v, .. } => {
                Ok(&mut v.data_type)
            }
            NodeKind::DataType(d) => Ok(d),
            _ => Err(err),
        }
    }

    pub fn variable(&self) -> Result<&VariableAttributes, NotApplicable> {
        match &self.kind {
            NodeKind::Variable(v) | NodeKind::VariableType { attributes: v, .. } => Ok(v),
            _ => Err(self.not_applicable("variable attributes")),
        }
    }

    pub fn arguments(&self) -> Result<&[Argument], NotApplicable> {
        self.variable()
            .map(|v| v.arguments.as_slice())
            .map_err(|_| self.not_applicable("arguments"))
    }

    pub fn is_abstract(&self) -> Result<bool, NotApplicable> {
        match &self.kind {
            NodeKind::VariableType { is_abstract, .. } | NodeKind::ObjectType { is_abstract } => {
                Ok(*is_abstract)
            }
            _ => Err(self.not_applicable("abstractness")),
        }
    }

    pub fn method(&self) -> Result<&MethodAttributes, NotApplicable> {
        match &self.kind {
            NodeKind::Method(m) => Ok(m),
            _ => Err(self.not_applicable("method arguments")),
        }
    }

    pub fn method_mut(&mut self) -> Result<&mut MethodAttributes, NotApplicable> {
        let err = self.not_applicable("method arguments");
        match &mut self.kind {
            NodeKind::Method(m) => Ok(m),
            _ => Err(err),
        }
    }

    /// Rewrite the namespace index of this node's id.
    pub fn set_namespace_index(&mut self, namespace: u16) -> Result<(), NodeIdError> {
        self.node_id = with_namespace_index(&self.node_id, namespace)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, data_type: &str) -> DataTypeField {
        DataTypeField {
            name: name.to_owned(),
            data_type: data_type.to_owned(),
            value: None,
        }
    }

    #[test]
    fn inherit_fields_parent_first() {
        let mut child = DataTypeInfo {
            fields: vec![field("Flow", "i=11"), field("Id", "i=12")],
            ..Default::default()
        };
        child.inherit_fields(&[field("Id", "i=7"), field("Name", "i=12")]);
        let names: Vec<_> = child.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Name", "Flow"]);
        assert_eq!(child.field("Id").unwrap().data_type, "i=12");

        // Merging again is idempotent.
        child.inherit_fields(&[field("Id", "i=7"), field("Name", "i=12")]);
        assert_eq!(child.fields.len(), 3);
    }

    #[test]
    fn accessors_on_wrong_class() {
        let node = UaNode::new(
            NodeClass::Object,
            "ns=1;i=5001",
            NodeIdVariant::Numeric(5001),
            "http://example.org/UA/Pump/",
        );
        let err = node.data_type().unwrap_err();
        assert_eq!(err.class, NodeClass::Object);
        assert!(node.is_abstract().is_err());
        assert!(node.arguments().is_err());
        assert!(node.method().is_err());

        let method = UaNode::new(
            NodeClass::Method,
            "ns=1;i=7001",
            NodeIdVariant::Numeric(7001),
            "http://example.org/UA/Pump/",
        );
        assert!(method.method().unwrap().input_arguments.is_none());
        assert_eq!(
            method.data_type().unwrap_err().to_string(),
            "data type is not applicable to UAMethod nodes"
        );
    }

    #[test]
    fn optional_is_sticky() {
        let mut node = UaNode::new(
            NodeClass::Variable,
            "ns=1;i=6002",
            NodeIdVariant::Numeric(6002),
            "http://example.org/UA/Pump/",
        );
        node.mark_optional();
        node.mark_optional();
        assert!(node.is_optional);
        assert_eq!(node.variable().unwrap().value_rank, -1);
    }
}

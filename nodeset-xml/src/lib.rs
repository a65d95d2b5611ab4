//! Loading of OPC UA NodeSet2 XML documents into a typed node graph.
//!
//! - A streaming XML reader built on `quick-xml`, in [XmlStreamReader].
//! - Node id and qualified name helpers in [node_id].
//! - The node model and the per-document container in [schema].
//!
//! Documents are parsed in a single forward pass. Nothing here knows about
//! other documents; cross-document links are filled in by the consumer.

mod encoding;
mod error;
pub mod node_id;
pub mod schema;

pub use encoding::{ElementEvent, ElementStart, XmlReadError, XmlStreamReader};
pub use quick_xml::events;

pub use error::{XmlError, XmlErrorInner};
pub use node_id::{NodeIdError, NodeIdVariant, ParsedNodeId};
pub use schema::document::{ModelInfo, ParsedDocument, BASE_NAMESPACE_URI};
pub use schema::node::{
    Argument, DataTypeField, DataTypeInfo, MethodAttributes, NodeClass, NodeKind, NodeRef,
    NotApplicable, Reference, UaNode, VariableAttributes,
};
pub use schema::node_set::{load_nodeset2_file, parse_nodeset2, parse_nodeset2_str};

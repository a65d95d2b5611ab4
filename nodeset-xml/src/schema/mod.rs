//! NodeSet2 schema: the node graph, the document container and the parser.

pub mod document;
pub mod node;
pub mod node_set;

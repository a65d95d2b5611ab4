use thiserror::Error;

use crate::{encoding::XmlReadError, node_id::NodeIdError};

#[derive(Error, Debug)]
/// Inner error variant of an error loading a NodeSet document.
pub enum XmlErrorInner {
    #[error("{0}")]
    /// The XML stream could not be read.
    Read(#[from] XmlReadError),
    #[error("Expected attribute {1} on element {0}")]
    /// Required attribute was missing.
    MissingAttribute(String, String),
    #[error("{0}")]
    /// A node id could not be parsed.
    InvalidNodeId(#[from] NodeIdError),
    #[error("Document declares neither a model nor a namespace URI")]
    /// The document has no model table to take its own namespace from.
    MissingModel,
    #[error("{0}: {1}")]
    /// The document could not be opened.
    Io(String, std::io::Error),
    #[error("{0}")]
    /// Some other error.
    Other(String),
}

#[derive(Error, Debug)]
#[error("{error} at byte {position}")]
/// Error returned from loading a NodeSet document.
pub struct XmlError {
    /// Byte offset in the input where the error was detected.
    pub position: u64,
    /// The inner error variant.
    pub error: XmlErrorInner,
}

impl XmlError {
    /// Create an error at the given position.
    pub fn new(position: u64, error: impl Into<XmlErrorInner>) -> Self {
        Self {
            position,
            error: error.into(),
        }
    }

    /// Create an error for an element missing the attribute `name`.
    pub fn missing_attribute(position: u64, element: &str, name: &str) -> Self {
        Self::new(
            position,
            XmlErrorInner::MissingAttribute(element.to_owned(), name.to_owned()),
        )
    }

    /// Create an error for a file that could not be opened.
    pub fn io(msg: impl Into<String>, error: std::io::Error) -> Self {
        Self::new(0, XmlErrorInner::Io(msg.into(), error))
    }

    /// Create an error with a custom message.
    pub fn other(position: u64, msg: impl Into<String>) -> Self {
        Self::new(position, XmlErrorInner::Other(msg.into()))
    }
}

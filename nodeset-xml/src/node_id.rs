use std::{fmt::Display, sync::OnceLock};

use base64::Engine;
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid nodeId: {0}")]
/// A node id string did not have the form `[ns=<n>;]<i|s|g|b>=<value>`.
pub struct NodeIdError(pub String);

/// The identifier part of a node id, without namespace.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum NodeIdVariant {
    Numeric(u32),
    String(String),
    Guid(Uuid),
    ByteString(Vec<u8>),
}

impl Display for NodeIdVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeIdVariant::Numeric(i) => write!(f, "i={}", i),
            NodeIdVariant::String(s) => write!(f, "s={}", s),
            NodeIdVariant::Guid(g) => write!(f, "g={}", g),
            NodeIdVariant::ByteString(b) => {
                let b64 = base64::engine::general_purpose::STANDARD.encode(b);
                write!(f, "b={}", b64)
            }
        }
    }
}

impl NodeIdVariant {
    /// The bare identifier value, as used when naming generated items.
    pub fn value_string(&self) -> String {
        match self {
            NodeIdVariant::Numeric(i) => i.to_string(),
            NodeIdVariant::String(s) => s.clone(),
            NodeIdVariant::Guid(g) => g.to_string(),
            NodeIdVariant::ByteString(b) => base64::engine::general_purpose::STANDARD.encode(b),
        }
    }
}

/// A node id split into its document-local namespace index and identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ParsedNodeId {
    pub value: NodeIdVariant,
    pub namespace: u16,
}

impl Display for ParsedNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        write!(f, "{}", self.value)
    }
}

static NODEID_REGEX: OnceLock<Regex> = OnceLock::new();

fn nodeid_regex() -> &'static Regex {
    NODEID_REGEX.get_or_init(|| Regex::new(r"^(ns=(?P<ns>[0-9]+);)?(?P<t>[isgb]=.+)$").unwrap())
}

impl ParsedNodeId {
    pub fn parse(id: &str) -> Result<Self, NodeIdError> {
        let invalid = || NodeIdError(id.to_owned());
        let captures = nodeid_regex().captures(id.trim()).ok_or_else(invalid)?;
        let namespace = match captures.name("ns") {
            Some(ns) => ns.as_str().parse::<u16>().map_err(|_| invalid())?,
            None => 0,
        };

        let idf = captures.name("t").ok_or_else(invalid)?.as_str();
        let (k, v) = idf.split_at(2);

        let variant = match k {
            "i=" => NodeIdVariant::Numeric(v.parse::<u32>().map_err(|_| invalid())?),
            "s=" => NodeIdVariant::String(v.to_owned()),
            "g=" => NodeIdVariant::Guid(Uuid::parse_str(v).map_err(|_| invalid())?),
            "b=" => NodeIdVariant::ByteString(
                base64::engine::general_purpose::STANDARD
                    .decode(v)
                    .map_err(|_| invalid())?,
            ),
            _ => return Err(invalid()),
        };
        Ok(Self {
            value: variant,
            namespace,
        })
    }
}

/// Namespace index embedded in a node id string, 0 if absent or unparsable.
pub fn namespace_index_of(node_id: &str) -> u16 {
    ParsedNodeId::parse(node_id)
        .map(|id| id.namespace)
        .unwrap_or(0)
}

/// Rewrite the `ns=` segment of `node_id`, leaving the identifier untouched.
pub fn with_namespace_index(node_id: &str, namespace: u16) -> Result<String, NodeIdError> {
    let mut parsed = ParsedNodeId::parse(node_id)?;
    parsed.namespace = namespace;
    Ok(parsed.to_string())
}

static QUALIFIED_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn qualified_name_regex() -> &'static Regex {
    QUALIFIED_NAME_REGEX.get_or_init(|| Regex::new(r"^((?P<ns>[0-9]+):)?(?P<name>.*)$").unwrap())
}

/// Remove a leading `<index>:` prefix from a qualified browse name.
pub fn strip_namespace_prefix(name: &str) -> &str {
    qualified_name_regex()
        .captures(name)
        .and_then(|c| c.name("name"))
        .map(|m| m.as_str())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_node_id_forms() {
        let id = ParsedNodeId::parse("ns=2;i=1001").unwrap();
        assert_eq!(id.namespace, 2);
        assert_eq!(id.value, NodeIdVariant::Numeric(1001));

        let id = ParsedNodeId::parse("i=58").unwrap();
        assert_eq!(id.namespace, 0);
        assert_eq!(id.to_string(), "i=58");

        let id = ParsedNodeId::parse("ns=1;s=Pump.Speed").unwrap();
        assert_eq!(id.value, NodeIdVariant::String("Pump.Speed".to_owned()));
        assert_eq!(id.value.value_string(), "Pump.Speed");

        let id = ParsedNodeId::parse("g=72962b91-fa75-4ae6-8d28-b404dc7daf63").unwrap();
        assert!(matches!(id.value, NodeIdVariant::Guid(_)));

        let id = ParsedNodeId::parse("ns=3;b=AQID").unwrap();
        assert_eq!(id.value, NodeIdVariant::ByteString(vec![1, 2, 3]));
        assert_eq!(id.to_string(), "ns=3;b=AQID");
    }

    #[test]
    fn parse_invalid_node_ids() {
        assert!(ParsedNodeId::parse("").is_err());
        assert!(ParsedNodeId::parse("HasComponent").is_err());
        assert!(ParsedNodeId::parse("ns=x;i=1").is_err());
        assert!(ParsedNodeId::parse("i=abc").is_err());
        assert!(ParsedNodeId::parse("ns=70000;i=1").is_err());
    }

    #[test]
    fn rewrite_namespace_index() {
        assert_eq!(with_namespace_index("ns=1;i=6101", 2).unwrap(), "ns=2;i=6101");
        assert_eq!(with_namespace_index("i=63", 3).unwrap(), "ns=3;i=63");
        assert_eq!(with_namespace_index("ns=4;i=63", 0).unwrap(), "i=63");
        assert_eq!(namespace_index_of("ns=5;i=1"), 5);
        assert_eq!(namespace_index_of("garbage"), 0);
    }

    #[test]
    fn strip_browse_name_prefix() {
        assert_eq!(strip_namespace_prefix("1:PumpType"), "PumpType");
        assert_eq!(strip_namespace_prefix("FolderType"), "FolderType");
        assert_eq!(strip_namespace_prefix("12:A:B"), "A:B");
    }
}

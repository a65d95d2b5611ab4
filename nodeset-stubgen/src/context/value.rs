use std::collections::BTreeMap;

use serde::Serialize;

pub type RenderMap = BTreeMap<String, RenderValue>;

/// Generic value tree handed to a template engine.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RenderValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<RenderValue>),
    Map(RenderMap),
}

impl RenderValue {
    pub fn get(&self, key: &str) -> Option<&RenderValue> {
        match self {
            Self::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RenderValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Look up a string at `key` of a map value.
    pub fn str_at(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self)
    }
}

impl From<&RenderValue> for serde_json::Value {
    fn from(value: &RenderValue) -> Self {
        match value {
            RenderValue::Bool(b) => serde_json::Value::Bool(*b),
            RenderValue::Int(i) => serde_json::Value::from(*i),
            RenderValue::Str(s) => serde_json::Value::String(s.clone()),
            RenderValue::List(l) => serde_json::Value::Array(l.iter().map(Into::into).collect()),
            RenderValue::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for RenderValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RenderValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for RenderValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<String> for RenderValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for RenderValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<Vec<RenderValue>> for RenderValue {
    fn from(value: Vec<RenderValue>) -> Self {
        Self::List(value)
    }
}

impl From<RenderMap> for RenderValue {
    fn from(value: RenderMap) -> Self {
        Self::Map(value)
    }
}

/// Build a [`RenderMap`] from `key => value` pairs.
macro_rules! render_map {
    ($($key:literal => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::context::RenderMap::new();
        $(map.insert($key.to_owned(), $crate::context::RenderValue::from($value));)*
        map
    }};
}

pub(crate) use render_map;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_json() {
        let value = RenderValue::from(render_map! {
            "name" => "Speed_6001",
            "nodeIndex" => 3usize,
            "isEnum" => false,
            "fields" => vec![RenderValue::from(render_map! { "fieldName" => "flow" })],
        });
        assert_eq!(
            value.to_json(),
            serde_json::json!({
                "name": "Speed_6001",
                "nodeIndex": 3,
                "isEnum": false,
                "fields": [{ "fieldName": "flow" }],
            })
        );
        assert_eq!(serde_json::to_value(&value).unwrap(), value.to_json());
        assert_eq!(value.str_at("name"), Some("Speed_6001"));
        assert_eq!(value.get("nodeIndex").and_then(|v| v.as_int()), Some(3));
        assert!(value.get("missing").is_none());
    }
}

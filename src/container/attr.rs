use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute map attached to a group or dataset.
pub type Attrs = BTreeMap<String, AttrValue>;

/// A scalar or list attribute value.
///
/// Non-finite floats do not survive persistence; the manifest is JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// String-list view. An empty list decodes as `IntList`, so it is
    /// accepted here too.
    pub fn as_str_list(&self) -> Option<Vec<String>> {
        match self {
            AttrValue::StrList(v) => Some(v.clone()),
            AttrValue::IntList(v) if v.is_empty() => Some(Vec::new()),
            AttrValue::FloatList(v) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Str(v) => write!(f, "{v}"),
            AttrValue::IntList(v) => write!(f, "{v:?}"),
            AttrValue::FloatList(v) => write!(f, "{v:?}"),
            AttrValue::StrList(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::IntList(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::FloatList(v)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::StrList(v)
    }
}

impl From<&[String]> for AttrValue {
    fn from(v: &[String]) -> Self {
        AttrValue::StrList(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_variants() {
        let mut attrs = Attrs::new();
        attrs.insert("version".into(), 2i64.into());
        attrs.insert("scale".into(), 2.0f64.into());
        attrs.insert("host".into(), "cori".into());
        attrs.insert("columns".into(), vec!["a".to_string(), "b".to_string()].into());

        let json = serde_json::to_string(&attrs).unwrap();
        let back: Attrs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attrs);
    }

    #[test]
    fn empty_list_reads_as_string_list() {
        let value: AttrValue = serde_json::from_str("[]").unwrap();
        assert_eq!(value.as_str_list(), Some(Vec::new()));
    }
}

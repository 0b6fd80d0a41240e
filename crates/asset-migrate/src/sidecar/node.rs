//! Generic YAML node tree with typed accessors.

use std::collections::HashMap;

use serde_yaml::Value;

use super::SidecarError;

type NodeResult<T> = std::result::Result<T, SidecarError>;

/// One node of a parsed sidecar document.
#[derive(Debug, Clone, PartialEq)]
pub enum SidecarNode {
    /// Any scalar, kept as its source text (`null` becomes the empty string).
    Scalar(String),
    /// Key/value pairs in document order.
    Mapping(SidecarMapping),
    /// Items in document order.
    Sequence(Vec<SidecarNode>),
}

/// Ordered mapping with a hash index over its keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidecarMapping {
    entries: Vec<(String, SidecarNode)>,
    index: HashMap<String, usize>,
}

impl SidecarMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. A repeated key shadows the earlier entry for lookups.
    pub fn insert(&mut self, key: impl Into<String>, value: SidecarNode) {
        let key = key.into();
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&SidecarNode> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SidecarNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SidecarNode)> for SidecarMapping {
    fn from_iter<I: IntoIterator<Item = (String, SidecarNode)>>(iter: I) -> Self {
        let mut mapping = SidecarMapping::new();
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

impl SidecarNode {
    /// Shape name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SidecarNode::Scalar(_) => "scalar",
            SidecarNode::Mapping(_) => "mapping",
            SidecarNode::Sequence(_) => "sequence",
        }
    }

    /// The node as a mapping.
    pub fn as_mapping(&self) -> NodeResult<&SidecarMapping> {
        match self {
            SidecarNode::Mapping(mapping) => Ok(mapping),
            other => Err(SidecarError::Shape {
                expected: "mapping",
                found: other.kind_name(),
            }),
        }
    }

    /// The node as a sequence.
    pub fn as_sequence(&self) -> NodeResult<&[SidecarNode]> {
        match self {
            SidecarNode::Sequence(items) => Ok(items),
            other => Err(SidecarError::Shape {
                expected: "sequence",
                found: other.kind_name(),
            }),
        }
    }

    /// Required child of a mapping node.
    pub fn child(&self, key: &str) -> NodeResult<&SidecarNode> {
        self.as_mapping()?
            .get(key)
            .ok_or_else(|| SidecarError::MissingKey {
                key: key.to_string(),
            })
    }

    /// Optional child. `None` when the key is absent or the node is not a mapping.
    pub fn get(&self, key: &str) -> Option<&SidecarNode> {
        match self {
            SidecarNode::Mapping(mapping) => mapping.get(key),
            _ => None,
        }
    }

    /// Scalar text.
    pub fn as_str(&self) -> NodeResult<&str> {
        match self {
            SidecarNode::Scalar(text) => Ok(text),
            other => Err(SidecarError::Type {
                expected: "scalar",
                value: other.kind_name().to_string(),
            }),
        }
    }

    /// Scalar parsed as a signed integer.
    pub fn as_i64(&self) -> NodeResult<i64> {
        let text = self.as_str()?.trim();
        text.parse().map_err(|_| SidecarError::Type {
            expected: "integer",
            value: text.to_string(),
        })
    }

    /// Scalar parsed as a float.
    pub fn as_f64(&self) -> NodeResult<f64> {
        let text = self.as_str()?.trim();
        let special = match text.to_ascii_lowercase().as_str() {
            ".inf" | "+.inf" => Some(f64::INFINITY),
            "-.inf" => Some(f64::NEG_INFINITY),
            ".nan" => Some(f64::NAN),
            _ => None,
        };
        match special {
            Some(value) => Ok(value),
            None => text.parse().map_err(|_| SidecarError::Type {
                expected: "float",
                value: text.to_string(),
            }),
        }
    }

    /// Importer flag: integers are true when positive, `true`/`false` are accepted too.
    pub fn as_flag(&self) -> NodeResult<bool> {
        let text = self.as_str()?.trim();
        match text {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => text.parse::<i64>().map(|v| v > 0).map_err(|_| SidecarError::Type {
                expected: "flag",
                value: text.to_string(),
            }),
        }
    }

    /// Key/value pairs of a mapping, or of a sequence of single-key mappings.
    ///
    /// Property tables appear in both layouts depending on the serializer
    /// version (`- _Color: {...}` items or a plain mapping).
    pub fn entries(&self) -> NodeResult<Vec<(&str, &SidecarNode)>> {
        match self {
            SidecarNode::Mapping(mapping) => Ok(mapping.iter().collect()),
            SidecarNode::Sequence(items) => {
                let mut entries = Vec::new();
                for item in items {
                    entries.extend(item.as_mapping()?.iter());
                }
                Ok(entries)
            }
            SidecarNode::Scalar(_) => Err(SidecarError::Shape {
                expected: "mapping or sequence",
                found: "scalar",
            }),
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, SidecarNode::Mapping(_))
    }
}

impl From<Value> for SidecarNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SidecarNode::Scalar(String::new()),
            Value::Bool(b) => SidecarNode::Scalar(b.to_string()),
            Value::Number(n) => SidecarNode::Scalar(n.to_string()),
            Value::String(s) => SidecarNode::Scalar(s),
            Value::Sequence(items) => {
                SidecarNode::Sequence(items.into_iter().map(SidecarNode::from).collect())
            }
            Value::Mapping(map) => SidecarNode::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_text(k), SidecarNode::from(v)))
                    .collect(),
            ),
            // Type tags (`!u!21`) carry nothing the migrators read.
            Value::Tagged(tagged) => SidecarNode::from(tagged.value),
        }
    }
}

fn key_text(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Tagged(tagged) => key_text(tagged.value),
        complex => serde_yaml::to_string(&complex)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

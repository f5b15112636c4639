//! Document model consumed by the chain compiler.
//!
//! The YAML value produced by `serde_yml` is converted once into a closed
//! [`DocumentNode`] so that the compiler can pattern-match on node shapes
//! instead of probing a dynamically typed tree.

use serde_yml::Value;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    /// A command line or a configuration value.
    Scalar(String),
    /// A mapping with exactly one scalar key.
    KeyedBlock {
        key: String,
        value: Box<DocumentNode>,
    },
    Sequence(Vec<DocumentNode>),
    /// Any shape a chain cannot contain (null, multi-key mapping, ...).
    Other(&'static str),
}

impl DocumentNode {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentNode::Scalar(_) => "scalar",
            DocumentNode::KeyedBlock { .. } => "single-key mapping",
            DocumentNode::Sequence(_) => "sequence",
            DocumentNode::Other(kind) => kind,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            DocumentNode::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Value> for DocumentNode {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => DocumentNode::Scalar(s.clone()),
            // `- true` or `- 42` is still meant as command text
            Value::Bool(b) => DocumentNode::Scalar(b.to_string()),
            Value::Number(n) => DocumentNode::Scalar(n.to_string()),
            Value::Sequence(items) => DocumentNode::Sequence(items.iter().map(DocumentNode::from).collect()),
            Value::Mapping(mapping) => {
                if mapping.len() != 1 {
                    return DocumentNode::Other("multi-key mapping");
                }
                match mapping.iter().next() {
                    Some((key, value)) => match DocumentNode::from(key) {
                        DocumentNode::Scalar(key) => DocumentNode::KeyedBlock {
                            key,
                            value: Box::new(DocumentNode::from(value)),
                        },
                        _ => DocumentNode::Other("mapping with non-scalar key"),
                    },
                    None => DocumentNode::Other("empty mapping"),
                }
            }
            Value::Tagged(tagged) => DocumentNode::from(&tagged.value),
            Value::Null => DocumentNode::Other("null"),
        }
    }
}

/// Parses YAML text into a [`DocumentNode`] tree.
pub fn parse_document(text: &str) -> Result<DocumentNode> {
    let value: Value = serde_yml::from_str(text)?;
    Ok(DocumentNode::from(&value))
}

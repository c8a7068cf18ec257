//! Tree Documents
//!
//! A tree document is a JSON array of node objects. Each object may carry the
//! identifying key (the configured id column), any number of attributes, and a
//! nested array of child objects under the configured children key:
//!
//! ```json
//! [
//!   {"id": 1, "name": "Root", "children": [
//!     {"id": 2, "name": "First"},
//!     {"name": "Created on the fly"}
//!   ]}
//! ]
//! ```

use serde_json::{Map, Value};

use crate::config::TreeConfig;
use crate::models::node::key_from_value;
use crate::tree::TreeError;

/// One parsed entry of a tree document
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    /// Identifying key, when present and non-empty
    pub key: Option<String>,

    /// Data attributes (without the key and the children list)
    pub attributes: Map<String, Value>,

    /// Nested entries in document order
    pub children: Vec<NodeEntry>,
}

impl NodeEntry {
    /// Parse a whole document (a JSON array of entries)
    pub fn parse_document(document: &Value, config: &TreeConfig) -> Result<Vec<Self>, TreeError> {
        Self::parse_list(document, config, "$")
    }

    fn parse_list(value: &Value, config: &TreeConfig, path: &str) -> Result<Vec<Self>, TreeError> {
        let items = value.as_array().ok_or_else(|| {
            TreeError::invalid_document(format!("expected an array at {}", path))
        })?;

        items
            .iter()
            .enumerate()
            .map(|(index, item)| Self::parse_entry(item, config, &format!("{}[{}]", path, index)))
            .collect()
    }

    fn parse_entry(value: &Value, config: &TreeConfig, path: &str) -> Result<Self, TreeError> {
        let object = value.as_object().ok_or_else(|| {
            TreeError::invalid_document(format!("expected an object at {}", path))
        })?;

        let mut attributes = object.clone();
        let key = attributes
            .remove(&config.columns.id)
            .as_ref()
            .and_then(key_from_value);

        let children = match attributes.remove(&config.children_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(list) => Self::parse_list(
                &list,
                config,
                &format!("{}.{}", path, config.children_key),
            )?,
        };

        Ok(Self {
            key,
            attributes,
            children,
        })
    }

    /// Number of entries in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_nested_document() {
        let config = TreeConfig::default();
        let document = json!([
            {"id": 1, "name": "Root", "children": [
                {"id": "2", "name": "First"},
                {"name": "Fresh", "children": []}
            ]},
            {"id": "", "name": "Keyless"}
        ]);

        let entries = NodeEntry::parse_document(&document, &config).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.as_deref(), Some("1"));
        assert_eq!(entries[0].attributes.get("name"), Some(&json!("Root")));
        assert!(!entries[0].attributes.contains_key("children"));
        assert_eq!(entries[0].children.len(), 2);
        assert_eq!(entries[0].children[0].key.as_deref(), Some("2"));
        assert_eq!(entries[0].children[1].key, None);
        assert_eq!(entries[0].subtree_len(), 3);
        assert_eq!(entries[1].key, None);
    }

    #[test]
    fn test_custom_children_key() {
        let config = TreeConfig::default().with_children_key("items");
        let document = json!([{"id": 1, "items": [{"id": 2}], "children": "kept"}]);

        let entries = NodeEntry::parse_document(&document, &config).unwrap();

        assert_eq!(entries[0].children.len(), 1);
        assert_eq!(entries[0].attributes.get("children"), Some(&json!("kept")));
    }

    #[test]
    fn test_rejects_non_object_entries() {
        let config = TreeConfig::default();
        let err = NodeEntry::parse_document(&json!([{"id": 1, "children": [3]}]), &config)
            .unwrap_err();
        assert!(err.to_string().contains("$[0].children[0]"));
    }

    #[test]
    fn test_rejects_non_array_document() {
        let config = TreeConfig::default();
        assert!(NodeEntry::parse_document(&json!({"id": 1}), &config).is_err());
    }
}

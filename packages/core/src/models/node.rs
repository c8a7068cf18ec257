//! Tree Node Data Structures
//!
//! This module defines `TreeNode`, the in-memory image of one row of a nested
//! set table, and the relation predicates that can be answered from the
//! interval alone.
//!
//! # Invariants
//!
//! Within one scope, after every completed mutation:
//!
//! 1. `right = left + 1` iff the node is a leaf; otherwise the node's interval
//!    is exactly covered by its children's intervals plus its own bounds
//! 2. A child's interval lies strictly inside its parent's
//! 3. `depth` equals the number of ancestors (roots are 0)
//! 4. The `2N` bounds of the `N` live nodes are pairwise distinct
//! 5. Roots occupy disjoint top-level intervals
//!
//! `left`, `right`, `depth` and `parent_id` are owned by the tree engine. Code
//! outside the engine reads them but must not persist edits to them directly.
//!
//! # Examples
//!
//! ```rust
//! use canopy_core::models::TreeNode;
//! use serde_json::json;
//!
//! let node = TreeNode::with_id("electronics")
//!     .with_attribute("name", json!("Electronics"))
//!     .with_scope_value("tenant_id", json!(7));
//! assert!(node.is_root());
//! assert!(!node.exists());
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::TreeConfig;

/// Scope column values partitioning the table into independent forests
pub type Scope = BTreeMap<String, Value>;

/// Whether `fill` may assign engine-owned fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Ignore id, parent, left, right and depth keys
    Guarded,

    /// Accept every key (bulk mapping)
    Unguarded,
}

/// Snapshot of the persisted values used for dirty tracking
#[derive(Debug, Clone, PartialEq, Default)]
struct StoredState {
    parent_id: Option<String>,
    scope: Scope,
}

/// One node of a nested set
///
/// # Fields
///
/// - `id`: Unique identifier, immutable once created
/// - `parent_id`: Parent node ID (`None` means root)
/// - `left` / `right`: Interval bounds (`None` until the node is positioned)
/// - `depth`: Number of ancestors
/// - `scope`: Values of the configured scope columns
/// - `attributes`: Every other field, stored as JSON
/// - `updated_at`: Last write timestamp
/// - `deleted_at`: Soft-delete marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,

    pub parent_id: Option<String>,

    pub left: Option<i64>,

    pub right: Option<i64>,

    pub depth: Option<i64>,

    #[serde(default)]
    pub scope: Scope,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    pub updated_at: Option<DateTime<Utc>>,

    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    stored: Option<StoredState>,
}

impl Default for TreeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeNode {
    /// Create an unpositioned root node with a generated UUID
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create an unpositioned root node with the given ID
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            left: None,
            right: None,
            depth: None,
            scope: Scope::new(),
            attributes: Map::new(),
            updated_at: None,
            deleted_at: None,
            stored: None,
        }
    }

    /// Set the parent that the node will be moved under when saved
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set one scope column value
    pub fn with_scope_value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.scope.insert(column.into(), value);
        self
    }

    /// Replace the whole scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Set one attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Look up an attribute
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Record the current parent and scope as persisted
    pub(crate) fn mark_persisted(&mut self) {
        self.stored = Some(StoredState {
            parent_id: self.parent_id.clone(),
            scope: self.scope.clone(),
        });
    }

    /// Whether the node has a row in the table
    pub fn exists(&self) -> bool {
        self.stored.is_some()
    }

    /// Parent ID as last persisted (`None` for new nodes or persisted roots)
    pub fn stored_parent_id(&self) -> Option<&str> {
        self.stored.as_ref().and_then(|s| s.parent_id.as_deref())
    }

    /// Whether `parent_id` differs from the persisted value
    ///
    /// A new node counts as dirty only when a parent was assigned; new roots
    /// are already placed correctly by the default interval.
    pub fn is_parent_dirty(&self) -> bool {
        match &self.stored {
            Some(stored) => stored.parent_id != self.parent_id,
            None => self.parent_id.is_some(),
        }
    }

    /// Whether the scope differs from the persisted value
    pub fn is_scope_dirty(&self) -> bool {
        self.stored
            .as_ref()
            .map(|stored| stored.scope != self.scope)
            .unwrap_or(false)
    }

    /// Whether the node is soft-deleted
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// `(left, right)` when both bounds are known
    pub fn interval(&self) -> Option<(i64, i64)> {
        match (self.left, self.right) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => None,
        }
    }

    /// `right - left + 1`, twice the subtree size
    pub fn width(&self) -> Option<i64> {
        self.interval().map(|(left, right)| right - left + 1)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_child(&self) -> bool {
        !self.is_root()
    }

    /// Persisted node without children
    pub fn is_leaf(&self) -> bool {
        self.exists() && matches!(self.interval(), Some((left, right)) if right - left == 1)
    }

    /// Neither root nor leaf
    pub fn is_trunk(&self) -> bool {
        !self.is_root() && !self.is_leaf()
    }

    pub fn is_descendant_of(&self, other: &TreeNode) -> bool {
        match (self.interval(), other.interval()) {
            (Some((left, _)), Some((o_left, o_right))) => {
                left > o_left && left < o_right && self.in_same_scope(other)
            }
            _ => false,
        }
    }

    pub fn is_self_or_descendant_of(&self, other: &TreeNode) -> bool {
        match (self.interval(), other.interval()) {
            (Some((left, _)), Some((o_left, o_right))) => {
                left >= o_left && left < o_right && self.in_same_scope(other)
            }
            _ => false,
        }
    }

    pub fn is_ancestor_of(&self, other: &TreeNode) -> bool {
        match (self.interval(), other.interval()) {
            (Some((left, right)), Some((o_left, _))) => {
                left < o_left && right > o_left && self.in_same_scope(other)
            }
            _ => false,
        }
    }

    pub fn is_self_or_ancestor_of(&self, other: &TreeNode) -> bool {
        match (self.interval(), other.interval()) {
            (Some((left, right)), Some((o_left, _))) => {
                left <= o_left && right > o_left && self.in_same_scope(other)
            }
            _ => false,
        }
    }

    /// Whether both nodes have the same scope values
    pub fn in_same_scope(&self, other: &TreeNode) -> bool {
        self.scope == other.scope
    }

    /// Whether this node's interval lies within `other`'s (inclusive)
    pub fn inside_subtree(&self, other: &TreeNode) -> bool {
        match (self.interval(), other.interval()) {
            (Some((left, right)), Some((o_left, o_right))) => {
                left >= o_left && left <= o_right && right >= o_left && right <= o_right
            }
            _ => false,
        }
    }

    /// Same row identity
    pub fn equals(&self, other: &TreeNode) -> bool {
        self.id == other.id && self.in_same_scope(other)
    }

    /// Mass-assign attributes
    ///
    /// Keys naming a scope column update the scope; keys naming a structural
    /// column are ignored in `FillMode::Guarded` and assigned in
    /// `FillMode::Unguarded`. Everything else lands in `attributes`.
    pub fn fill(&mut self, data: Map<String, Value>, mode: FillMode, config: &TreeConfig) {
        let columns = &config.columns;

        for (key, value) in data {
            if config.scope_columns.contains(&key) {
                self.scope.insert(key, value);
                continue;
            }

            let structural = key == columns.id
                || key == columns.parent
                || key == columns.left
                || key == columns.right
                || key == columns.depth;

            if !structural {
                self.attributes.insert(key, value);
                continue;
            }

            if mode == FillMode::Guarded {
                tracing::debug!("Ignoring guarded attribute '{}' on node {}", key, self.id);
                continue;
            }

            if key == columns.id {
                // Identity never changes on a persisted row
                if !self.exists() {
                    if let Some(id) = key_from_value(&value) {
                        self.id = id;
                    }
                }
            } else if key == columns.parent {
                self.parent_id = key_from_value(&value);
            } else if key == columns.left {
                self.left = value.as_i64();
            } else if key == columns.right {
                self.right = value.as_i64();
            } else {
                self.depth = value.as_i64();
            }
        }
    }
}

/// Interpret a JSON value as a node key
///
/// Strings are used as-is, numbers by their decimal form; empty strings,
/// `null` and composite values are not keys.
pub fn key_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn positioned(id: &str, left: i64, right: i64) -> TreeNode {
        let mut node = TreeNode::with_id(id);
        node.left = Some(left);
        node.right = Some(right);
        node.mark_persisted();
        node
    }

    #[test]
    fn test_new_node_is_unpositioned_root() {
        let node = TreeNode::new();
        assert!(node.is_root());
        assert!(!node.exists());
        assert!(!node.is_leaf());
        assert_eq!(node.width(), None);
        assert!(Uuid::parse_str(&node.id).is_ok());
    }

    #[test]
    fn test_parent_dirty_tracking() {
        let node = TreeNode::with_id("a");
        assert!(!node.is_parent_dirty());

        let node = TreeNode::with_id("b").with_parent("a");
        assert!(node.is_parent_dirty());

        let mut node = positioned("c", 2, 3);
        assert!(!node.is_parent_dirty());
        node.parent_id = Some("a".to_string());
        assert!(node.is_parent_dirty());
        node.mark_persisted();
        assert!(!node.is_parent_dirty());
        node.parent_id = None;
        assert!(node.is_parent_dirty());
    }

    #[test]
    fn test_interval_relations() {
        let root = positioned("root", 1, 8);
        let mut child = positioned("child", 2, 5);
        child.parent_id = Some("root".to_string());
        let mut grandchild = positioned("grandchild", 3, 4);
        grandchild.parent_id = Some("child".to_string());

        assert!(child.is_descendant_of(&root));
        assert!(grandchild.is_descendant_of(&root));
        assert!(!root.is_descendant_of(&root));
        assert!(root.is_self_or_descendant_of(&root));
        assert!(root.is_ancestor_of(&grandchild));
        assert!(!grandchild.is_ancestor_of(&root));
        assert!(child.is_self_or_ancestor_of(&child));
        assert!(grandchild.inside_subtree(&child));
        assert!(!root.inside_subtree(&child));

        assert!(grandchild.is_leaf());
        assert!(child.is_trunk());
        assert!(!root.is_trunk());
        assert_eq!(root.width(), Some(8));
    }

    #[test]
    fn test_relations_respect_scope() {
        let root = positioned("root", 1, 4).with_scope_value("tenant", json!(1));
        let child = positioned("child", 2, 3).with_scope_value("tenant", json!(2));
        assert!(!child.is_descendant_of(&root));
        assert!(!root.is_ancestor_of(&child));
    }

    #[test]
    fn test_guarded_fill_ignores_structural_keys() {
        let config = TreeConfig::default().with_scope(["tenant"]);
        let mut node = TreeNode::with_id("a");
        let data = json!({
            "id": "b",
            "parent_id": "p",
            "lft": 10,
            "name": "Alpha",
            "tenant": 3
        });

        node.fill(data.as_object().cloned().unwrap(), FillMode::Guarded, &config);

        assert_eq!(node.id, "a");
        assert_eq!(node.parent_id, None);
        assert_eq!(node.left, None);
        assert_eq!(node.attribute("name"), Some(&json!("Alpha")));
        assert_eq!(node.scope.get("tenant"), Some(&json!(3)));
    }

    #[test]
    fn test_unguarded_fill_assigns_structural_keys() {
        let config = TreeConfig::default();
        let mut node = TreeNode::with_id("a");
        let data = json!({"id": 42, "parent_id": "p", "lft": 10, "rgt": 11, "depth": 2});

        node.fill(data.as_object().cloned().unwrap(), FillMode::Unguarded, &config);

        assert_eq!(node.id, "42");
        assert_eq!(node.parent_id.as_deref(), Some("p"));
        assert_eq!(node.interval(), Some((10, 11)));
        assert_eq!(node.depth, Some(2));
        assert!(node.attributes.is_empty());
    }

    #[test]
    fn test_unguarded_fill_keeps_persisted_identity() {
        let config = TreeConfig::default();
        let mut node = positioned("a", 1, 2);
        let data = json!({"id": "b", "parent_id": null});

        node.fill(data.as_object().cloned().unwrap(), FillMode::Unguarded, &config);

        assert_eq!(node.id, "a");
        assert!(node.is_root());
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(key_from_value(&json!("x")), Some("x".to_string()));
        assert_eq!(key_from_value(&json!(7)), Some("7".to_string()));
        assert_eq!(key_from_value(&json!("")), None);
        assert_eq!(key_from_value(&Value::Null), None);
        assert_eq!(key_from_value(&json!([1])), None);
    }
}

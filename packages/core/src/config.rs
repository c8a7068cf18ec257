//! Tree Configuration
//!
//! Describes how a nested set maps onto a relational table: the table name,
//! the structural column names, the sibling order key, the scope columns that
//! partition the table into independent forests, and the optional soft-delete
//! column.
//!
//! Every name in this struct is interpolated into SQL, so `validate()` must
//! pass before a config is handed to the storage layer.
//!
//! # Examples
//!
//! ```rust
//! use canopy_core::config::{OrderKey, TreeConfig};
//!
//! let config = TreeConfig::new("categories")
//!     .with_scope(["tenant_id"])
//!     .with_order(OrderKey::Attribute("name".to_string()))
//!     .with_soft_deletes("deleted_at");
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::tree::TreeError;

/// Default number of attempts for a renumbering transaction that hits `StaleState`
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base backoff between retries (doubles on each attempt)
const DEFAULT_BASE_BACKOFF_MS: u64 = 10;

/// Names of the structural columns of the node table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Primary key column
    pub id: String,

    /// Parent reference column (NULL means root)
    pub parent: String,

    /// Left bound of the node interval
    pub left: String,

    /// Right bound of the node interval
    pub right: String,

    /// Number of ancestors
    pub depth: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            parent: "parent_id".to_string(),
            left: "lft".to_string(),
            right: "rgt".to_string(),
            depth: "depth".to_string(),
        }
    }
}

/// Sibling ordering used by every traversal and by the rebuild engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum OrderKey {
    /// Order by the left bound (document order)
    #[default]
    Left,

    /// Order by an attribute stored in the JSON attributes column
    Attribute(String),
}

/// Bounded retry for transactions that fail with `StaleState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubled for each further attempt
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
        }
    }
}

/// Configuration for one nested set table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Table holding the nodes
    pub table: String,

    /// Structural column names
    pub columns: ColumnNames,

    /// JSON column holding non-structural attributes
    pub attributes_column: String,

    /// Column stamped on every write
    pub updated_at_column: String,

    /// Sibling order key
    pub order: OrderKey,

    /// Columns partitioning the table into independent forests
    pub scope_columns: Vec<String>,

    /// Soft-delete marker column; `None` disables soft deletes
    pub soft_delete_column: Option<String>,

    /// Key holding nested children in mapper documents
    pub children_key: String,

    /// Retry policy for owned renumbering transactions
    pub retry: RetryPolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            table: "nodes".to_string(),
            columns: ColumnNames::default(),
            attributes_column: "attributes".to_string(),
            updated_at_column: "updated_at".to_string(),
            order: OrderKey::Left,
            scope_columns: Vec::new(),
            soft_delete_column: None,
            children_key: "children".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl TreeConfig {
    /// Create a config with default column names for the given table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Partition the table by the given columns
    pub fn with_scope<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Order siblings by the given key
    pub fn with_order(mut self, order: OrderKey) -> Self {
        self.order = order;
        self
    }

    /// Enable soft deletes using the given marker column
    pub fn with_soft_deletes(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    /// Use a different children key for mapper documents
    pub fn with_children_key(mut self, key: impl Into<String>) -> Self {
        self.children_key = key.into();
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether the table is partitioned into scopes
    pub fn is_scoped(&self) -> bool {
        !self.scope_columns.is_empty()
    }

    /// Whether soft deletes are enabled
    pub fn soft_deletes(&self) -> bool {
        self.soft_delete_column.is_some()
    }

    /// Parse a config from JSON, validating identifiers
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TreeError::serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every configured name is a plain SQL identifier and that no
    /// two columns collide
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut names: Vec<&str> = vec![
            &self.columns.id,
            &self.columns.parent,
            &self.columns.left,
            &self.columns.right,
            &self.columns.depth,
            &self.attributes_column,
            &self.updated_at_column,
        ];
        names.extend(self.scope_columns.iter().map(String::as_str));
        if let Some(column) = &self.soft_delete_column {
            names.push(column);
        }

        check_identifier(&self.table)?;
        for name in &names {
            check_identifier(name)?;
        }
        if let OrderKey::Attribute(name) = &self.order {
            check_identifier(name)?;
        }

        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != names.len() {
            return Err(TreeError::invalid_config("column names must be distinct"));
        }

        if self.children_key.is_empty() {
            return Err(TreeError::invalid_config("children key must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(TreeError::invalid_config(
                "retry.max_attempts must be at least 1",
            ));
        }

        Ok(())
    }
}

fn check_identifier(name: &str) -> Result<(), TreeError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(TreeError::invalid_config(format!(
            "'{}' is not a valid SQL identifier",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TreeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.columns.left, "lft");
        assert_eq!(config.order, OrderKey::Left);
        assert!(!config.is_scoped());
        assert!(!config.soft_deletes());
    }

    #[test]
    fn test_rejects_injection_in_table_name() {
        let config = TreeConfig::new("nodes; DROP TABLE nodes");
        assert!(matches!(
            config.validate(),
            Err(TreeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_colliding_columns() {
        let config = TreeConfig::default().with_scope(["lft"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = TreeConfig::default().with_retry(RetryPolicy {
            max_attempts: 0,
            base_backoff_ms: 1,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = TreeConfig::from_json(
            r#"{
                "table": "menus",
                "scope_columns": ["menu_id"],
                "order": {"kind": "attribute", "name": "position"},
                "soft_delete_column": "deleted_at"
            }"#,
        )
        .unwrap();

        assert_eq!(config.table, "menus");
        assert_eq!(config.columns, ColumnNames::default());
        assert_eq!(config.order, OrderKey::Attribute("position".to_string()));
        assert_eq!(config.scope_columns, vec!["menu_id".to_string()]);
        assert!(config.soft_deletes());
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_from_json_rejects_bad_order_attribute() {
        let result = TreeConfig::from_json(r#"{"order": {"kind": "attribute", "name": "a-b"}}"#);
        assert!(result.is_err());
    }
}

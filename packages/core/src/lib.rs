//! Canopy Core - Nested Set Tree Maintenance
//!
//! This crate stores forests in a relational table using the nested set
//! model: every node carries a `left`/`right` interval and a `depth`, so
//! that subtree, ancestor and sibling queries are single range scans.
//! The engine keeps those intervals consistent across inserts, moves,
//! deletes and restores.
//!
//! # Architecture
//!
//! - **Explicit Transactions**: every renumbering runs in one write
//!   transaction, either owned by the operation or joined from the caller
//! - **Scopes**: configured columns partition the table into independent
//!   forests with their own numbering
//! - **Pure JSON Attributes**: non-structural fields live in one JSON column
//! - **libsql/Turso**: embedded SQLite-compatible storage behind the
//!   `TreeStore` trait
//!
//! # Modules
//!
//! - [`config`] - Table, column, scope and retry configuration
//! - [`models`] - `TreeNode` and mapper documents
//! - [`db`] - Storage abstraction and its libsql implementation
//! - [`tree`] - Traversal, mutation, rebuild, mapping and validation
//! - [`services`] - `TreeService`, the repository facade

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod tree;

// Re-export commonly used types
pub use config::{ColumnNames, OrderKey, RetryPolicy, TreeConfig};
pub use models::*;
pub use services::*;
pub use tree::{Position, TreeError, TxScope};

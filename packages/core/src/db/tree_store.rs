//! TreeStore Trait - Transactional Storage Abstraction
//!
//! This module defines the storage collaborator consumed by the tree engine.
//! The engine never talks SQL; it opens a transaction through `TreeStore` and
//! issues range-filtered reads, locks and bulk updates through
//! `StoreTransaction`.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so that embedded and networked
//!    backends share one interface
//! 2. **Explicit Transactions**: There is no ambient transaction. Whoever
//!    calls `begin()` owns the handle and is the only party that commits or
//!    rolls it back; callees receive `&dyn StoreTransaction` and never commit
//! 3. **Shared Handles**: `begin()` returns an `Arc` so a handle can be
//!    passed into joined engine operations while the owner keeps it
//!
//! # Examples
//!
//! ```rust,no_run
//! use canopy_core::db::{NodeQuery, TreeStore, TursoStore, TxMode};
//! use canopy_core::config::TreeConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = TursoStore::open("./data/tree.db", TreeConfig::default()).await?;
//! let tx = store.begin(TxMode::Read).await?;
//! let roots = tx.select(&NodeQuery::new().is_null(canopy_core::db::Column::Parent)).await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::TreeConfig;
use crate::db::query::{Column, NodeQuery, Trashed};
use crate::db::DatabaseError;
use crate::models::TreeNode;

/// Transaction flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Reads only; does not block other readers or writers up front
    Read,
    /// Structural writes; serializes against other writers from the start
    Write,
}

/// Row lock strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Readers may share; writers wait
    Shared,
    /// Exclusive for the remainder of the transaction
    Update,
}

/// Shared handle to an open transaction
pub type SharedTransaction = Arc<dyn StoreTransaction>;

/// Operations available inside one open transaction
///
/// Every filtered operation honours `NodeQuery::trashed`. Writes ignore
/// `order` and `limit`.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Table configuration the transaction operates on
    fn config(&self) -> &TreeConfig;

    /// Read matching rows
    async fn select(&self, query: &NodeQuery) -> Result<Vec<TreeNode>, DatabaseError>;

    /// Count matching rows
    async fn count(&self, query: &NodeQuery) -> Result<u64, DatabaseError>;

    /// Lock matching rows, returning their IDs
    async fn lock(&self, query: &NodeQuery, mode: LockMode) -> Result<Vec<String>, DatabaseError>;

    /// Insert a new row with every column of `node`
    async fn insert(&self, node: &TreeNode) -> Result<(), DatabaseError>;

    /// Write the non-structural columns (attributes, timestamps) of `node`
    ///
    /// Trashed rows are left alone and report zero rows affected.
    async fn update_row(&self, node: &TreeNode) -> Result<u64, DatabaseError>;

    /// `SET column = value` for each pair on matching rows
    async fn assign(
        &self,
        query: &NodeQuery,
        values: &[(Column, Value)],
    ) -> Result<u64, DatabaseError>;

    /// `SET column = column + delta` on matching rows
    async fn increment(
        &self,
        query: &NodeQuery,
        column: Column,
        delta: i64,
    ) -> Result<u64, DatabaseError>;

    /// `SET left = pivot - left, right = pivot - right` on matching rows
    ///
    /// With `pivot = 0` this parks an interval in negative space; applying it
    /// again with `pivot = offset` brings it back shifted by `offset`.
    async fn reflect_bounds(&self, query: &NodeQuery, pivot: i64) -> Result<u64, DatabaseError>;

    /// Delete matching rows
    async fn delete(&self, query: &NodeQuery) -> Result<u64, DatabaseError>;

    /// Commit; the handle is closed afterwards
    async fn commit(&self) -> Result<(), DatabaseError>;

    /// Roll back; the handle is closed afterwards
    async fn rollback(&self) -> Result<(), DatabaseError>;

    /// First matching row
    async fn first(&self, query: &NodeQuery) -> Result<Option<TreeNode>, DatabaseError> {
        let limited = query.clone().limit(1);
        Ok(self.select(&limited).await?.into_iter().next())
    }

    /// Row by ID
    async fn find(&self, id: &str, trashed: Trashed) -> Result<Option<TreeNode>, DatabaseError> {
        let mut query = NodeQuery::new().eq(Column::Id, id);
        query.trashed = trashed;
        self.first(&query).await
    }
}

/// Entry point to a transactional node table
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Table configuration
    fn config(&self) -> &TreeConfig;

    /// Open a transaction
    async fn begin(&self, mode: TxMode) -> Result<SharedTransaction, DatabaseError>;
}

//! Tree Service - Repository Operations over a Nested Set
//!
//! This module is the repository layer in front of the tree engine:
//!
//! - Writes (create, save, delete, restore) persist the row and call the
//!   engine's lifecycle operations explicitly, in one transaction
//! - Reads run in a read transaction and return live rows unless stated
//! - Bulk mapping, rebuild and validation are exposed for whole trees
//!
//! Every write without an explicit `TxScope` owns its transaction and is
//! retried on `StaleState` according to `TreeConfig::retry`.
//!
//! # Examples
//!
//! ```no_run
//! use canopy_core::config::TreeConfig;
//! use canopy_core::models::TreeNode;
//! use canopy_core::services::TreeService;
//! use canopy_core::tree::TxScope;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TreeService::open("./data/tree.db", TreeConfig::new("categories")).await?;
//!
//! let root = service
//!     .create(TreeNode::new().with_attribute("name", json!("Root")))
//!     .await?;
//! let child = service
//!     .create(TreeNode::new().with_parent(&root.id).with_attribute("name", json!("Child")))
//!     .await?;
//!
//! service.engine().make_root(&child, &TxScope::Owned).await?;
//! assert!(service.validate().await?.passes());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::config::TreeConfig;
use crate::db::{
    NodeQuery, SharedTransaction, Trashed, TreeStore, TursoStore, TxMode,
};
use crate::models::{Scope, TreeNode};
use crate::tree::mapper::{MapSummary, TreeMapper};
use crate::tree::mutation::MutationEngine;
use crate::tree::rebuild::{rebuild_in, RebuildSummary};
use crate::tree::retry::{transact, TxScope};
use crate::tree::traversal;
use crate::tree::validator::{validate_in, ValidationReport};
use crate::tree::TreeError;

/// Repository over one nested set table
pub struct TreeService {
    store: Arc<dyn TreeStore>,
    engine: MutationEngine,
}

impl TreeService {
    /// Create a service over an existing store
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        let engine = MutationEngine::new(store.clone());
        Self { store, engine }
    }

    /// Open a libsql database at `path` and create the table for `config`
    pub async fn open(path: impl AsRef<Path>, config: TreeConfig) -> Result<Self, TreeError> {
        let store = TursoStore::open(path, config).await?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn config(&self) -> &TreeConfig {
        self.store.config()
    }

    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Engine for moves and explicit lifecycle calls
    pub fn engine(&self) -> &MutationEngine {
        &self.engine
    }

    /// Open a write transaction for composing several operations with
    /// `TxScope::Joined`; the caller commits it
    pub async fn transaction(&self) -> Result<SharedTransaction, TreeError> {
        Ok(self.store.begin(TxMode::Write).await?)
    }

    async fn read<T, F, Fut>(&self, operation: F) -> Result<T, TreeError>
    where
        F: FnOnce(SharedTransaction) -> Fut,
        Fut: Future<Output = Result<T, TreeError>>,
    {
        let tx = self.store.begin(TxMode::Read).await?;
        let result = operation(tx.clone()).await;
        match &result {
            Ok(_) => tx.commit().await?,
            Err(_) => tx.rollback().await?,
        }
        result
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert a new node; when it has a parent it becomes that parent's
    /// last child, otherwise the last root of its scope
    pub async fn create(&self, node: TreeNode) -> Result<TreeNode, TreeError> {
        if node.exists() {
            return Err(TreeError::invalid_move(
                &node.id,
                "node is already persisted, use save",
            ));
        }
        self.save(&node).await
    }

    /// Insert or update a node, moving it if its parent changed
    pub async fn save(&self, node: &TreeNode) -> Result<TreeNode, TreeError> {
        self.save_with(node, &TxScope::Owned).await
    }

    pub async fn save_with(&self, node: &TreeNode, scope: &TxScope) -> Result<TreeNode, TreeError> {
        let engine = &self.engine;
        transact(self.store.as_ref(), scope, "save", move |tx| async move {
            engine.save_in(tx.as_ref(), node).await
        })
        .await
    }

    /// Delete a node and its subtree, closing the numbering gap
    ///
    /// With soft deletes enabled the rows are marked deleted and can be
    /// restored. Returns the number of rows removed.
    pub async fn delete(&self, node: &TreeNode) -> Result<u64, TreeError> {
        self.delete_with(node, false, &TxScope::Owned).await
    }

    /// Delete permanently, even with soft deletes enabled
    ///
    /// On an already soft-deleted node this purges it and its soft-deleted
    /// descendants.
    pub async fn force_delete(&self, node: &TreeNode) -> Result<u64, TreeError> {
        self.delete_with(node, true, &TxScope::Owned).await
    }

    pub async fn delete_with(
        &self,
        node: &TreeNode,
        force: bool,
        scope: &TxScope,
    ) -> Result<u64, TreeError> {
        let engine = &self.engine;
        transact(self.store.as_ref(), scope, "delete", move |tx| async move {
            engine.delete_in(tx.as_ref(), node, force).await
        })
        .await
    }

    /// Restore a soft-deleted node and its subtree to their old interval
    pub async fn restore(&self, node: &TreeNode) -> Result<TreeNode, TreeError> {
        let engine = &self.engine;
        transact(self.store.as_ref(), &TxScope::Owned, "restore", move |tx| async move {
            engine.restore_in(tx.as_ref(), node).await
        })
        .await
    }

    /// Apply a tree document under `target`
    pub async fn map_tree(
        &self,
        target: &TreeNode,
        document: &Value,
    ) -> Result<MapSummary, TreeError> {
        TreeMapper::new(&self.engine)
            .map(Some(target), &target.scope, document, &TxScope::Owned)
            .await
    }

    /// Apply a tree document at the top level of `scope`
    pub async fn map_roots(&self, scope: &Scope, document: &Value) -> Result<MapSummary, TreeError> {
        TreeMapper::new(&self.engine)
            .map(None, scope, document, &TxScope::Owned)
            .await
    }

    /// Recompute every left/right/depth from the parent links
    pub async fn rebuild(&self) -> Result<RebuildSummary, TreeError> {
        transact(self.store.as_ref(), &TxScope::Owned, "rebuild", move |tx| async move {
            rebuild_in(tx.as_ref(), None).await
        })
        .await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Check the nested set invariants of every scope
    pub async fn validate(&self) -> Result<ValidationReport, TreeError> {
        self.read(|tx| async move { validate_in(tx.as_ref(), None).await })
            .await
    }

    /// Rows matching an arbitrary query
    pub async fn select(&self, query: &NodeQuery) -> Result<Vec<TreeNode>, TreeError> {
        self.read(|tx| async move { Ok(tx.select(query).await?) })
            .await
    }

    /// Live node by ID
    pub async fn find(&self, id: &str) -> Result<Option<TreeNode>, TreeError> {
        self.read(|tx| async move { Ok(tx.find(id, Trashed::Exclude).await?) })
            .await
    }

    /// Node by ID, including soft-deleted rows
    pub async fn find_with_trashed(&self, id: &str) -> Result<Option<TreeNode>, TreeError> {
        self.read(|tx| async move { Ok(tx.find(id, Trashed::Include).await?) })
            .await
    }

    /// Live node by ID, `NodeNotFound` if absent
    pub async fn get(&self, id: &str) -> Result<TreeNode, TreeError> {
        self.find(id)
            .await?
            .ok_or_else(|| TreeError::node_not_found(id))
    }

    pub async fn roots(&self, scope: Option<&Scope>) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::roots(self.config(), scope)).await
    }

    /// First root of the scope
    pub async fn root(&self, scope: Option<&Scope>) -> Result<Option<TreeNode>, TreeError> {
        let query = traversal::roots(self.config(), scope).limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    pub async fn all_leaves(&self, scope: Option<&Scope>) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::leaves(self.config(), scope)).await
    }

    pub async fn all_trunks(&self, scope: Option<&Scope>) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::trunks(self.config(), scope)).await
    }

    pub async fn ancestors_and_self(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::ancestors_and_self(self.config(), node))
            .await
    }

    pub async fn ancestors(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::ancestors(self.config(), node)).await
    }

    pub async fn ancestors_and_self_without_root(
        &self,
        node: &TreeNode,
    ) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::ancestors_and_self_without_root(
            self.config(),
            node,
        ))
        .await
    }

    pub async fn ancestors_without_root(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::ancestors_without_root(self.config(), node))
            .await
    }

    /// Descendants, optionally only `limit` levels deep
    pub async fn descendants(
        &self,
        node: &TreeNode,
        limit: Option<i64>,
    ) -> Result<Vec<TreeNode>, TreeError> {
        self.read(|tx| async move {
            traversal::descendants_limited(tx.as_ref(), node, false, limit).await
        })
        .await
    }

    pub async fn descendants_and_self(
        &self,
        node: &TreeNode,
        limit: Option<i64>,
    ) -> Result<Vec<TreeNode>, TreeError> {
        self.read(|tx| async move {
            traversal::descendants_limited(tx.as_ref(), node, true, limit).await
        })
        .await
    }

    pub async fn children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::children(self.config(), node)).await
    }

    pub async fn siblings(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::siblings(self.config(), node)).await
    }

    pub async fn siblings_and_self(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::siblings_and_self(self.config(), node))
            .await
    }

    pub async fn left_sibling(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        self.read(|tx| async move { traversal::left_sibling(tx.as_ref(), node).await })
            .await
    }

    pub async fn right_sibling(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        self.read(|tx| async move { traversal::right_sibling(tx.as_ref(), node).await })
            .await
    }

    /// Leaves below `node`
    pub async fn leaves(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::leaves_under(self.config(), node)).await
    }

    /// Trunks below `node`
    pub async fn trunks(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::trunks_under(self.config(), node)).await
    }

    pub async fn others_at_same_depth(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.select(&traversal::others_at_same_depth(self.config(), node))
            .await
    }

    pub async fn get_root(&self, node: &TreeNode) -> Result<TreeNode, TreeError> {
        self.read(|tx| async move { traversal::get_root(tx.as_ref(), node).await })
            .await
    }

    pub async fn get_level(&self, node: &TreeNode) -> Result<i64, TreeError> {
        self.read(|tx| async move { traversal::get_level(tx.as_ref(), node).await })
            .await
    }

    /// `(id, indented label)` pairs in tree order
    pub async fn nested_list(
        &self,
        scope: Option<&Scope>,
        column: &str,
        separator: &str,
        symbol: &str,
    ) -> Result<Vec<(String, String)>, TreeError> {
        self.read(|tx| async move {
            traversal::nested_list(tx.as_ref(), scope, column, separator, symbol).await
        })
        .await
    }
}

//! Mutation Engine
//!
//! The transactional algorithms that keep the nested set intact across
//! insert, move, delete and restore, and the lifecycle surface a repository
//! layer calls around its own row writes:
//!
//! | Lifecycle call        | Engine operation                      |
//! |-----------------------|---------------------------------------|
//! | `on_create`           | default interval (append as last root) |
//! | `on_before_save`      | capture the pending parent change     |
//! | `on_after_save`       | move to the new parent, fix depth     |
//! | `on_before_delete`    | `destroy_descendants`                 |
//! | `on_before_restore`   | `shift_siblings_for_restore`          |
//! | `on_after_restore`    | `restore_descendants`                 |
//!
//! Every operation that writes takes a [`TxScope`]. The `*_in` variants run
//! inside an already open transaction and are what the mapper and the
//! service compose.
//!
//! # Locking
//!
//! - Insert takes a shared lock on the scope's max-right row
//! - Move takes an update lock on every row with `right >= min(node.left, target.left)`
//! - Delete takes an update lock on every row with `left >= node.left`
//! - Subtree depth recompute takes an update lock on the subtree
//!
//! With `TursoStore` these are subsumed by the `BEGIN IMMEDIATE` write lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::TreeConfig;
use crate::db::{
    Cmp, Column, LockMode, NodeQuery, StoreTransaction, Trashed, TreeStore,
};
use crate::models::{Scope, TreeNode};
use crate::tree::movement::{self, MovePlan, Position};
use crate::tree::retry::{transact, TxScope};
use crate::tree::traversal;
use crate::tree::TreeError;

/// Parent change captured before a save and applied after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentChange {
    /// Parent untouched, nothing to move
    Unchanged,

    /// Parent cleared; move to the end of the root list
    ToRoot,

    /// Parent set; move to last child of this node
    ToParent(String),
}

/// Invariant-preserving writes over one nested set table
pub struct MutationEngine {
    store: Arc<dyn TreeStore>,
}

fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

fn in_scope(config: &TreeConfig, scope: &Scope) -> NodeQuery {
    NodeQuery::new().in_scope(&config.scope_columns, scope)
}

fn by_id(id: &str) -> NodeQuery {
    NodeQuery::new().eq(Column::Id, id)
}

/// Narrow a trashed-row query to the rows deleted together with a node
fn same_cascade(query: NodeQuery, deleted_at: Option<&DateTime<Utc>>) -> NodeQuery {
    match deleted_at {
        Some(stamp) => query.eq(Column::DeletedAt, stamp.to_rfc3339()),
        None => query,
    }
}

/// Add `delta` to every live left and right bound that compares to
/// `threshold` with `cmp`
async fn shift_bounds(
    tx: &dyn StoreTransaction,
    scope: &Scope,
    cmp: Cmp,
    threshold: i64,
    delta: i64,
) -> Result<(), TreeError> {
    let base = in_scope(tx.config(), scope);
    tx.increment(
        &base.clone().compare(Column::Left, cmp, threshold),
        Column::Left,
        delta,
    )
    .await?;
    tx.increment(
        &base.compare(Column::Right, cmp, threshold),
        Column::Right,
        delta,
    )
    .await?;
    Ok(())
}

impl MutationEngine {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    pub fn config(&self) -> &TreeConfig {
        self.store.config()
    }

    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Lifecycle surface
    // ------------------------------------------------------------------

    /// Assign the default interval: append as the last root of the scope
    ///
    /// Must run in the transaction that inserts the row; the shared lock on
    /// the max-right row serializes concurrent inserts.
    pub async fn on_create(
        &self,
        node: &mut TreeNode,
        tx: &dyn StoreTransaction,
    ) -> Result<(), TreeError> {
        let query = traversal::max_right(tx.config(), &node.scope);
        tx.lock(&query, LockMode::Shared).await?;

        let max_right = tx.first(&query).await?.and_then(|last| last.right);
        let left = max_right.map_or(1, |max| max + 1);

        node.left = Some(left);
        node.right = Some(left + 1);
        node.depth = Some(0);
        Ok(())
    }

    /// Validate the pending write and capture the parent change it implies
    pub fn on_before_save(&self, node: &TreeNode) -> Result<ParentChange, TreeError> {
        if node.exists() && node.is_scope_dirty() {
            return Err(TreeError::ScopeChange {
                node_id: node.id.clone(),
            });
        }
        if node.parent_id.as_deref() == Some(node.id.as_str()) {
            return Err(TreeError::invalid_move(
                &node.id,
                "a node cannot be its own parent",
            ));
        }

        if !node.is_parent_dirty() {
            return Ok(ParentChange::Unchanged);
        }
        Ok(match &node.parent_id {
            None => ParentChange::ToRoot,
            Some(parent_id) => ParentChange::ToParent(parent_id.clone()),
        })
    }

    /// Apply the captured parent change to the saved row, then fix depth
    pub async fn on_after_save(
        &self,
        node: &TreeNode,
        change: &ParentChange,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        transact(self.store.as_ref(), scope, "on_after_save", move |tx| async move {
            self.after_save_in(tx.as_ref(), &node.id, change).await
        })
        .await
    }

    /// Remove the descendants and close the gap before the row itself is deleted
    pub async fn on_before_delete(&self, node: &TreeNode, scope: &TxScope) -> Result<u64, TreeError> {
        self.destroy_descendants(node, scope).await
    }

    /// Reopen the old interval before the row is un-trashed
    pub async fn on_before_restore(&self, node: &TreeNode, scope: &TxScope) -> Result<(), TreeError> {
        self.shift_siblings_for_restore(node, scope).await
    }

    /// Revive the descendants trashed together with the restored row
    pub async fn on_after_restore(&self, node: &TreeNode, scope: &TxScope) -> Result<u64, TreeError> {
        self.restore_descendants(node, scope).await
    }

    // ------------------------------------------------------------------
    // Moves
    // ------------------------------------------------------------------

    /// Move `node` (with its subtree) to `position`
    pub async fn move_to(
        &self,
        node: &TreeNode,
        position: &Position,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        transact(self.store.as_ref(), scope, "move", move |tx| async move {
            self.move_in(tx.as_ref(), node, position).await
        })
        .await
    }

    /// Swap with the left sibling
    pub async fn move_left(&self, node: &TreeNode, scope: &TxScope) -> Result<TreeNode, TreeError> {
        transact(self.store.as_ref(), scope, "move_left", move |tx| async move {
            let tx = tx.as_ref();
            let current = traversal::reload(tx, node).await?;
            let sibling = traversal::left_sibling(tx, &current)
                .await?
                .ok_or_else(|| TreeError::invalid_move(&node.id, "node has no left sibling"))?;
            self.move_in(tx, &current, &Position::LeftOf(sibling.id)).await
        })
        .await
    }

    /// Swap with the right sibling
    pub async fn move_right(&self, node: &TreeNode, scope: &TxScope) -> Result<TreeNode, TreeError> {
        transact(self.store.as_ref(), scope, "move_right", move |tx| async move {
            let tx = tx.as_ref();
            let current = traversal::reload(tx, node).await?;
            let sibling = traversal::right_sibling(tx, &current)
                .await?
                .ok_or_else(|| TreeError::invalid_move(&node.id, "node has no right sibling"))?;
            self.move_in(tx, &current, &Position::RightOf(sibling.id)).await
        })
        .await
    }

    pub async fn move_to_left_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        self.move_to(node, &Position::LeftOf(target.id.clone()), scope)
            .await
    }

    pub async fn move_to_right_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        self.move_to(node, &Position::RightOf(target.id.clone()), scope)
            .await
    }

    pub async fn make_next_sibling_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        self.move_to_right_of(node, target, scope).await
    }

    /// Same as `make_next_sibling_of`
    pub async fn make_sibling_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        self.make_next_sibling_of(node, target, scope).await
    }

    pub async fn make_previous_sibling_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        self.move_to_left_of(node, target, scope).await
    }

    /// Last child of `target`
    pub async fn make_child_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        self.move_to(node, &Position::ChildOf(target.id.clone()), scope)
            .await
    }

    pub async fn make_last_child_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        self.make_child_of(node, target, scope).await
    }

    /// First child of `target`
    pub async fn make_first_child_of(
        &self,
        node: &TreeNode,
        target: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        transact(self.store.as_ref(), scope, "make_first_child_of", move |tx| async move {
            let tx = tx.as_ref();
            let config = tx.config();
            let parent = tx
                .find(&target.id, Trashed::Exclude)
                .await?
                .ok_or_else(|| TreeError::invalid_move(&node.id, "child target does not exist"))?;
            let first = tx
                .first(&traversal::children(config, &parent).reorder_by(
                    Column::Left,
                    crate::db::Direction::Asc,
                ))
                .await?;

            match first {
                Some(first) if first.id == node.id => traversal::reload(tx, node).await,
                Some(first) => self.move_in(tx, node, &Position::LeftOf(first.id)).await,
                None => self.move_in(tx, node, &Position::ChildOf(parent.id)).await,
            }
        })
        .await
    }

    pub async fn make_root(&self, node: &TreeNode, scope: &TxScope) -> Result<TreeNode, TreeError> {
        self.move_to(node, &Position::Root, scope).await
    }

    /// Relocate the subtree of `node` to `position` inside `tx`
    ///
    /// See `tree::movement` for the park/close/open/unpark sequence.
    pub(crate) async fn move_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
        position: &Position,
    ) -> Result<TreeNode, TreeError> {
        let config = tx.config();
        let node = traversal::reload(tx, node).await?;

        if *position == Position::Root && node.is_root() {
            tracing::debug!("Node {} is already a root, move skipped", node.id);
            return Ok(node);
        }

        let target = match position.target_id() {
            Some(id) => tx.find(id, Trashed::Exclude).await?,
            None => None,
        };
        movement::check_move(&node, target.as_ref(), position)?;

        let Some((left, right)) = node.interval() else {
            return Err(TreeError::invalid_move(&node.id, "node has no interval"));
        };
        let plan = MovePlan::new(left, right);
        let width = plan.width();

        tx.lock(
            &in_scope(config, &node.scope).compare(
                Column::Right,
                Cmp::Ge,
                plan.lock_floor(target.as_ref()),
            ),
            LockMode::Update,
        )
        .await?;

        // Park
        tx.reflect_bounds(
            &in_scope(config, &node.scope).between(Column::Left, left, right),
            0,
        )
        .await?;

        // Close
        shift_bounds(tx, &node.scope, Cmp::Gt, right, -width).await?;

        // Re-read the target; its bounds may have shifted
        let target = match position.target_id() {
            Some(id) => Some(tx.find(id, Trashed::Exclude).await?.ok_or_else(|| {
                TreeError::stale(format!("move target {} vanished during move", id))
            })?),
            None => None,
        };
        let max_right = match position {
            Position::Root => tx
                .first(
                    &traversal::max_right(config, &node.scope).compare(Column::Right, Cmp::Gt, 0),
                )
                .await?
                .and_then(|last| last.right),
            _ => None,
        };
        let anchor = position
            .anchor(target.as_ref(), max_right)
            .ok_or_else(|| TreeError::stale("move target has no interval"))?;

        // Open
        shift_bounds(tx, &node.scope, Cmp::Ge, anchor, width).await?;

        // Unpark
        let (low, high) = plan.parked_range();
        let parked = in_scope(config, &node.scope).between(Column::Left, low, high);
        let depth_delta = position.depth(target.as_ref()) - node.depth.unwrap_or(0);
        if depth_delta != 0 {
            tx.increment(&parked, Column::Depth, depth_delta).await?;
        }
        tx.reflect_bounds(&parked, plan.unpark_pivot(anchor)).await?;

        let parent = position
            .parent(target.as_ref())
            .map(Value::String)
            .unwrap_or(Value::Null);
        let updated = tx
            .assign(
                &by_id(&node.id).eq(Column::Left, anchor),
                &[(Column::Parent, parent), (Column::UpdatedAt, now_value())],
            )
            .await?;
        if updated == 0 {
            return Err(TreeError::stale(format!(
                "node {} was not at left bound {} after move",
                node.id, anchor
            )));
        }

        tracing::debug!(
            "Moved node {} ({}..{}) to {} of {:?}: left {} -> {}, depth delta {}",
            node.id,
            left,
            right,
            position.name(),
            position.target_id(),
            left,
            anchor,
            depth_delta
        );

        traversal::reload(tx, &node).await
    }

    // ------------------------------------------------------------------
    // Depth
    // ------------------------------------------------------------------

    /// Recompute and store the depth of one node
    pub async fn set_depth(&self, node: &TreeNode, scope: &TxScope) -> Result<TreeNode, TreeError> {
        transact(self.store.as_ref(), scope, "set_depth", move |tx| async move {
            self.set_depth_in(tx.as_ref(), node).await
        })
        .await
    }

    /// Recompute the depth of a node and shift its whole subtree by the change
    pub async fn set_depth_with_subtree(
        &self,
        node: &TreeNode,
        scope: &TxScope,
    ) -> Result<TreeNode, TreeError> {
        transact(self.store.as_ref(), scope, "set_depth_with_subtree", move |tx| async move {
            self.set_depth_with_subtree_in(tx.as_ref(), node).await
        })
        .await
    }

    pub(crate) async fn set_depth_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<TreeNode, TreeError> {
        let mut node = traversal::reload(tx, node).await?;
        let level = traversal::get_level(tx, &node).await?;

        if node.depth != Some(level) {
            tx.assign(&by_id(&node.id), &[(Column::Depth, Value::from(level))])
                .await?;
            node.depth = Some(level);
        }
        Ok(node)
    }

    pub(crate) async fn set_depth_with_subtree_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<TreeNode, TreeError> {
        let config = tx.config();
        let node = traversal::reload(tx, node).await?;
        let subtree = traversal::descendants_and_self(config, &node);
        tx.lock(&subtree, LockMode::Update).await?;

        let level = traversal::get_level(tx, &node).await?;
        let delta = level - node.depth.unwrap_or(0);
        if delta != 0 {
            tx.increment(&subtree, Column::Depth, delta).await?;
            tracing::debug!("Shifted depth of subtree {} by {}", node.id, delta);
        }

        traversal::reload(tx, &node).await
    }

    // ------------------------------------------------------------------
    // Delete, purge and restore
    // ------------------------------------------------------------------

    /// Remove the descendants of `node` and close the gap it leaves
    ///
    /// With soft deletes enabled the descendants are marked deleted (their
    /// intervals are kept for restore), otherwise they are deleted. The
    /// node's own row is left to the caller.
    pub async fn destroy_descendants(
        &self,
        node: &TreeNode,
        scope: &TxScope,
    ) -> Result<u64, TreeError> {
        let soft = self.config().soft_deletes();
        transact(self.store.as_ref(), scope, "destroy_descendants", move |tx| async move {
            let stamp = soft.then(now_value);
            self.destroy_descendants_in(tx.as_ref(), node, stamp.as_ref())
                .await
        })
        .await
    }

    /// `stamp` is the soft-delete marker to write; `None` deletes the rows
    pub(crate) async fn destroy_descendants_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
        stamp: Option<&Value>,
    ) -> Result<u64, TreeError> {
        if node.interval().is_none() {
            return Ok(0);
        }

        let config = tx.config();
        let node = traversal::reload(tx, node).await?;
        let Some((left, right)) = node.interval() else {
            return Ok(0);
        };
        let width = right - left + 1;

        tx.lock(
            &in_scope(config, &node.scope).compare(Column::Left, Cmp::Ge, left),
            LockMode::Update,
        )
        .await?;

        let inside = traversal::inside_interval(config, &node);
        let removed = match stamp {
            None => tx.delete(&inside).await?,
            Some(stamp) => {
                tx.assign(
                    &inside,
                    &[(Column::DeletedAt, stamp.clone()), (Column::UpdatedAt, now_value())],
                )
                .await?
            }
        };

        shift_bounds(tx, &node.scope, Cmp::Gt, right, -width).await?;

        tracing::debug!(
            "Removed {} descendant(s) of node {} ({}..{}), closed gap of {}",
            removed,
            node.id,
            left,
            right,
            width
        );
        Ok(removed)
    }

    /// Permanently delete a soft-deleted node and the descendants trashed
    /// with it
    ///
    /// No renumbering: the gap was closed when the node was soft-deleted.
    pub async fn purge(&self, node: &TreeNode, scope: &TxScope) -> Result<u64, TreeError> {
        transact(self.store.as_ref(), scope, "purge", move |tx| async move {
            self.purge_in(tx.as_ref(), node).await
        })
        .await
    }

    pub(crate) async fn purge_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<u64, TreeError> {
        let config = tx.config();
        let node = tx
            .find(&node.id, Trashed::Only)
            .await?
            .ok_or_else(|| TreeError::node_not_found(&node.id))?;

        let descendants = tx
            .delete(&same_cascade(
                traversal::inside_interval(config, &node).only_trashed(),
                node.deleted_at.as_ref(),
            ))
            .await?;
        tx.delete(&by_id(&node.id).only_trashed()).await?;

        tracing::debug!("Purged node {} and {} descendant(s)", node.id, descendants);
        Ok(descendants + 1)
    }

    /// Reopen the gap a soft-deleted node occupied
    pub async fn shift_siblings_for_restore(
        &self,
        node: &TreeNode,
        scope: &TxScope,
    ) -> Result<(), TreeError> {
        transact(self.store.as_ref(), scope, "shift_siblings_for_restore", move |tx| async move {
            self.shift_siblings_for_restore_in(tx.as_ref(), node).await
        })
        .await
    }

    pub(crate) async fn shift_siblings_for_restore_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<(), TreeError> {
        let config = tx.config();
        let node = tx
            .find(&node.id, Trashed::Include)
            .await?
            .ok_or_else(|| TreeError::node_not_found(&node.id))?;
        let Some((left, right)) = node.interval() else {
            return Ok(());
        };
        let width = right - left + 1;

        tx.lock(
            &in_scope(config, &node.scope).compare(Column::Left, Cmp::Ge, left),
            LockMode::Update,
        )
        .await?;
        shift_bounds(tx, &node.scope, Cmp::Ge, left, width).await?;

        tracing::debug!("Reopened gap of {} at {} for node {}", width, left, node.id);
        Ok(())
    }

    /// Un-delete the soft-deleted rows inside the node's interval
    ///
    /// When `node` still carries its delete marker only rows trashed in the
    /// same cascade are restored.
    pub async fn restore_descendants(
        &self,
        node: &TreeNode,
        scope: &TxScope,
    ) -> Result<u64, TreeError> {
        transact(self.store.as_ref(), scope, "restore_descendants", move |tx| async move {
            self.restore_descendants_in(tx.as_ref(), node).await
        })
        .await
    }

    pub(crate) async fn restore_descendants_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<u64, TreeError> {
        let config = tx.config();
        let current = tx
            .find(&node.id, Trashed::Include)
            .await?
            .ok_or_else(|| TreeError::node_not_found(&node.id))?;
        let stamp = node.deleted_at.or(current.deleted_at);
        let node = current;

        let restored = tx
            .assign(
                &same_cascade(
                    traversal::inside_interval(config, &node).only_trashed(),
                    stamp.as_ref(),
                ),
                &[(Column::DeletedAt, Value::Null), (Column::UpdatedAt, now_value())],
            )
            .await?;

        tracing::debug!("Restored {} descendant(s) of node {}", restored, node.id);
        Ok(restored)
    }

    // ------------------------------------------------------------------
    // Row persistence with the lifecycle wired in
    // ------------------------------------------------------------------

    pub(crate) async fn after_save_in(
        &self,
        tx: &dyn StoreTransaction,
        node_id: &str,
        change: &ParentChange,
    ) -> Result<TreeNode, TreeError> {
        let node = tx
            .find(node_id, Trashed::Include)
            .await?
            .ok_or_else(|| TreeError::node_not_found(node_id))?;

        let position = match change {
            ParentChange::Unchanged => return Ok(node),
            ParentChange::ToRoot => Position::Root,
            ParentChange::ToParent(parent_id) => Position::ChildOf(parent_id.clone()),
        };

        let moved = self.move_in(tx, &node, &position).await?;
        if moved.width().unwrap_or(0) > 2 {
            self.set_depth_with_subtree_in(tx, &moved).await
        } else {
            self.set_depth_in(tx, &moved).await
        }
    }

    /// Insert or update `node`, positioning it according to its parent
    ///
    /// Structural fields and the soft-delete marker of an existing row are
    /// never written here; a parent change is applied as a move. Saving a
    /// trashed row fails with `NodeNotFound`.
    pub(crate) async fn save_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<TreeNode, TreeError> {
        let change = self.on_before_save(node)?;
        let mut row = node.clone();
        row.updated_at = Some(Utc::now());

        if row.exists() {
            // Trashed rows are skipped; they only come back through restore
            if tx.update_row(&row).await? == 0 {
                return Err(TreeError::node_not_found(&row.id));
            }
        } else {
            self.on_create(&mut row, tx).await?;
            row.deleted_at = None;
            // Inserted as a root; the parent is applied by the move below
            row.parent_id = None;
            tx.insert(&row).await?;
        }

        let saved = self.after_save_in(tx, &row.id, &change).await?;
        tracing::debug!("Saved node {} at {:?}", saved.id, saved.interval());
        Ok(saved)
    }

    /// Delete `node` and its descendants
    ///
    /// With soft deletes enabled and `force == false` the rows are marked
    /// deleted; `force` deletes them (and purges an already trashed node).
    /// Returns the number of rows removed, including the node itself.
    pub(crate) async fn delete_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
        force: bool,
    ) -> Result<u64, TreeError> {
        let config = tx.config();
        let current = tx
            .find(&node.id, Trashed::Include)
            .await?
            .ok_or_else(|| TreeError::node_not_found(&node.id))?;

        if current.is_trashed() {
            return if force {
                self.purge_in(tx, &current).await
            } else {
                Ok(0)
            };
        }

        // One marker for the whole cascade so restore and purge can tell it
        // apart from rows trashed earlier
        let stamp = (!force && config.soft_deletes()).then(now_value);
        let removed = self
            .destroy_descendants_in(tx, &current, stamp.as_ref())
            .await?;

        let own = by_id(&current.id);
        match &stamp {
            None => {
                tx.delete(&own).await?;
            }
            Some(stamp) => {
                tx.assign(
                    &own,
                    &[(Column::DeletedAt, stamp.clone()), (Column::UpdatedAt, now_value())],
                )
                .await?;
            }
        }

        Ok(removed + 1)
    }

    /// Restore a soft-deleted node and its soft-deleted descendants in place
    pub(crate) async fn restore_in(
        &self,
        tx: &dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<TreeNode, TreeError> {
        let config = tx.config();
        if !config.soft_deletes() {
            return Err(TreeError::invalid_config(format!(
                "soft deletes are not enabled for table '{}'",
                config.table
            )));
        }

        let current = tx
            .find(&node.id, Trashed::Only)
            .await?
            .ok_or_else(|| TreeError::node_not_found(&node.id))?;

        if let Some(parent_id) = &current.parent_id {
            if tx.find(parent_id, Trashed::Exclude).await?.is_none() {
                tracing::warn!(
                    "Restoring node {} whose parent {} is not live",
                    current.id,
                    parent_id
                );
            }
        }

        self.shift_siblings_for_restore_in(tx, &current).await?;
        tx.assign(
            &by_id(&current.id).with_trashed(),
            &[(Column::DeletedAt, Value::Null), (Column::UpdatedAt, now_value())],
        )
        .await?;
        self.restore_descendants_in(tx, &current).await?;

        traversal::reload(tx, &current).await
    }
}

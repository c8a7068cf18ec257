//! Bulk Tree Mapper
//!
//! Applies a nested JSON document (see `models::document`) under a target
//! node, or at the top level of a scope:
//!
//! 1. Each entry is matched to an existing live row by its key, or becomes a
//!    new node (the key, when given, becomes its id)
//! 2. Attributes are assigned unguarded, so structural keys in the document
//!    flow through; the parent is set to the entry's parent in the document
//! 3. The node is saved through the engine, then moved to the last child of
//!    its parent so siblings follow document order
//! 4. After the whole document is applied, every previously existing row
//!    under the target (or in the scope) that the document did not mention is
//!    deleted through the engine's delete path
//!
//! Everything runs in one transaction: a failure at any entry rolls back the
//! whole mapping.

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::db::{Column, Direction, StoreTransaction, Trashed};
use crate::models::{FillMode, NodeEntry, Scope, TreeNode};
use crate::tree::movement::Position;
use crate::tree::mutation::MutationEngine;
use crate::tree::retry::{transact, TxScope};
use crate::tree::traversal;
use crate::tree::TreeError;

/// Outcome of a mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSummary {
    /// IDs written by the document, in document (pre-order) order
    pub affected: Vec<String>,

    /// Rows removed because the document no longer mentions them
    pub pruned: u64,
}

/// Applies tree documents through a `MutationEngine`
pub struct TreeMapper<'e> {
    engine: &'e MutationEngine,
}

impl<'e> TreeMapper<'e> {
    pub fn new(engine: &'e MutationEngine) -> Self {
        Self { engine }
    }

    /// Map `document` under `target`, or at the top level of `scope` when no
    /// target is given (`scope` is ignored otherwise)
    pub async fn map(
        &self,
        target: Option<&TreeNode>,
        scope: &Scope,
        document: &Value,
        tx_scope: &TxScope,
    ) -> Result<MapSummary, TreeError> {
        let entries = NodeEntry::parse_document(document, self.engine.config())?;
        let entries = &entries;

        transact(
            self.engine.store().as_ref(),
            tx_scope,
            "map_tree",
            move |tx| async move { self.map_in(tx.as_ref(), target, scope, entries).await },
        )
        .await
    }

    pub(crate) async fn map_in(
        &self,
        tx: &dyn StoreTransaction,
        target: Option<&TreeNode>,
        scope: &Scope,
        entries: &[NodeEntry],
    ) -> Result<MapSummary, TreeError> {
        let config = tx.config();

        let target = match target {
            Some(target) => Some(traversal::reload(tx, target).await?),
            None => None,
        };
        let scope = target
            .as_ref()
            .map(|t| t.scope.clone())
            .unwrap_or_else(|| scope.clone());
        let target_key = target.as_ref().map(|t| t.id.clone());

        let mut summary = MapSummary::default();
        let mut affected = HashSet::new();

        // Pre-order walk: a parent is saved before its children, and each
        // child is appended after its earlier siblings
        let mut pending: Vec<(&NodeEntry, Option<String>)> = entries
            .iter()
            .rev()
            .map(|entry| (entry, target_key.clone()))
            .collect();

        while let Some((entry, parent_key)) = pending.pop() {
            let existing = match &entry.key {
                Some(key) => tx.find(key, Trashed::Include).await?,
                None => None,
            };
            // A key pruned by an earlier mapping is created afresh, as it
            // would be without soft deletes
            let existing = match existing {
                Some(trashed) if trashed.is_trashed() => {
                    self.engine.purge_in(tx, &trashed).await?;
                    tracing::debug!("Purged trashed node {} before re-adding it", trashed.id);
                    None
                }
                other => other,
            };
            let mut node = existing.unwrap_or_else(|| {
                let id = entry
                    .key
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                TreeNode::with_id(id).with_scope(scope.clone())
            });

            node.fill(entry.attributes.clone(), FillMode::Unguarded, config);
            if let Some(parent_key) = &parent_key {
                node.parent_id = Some(parent_key.clone());
            }

            let mut saved = self.engine.save_in(tx, &node).await?;
            if let Some(parent_id) = saved.parent_id.clone() {
                saved = self
                    .engine
                    .move_in(tx, &saved, &Position::ChildOf(parent_id))
                    .await?;
            }

            affected.insert(saved.id.clone());
            summary.affected.push(saved.id.clone());
            pending.extend(
                entry
                    .children
                    .iter()
                    .rev()
                    .map(|child| (child, Some(saved.id.clone()))),
            );
        }

        if summary.affected.is_empty() {
            return Ok(summary);
        }

        let candidates = match &target {
            Some(target) => {
                let target = traversal::reload(tx, target).await?;
                traversal::descendants(config, &target)
            }
            None => traversal::scoped(config, Some(&scope)),
        }
        .reorder_by(Column::Left, Direction::Asc);

        for stale in tx.select(&candidates).await? {
            if affected.contains(&stale.id) {
                continue;
            }
            // Already removed with an ancestor pruned earlier in this loop
            if tx.find(&stale.id, Trashed::Exclude).await?.is_none() {
                continue;
            }
            summary.pruned += self.engine.delete_in(tx, &stale, false).await?;
        }

        tracing::info!(
            "Mapped {} node(s) under {:?}, pruned {}",
            summary.affected.len(),
            target_key,
            summary.pruned
        );
        Ok(summary)
    }
}

//! Rebuild Engine
//!
//! Reconstructs `left`, `right` and `depth` of every live row from the parent
//! relation alone, ignoring the stored bounds. Siblings are numbered in order
//! key order (ties broken by id), so rebuilding twice yields the same numbers.
//!
//! Rows whose parent is not a live row of the same scope (orphans), and
//! everything below them, cannot be placed. They are reported and left
//! untouched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::db::{Column, Direction, NodeQuery, StoreTransaction, TreeStore};
use crate::models::{Scope, TreeNode};
use crate::tree::retry::{transact, TxScope};
use crate::tree::TreeError;

/// New bounds for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub left: i64,
    pub right: i64,
    pub depth: i64,
}

/// Numbering of one scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Numbering {
    /// Pre-order assignments for every reachable row
    pub assignments: Vec<Assignment>,

    /// Rows that could not be reached from a root
    pub unreachable: Vec<String>,
}

/// Number one scope's rows by a depth-first pre-order walk
///
/// `nodes` must be in sibling order; roots are the rows without a parent.
pub fn number_forest(nodes: &[TreeNode]) -> Numbering {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        match node.parent_id.as_deref() {
            None => roots.push(index),
            Some(parent) if known.contains(parent) => {
                children.entry(parent).or_default().push(index)
            }
            Some(parent) => {
                tracing::warn!("Node {} has missing parent {}, skipped", node.id, parent);
            }
        }
    }

    let mut bounds: Vec<Option<(i64, i64, i64)>> = vec![None; nodes.len()];
    let mut counter = 1;
    // (index, depth, leaving)
    let mut stack: Vec<(usize, i64, bool)> = roots.iter().rev().map(|&i| (i, 0, false)).collect();

    while let Some((index, depth, leaving)) = stack.pop() {
        if leaving {
            if let Some((_, right, _)) = bounds[index].as_mut() {
                *right = counter;
            }
            counter += 1;
            continue;
        }
        if bounds[index].is_some() {
            continue;
        }

        bounds[index] = Some((counter, 0, depth));
        counter += 1;
        stack.push((index, depth, true));
        if let Some(kids) = children.get(nodes[index].id.as_str()) {
            stack.extend(kids.iter().rev().map(|&child| (child, depth + 1, false)));
        }
    }

    let mut numbering = Numbering::default();
    for (node, bound) in nodes.iter().zip(bounds) {
        match bound {
            Some((left, right, depth)) => numbering.assignments.push(Assignment {
                id: node.id.clone(),
                left,
                right,
                depth,
            }),
            None => numbering.unreachable.push(node.id.clone()),
        }
    }
    numbering
        .assignments
        .sort_by_key(|assignment| assignment.left);
    numbering
}

/// Outcome of a rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Scopes visited
    pub scopes: usize,

    /// Rows that received bounds
    pub numbered: usize,

    /// Rows whose stored bounds or depth changed
    pub updated: usize,

    /// Rows left untouched because they are unreachable from a root
    pub skipped: Vec<String>,
}

/// Full-table (or single scope) reconstruction of the nested set numbers
pub struct RebuildEngine {
    store: Arc<dyn TreeStore>,
}

impl RebuildEngine {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Rebuild every scope of the table in one transaction
    pub async fn rebuild(&self, scope: &TxScope) -> Result<RebuildSummary, TreeError> {
        transact(self.store.as_ref(), scope, "rebuild", move |tx| async move {
            rebuild_in(tx.as_ref(), None).await
        })
        .await
    }

    /// Rebuild one scope
    pub async fn rebuild_scope(
        &self,
        values: &Scope,
        scope: &TxScope,
    ) -> Result<RebuildSummary, TreeError> {
        transact(self.store.as_ref(), scope, "rebuild_scope", move |tx| async move {
            rebuild_in(tx.as_ref(), Some(values)).await
        })
        .await
    }
}

pub(crate) async fn rebuild_in(
    tx: &dyn StoreTransaction,
    only: Option<&Scope>,
) -> Result<RebuildSummary, TreeError> {
    let config = tx.config();

    let mut query = NodeQuery::new();
    if let Some(values) = only {
        query = query.in_scope(&config.scope_columns, values);
    }
    for column in &config.scope_columns {
        query = query.order_by(Column::Scope(column.clone()), Direction::Asc);
    }
    let query = query
        .order_by(Column::Order, Direction::Asc)
        .order_by(Column::Id, Direction::Asc);

    let nodes = tx.select(&query).await?;
    let mut summary = RebuildSummary::default();

    for group in nodes.chunk_by(|a, b| a.scope == b.scope) {
        summary.scopes += 1;
        let numbering = number_forest(group);
        let current: HashMap<&str, &TreeNode> =
            group.iter().map(|node| (node.id.as_str(), node)).collect();

        for assignment in &numbering.assignments {
            summary.numbered += 1;
            let unchanged = current.get(assignment.id.as_str()).is_some_and(|node| {
                node.left == Some(assignment.left)
                    && node.right == Some(assignment.right)
                    && node.depth == Some(assignment.depth)
            });
            if unchanged {
                continue;
            }

            tx.assign(
                &NodeQuery::new().eq(Column::Id, assignment.id.as_str()),
                &[
                    (Column::Left, Value::from(assignment.left)),
                    (Column::Right, Value::from(assignment.right)),
                    (Column::Depth, Value::from(assignment.depth)),
                ],
            )
            .await?;
            summary.updated += 1;
        }

        if !numbering.unreachable.is_empty() {
            tracing::warn!(
                "Rebuild left {} unreachable node(s) untouched in scope {:?}",
                numbering.unreachable.len(),
                group.first().map(|node| &node.scope)
            );
        }
        summary.skipped.extend(numbering.unreachable);
    }

    tracing::info!(
        "Rebuilt '{}': {} scope(s), {} node(s), {} updated",
        config.table,
        summary.scopes,
        summary.numbered,
        summary.updated
    );
    Ok(summary)
}

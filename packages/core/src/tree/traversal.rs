//! Traversal Query Builder
//!
//! Pure functions deriving `NodeQuery` values from a node's interval, plus
//! the async read helpers that need more than one query (level, root, sibling
//! lookups, nested list).
//!
//! Every query is restricted to the node's scope and ordered by the configured
//! order key. A node without an interval (not yet positioned) has no
//! interval-based relatives: those builders return a query matching nothing.

use std::collections::HashSet;

use serde_json::Value;

use crate::config::TreeConfig;
use crate::db::{Cmp, Column, Direction, NodeQuery, StoreTransaction, Trashed};
use crate::models::{Scope, TreeNode};
use crate::tree::TreeError;

/// Query matching no row
pub fn nothing() -> NodeQuery {
    NodeQuery::new().in_list(Column::Id, Vec::new())
}

/// Scope filter plus default ordering
pub fn scoped(config: &TreeConfig, scope: Option<&Scope>) -> NodeQuery {
    let query = NodeQuery::new();
    let query = match scope {
        Some(scope) => query.in_scope(&config.scope_columns, scope),
        None => query,
    };
    query.order_by(Column::Order, Direction::Asc)
}

fn in_node_scope(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    scoped(config, Some(&node.scope))
}

/// `left <= n.left AND right >= n.right`
pub fn ancestors_and_self(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    match node.interval() {
        Some((left, right)) => in_node_scope(config, node)
            .compare(Column::Left, Cmp::Le, left)
            .compare(Column::Right, Cmp::Ge, right),
        None => nothing(),
    }
}

pub fn ancestors(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    ancestors_and_self(config, node).without(&node.id)
}

pub fn ancestors_and_self_without_root(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    ancestors_and_self(config, node).not_null(Column::Parent)
}

pub fn ancestors_without_root(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    ancestors(config, node).not_null(Column::Parent)
}

/// `left >= n.left AND left < n.right`
pub fn descendants_and_self(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    match node.interval() {
        Some((left, right)) => in_node_scope(config, node)
            .compare(Column::Left, Cmp::Ge, left)
            .compare(Column::Left, Cmp::Lt, right),
        None => nothing(),
    }
}

pub fn descendants(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    descendants_and_self(config, node).without(&node.id)
}

/// Rows strictly inside the node's interval
///
/// Unlike `descendants`, this does not depend on the node's own row, so it
/// also finds the trashed descendants of a trashed node.
pub fn inside_interval(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    match node.interval() {
        Some((left, right)) => NodeQuery::new()
            .in_scope(&config.scope_columns, &node.scope)
            .compare(Column::Left, Cmp::Gt, left)
            .compare(Column::Right, Cmp::Lt, right),
        None => nothing(),
    }
}

/// `parent = n.parent` (IS NULL for roots)
pub fn siblings_and_self(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    let parent = node
        .parent_id
        .clone()
        .map(Value::String)
        .unwrap_or(Value::Null);
    in_node_scope(config, node).eq(Column::Parent, parent)
}

pub fn siblings(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    siblings_and_self(config, node).without(&node.id)
}

/// Immediate children
pub fn children(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    in_node_scope(config, node).eq(Column::Parent, node.id.as_str())
}

/// Every leaf (`right - left = 1`) of the scope
pub fn leaves(config: &TreeConfig, scope: Option<&Scope>) -> NodeQuery {
    scoped(config, scope).span(Cmp::Eq, 1)
}

pub fn leaves_under(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    descendants(config, node).span(Cmp::Eq, 1)
}

/// Every trunk (`parent IS NOT NULL AND right - left != 1`) of the scope
pub fn trunks(config: &TreeConfig, scope: Option<&Scope>) -> NodeQuery {
    scoped(config, scope)
        .not_null(Column::Parent)
        .span(Cmp::Ne, 1)
}

pub fn trunks_under(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    descendants(config, node)
        .not_null(Column::Parent)
        .span(Cmp::Ne, 1)
}

/// `parent IS NULL`
pub fn roots(config: &TreeConfig, scope: Option<&Scope>) -> NodeQuery {
    scoped(config, scope).is_null(Column::Parent)
}

/// `depth = n.depth`, excluding `n`
pub fn others_at_same_depth(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    in_node_scope(config, node)
        .eq(Column::Depth, node.depth.unwrap_or(0))
        .without(&node.id)
}

/// Nearest preceding sibling first
pub fn left_siblings(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    match node.left {
        Some(left) => siblings(config, node)
            .compare(Column::Left, Cmp::Lt, left)
            .reorder_by(Column::Left, Direction::Desc),
        None => nothing(),
    }
}

/// Nearest following sibling first
pub fn right_siblings(config: &TreeConfig, node: &TreeNode) -> NodeQuery {
    match node.left {
        Some(left) => siblings(config, node)
            .compare(Column::Left, Cmp::Gt, left)
            .reorder_by(Column::Left, Direction::Asc),
        None => nothing(),
    }
}

/// Row with the largest right bound in the scope
pub fn max_right(config: &TreeConfig, scope: &Scope) -> NodeQuery {
    NodeQuery::new()
        .in_scope(&config.scope_columns, scope)
        .order_by(Column::Right, Direction::Desc)
        .limit(1)
}

/// Reload a live node
pub async fn reload(tx: &dyn StoreTransaction, node: &TreeNode) -> Result<TreeNode, TreeError> {
    tx.find(&node.id, Trashed::Exclude)
        .await?
        .ok_or_else(|| TreeError::node_not_found(&node.id))
}

/// Number of ancestors, resolved through the parent chain
///
/// Returns 0 for roots. The chain is walked row by row; when it cannot be
/// followed to a root (missing parent row or a cycle) the ancestors are
/// counted by interval instead.
pub async fn get_level(tx: &dyn StoreTransaction, node: &TreeNode) -> Result<i64, TreeError> {
    let mut parent_id = match &node.parent_id {
        None => return Ok(0),
        Some(parent_id) => parent_id.clone(),
    };

    let mut visited = HashSet::from([node.id.clone()]);
    let mut hops = 0;

    loop {
        if !visited.insert(parent_id.clone()) {
            tracing::warn!("Parent chain of node {} loops at {}", node.id, parent_id);
            break;
        }

        let parent = match tx.find(&parent_id, Trashed::Exclude).await? {
            Some(parent) => parent,
            None => break,
        };
        hops += 1;

        match parent.parent_id {
            None => return Ok(hops),
            Some(next) => parent_id = next,
        }
    }

    if node.interval().is_some() {
        let config = tx.config();
        Ok(tx.count(&ancestors(config, node)).await? as i64)
    } else {
        Ok(hops)
    }
}

/// Root of the tree containing `node`
///
/// Persisted nodes are resolved by interval; unpersisted nodes by following
/// their parent chain. A node without a parent is its own root.
pub async fn get_root(tx: &dyn StoreTransaction, node: &TreeNode) -> Result<TreeNode, TreeError> {
    let config = tx.config();
    let mut current = node.clone();
    let mut visited = HashSet::new();

    loop {
        if current.exists() && current.interval().is_some() {
            let query = ancestors_and_self(config, &current).is_null(Column::Parent);
            if let Some(root) = tx.first(&query).await? {
                return Ok(root);
            }
        }

        let parent_id = match &current.parent_id {
            None => return Ok(current),
            Some(parent_id) => parent_id.clone(),
        };
        if !visited.insert(current.id.clone()) {
            return Ok(current);
        }

        match tx.find(&parent_id, Trashed::Exclude).await? {
            Some(parent) => current = parent,
            None => return Ok(current),
        }
    }
}

pub async fn left_sibling(
    tx: &dyn StoreTransaction,
    node: &TreeNode,
) -> Result<Option<TreeNode>, TreeError> {
    Ok(tx.first(&left_siblings(tx.config(), node)).await?)
}

pub async fn right_sibling(
    tx: &dyn StoreTransaction,
    node: &TreeNode,
) -> Result<Option<TreeNode>, TreeError> {
    Ok(tx.first(&right_siblings(tx.config(), node)).await?)
}

/// Descendants, optionally bounded to `limit` levels below the node
///
/// The base depth is the stored depth for persisted nodes and the computed
/// level otherwise.
pub async fn descendants_limited(
    tx: &dyn StoreTransaction,
    node: &TreeNode,
    include_self: bool,
    limit: Option<i64>,
) -> Result<Vec<TreeNode>, TreeError> {
    let config = tx.config();
    let mut query = if include_self {
        descendants_and_self(config, node)
    } else {
        descendants(config, node)
    };

    if let Some(limit) = limit {
        let base = match (node.exists(), node.depth) {
            (true, Some(depth)) => depth,
            _ => get_level(tx, node).await?,
        };
        query = query.limit_depth(base, limit);
    }

    Ok(tx.select(&query).await?)
}

/// `(id, label)` pairs in tree order, where the label is `column` prefixed by
/// `separator` repeated `depth` times and then `symbol`
pub async fn nested_list(
    tx: &dyn StoreTransaction,
    scope: Option<&Scope>,
    column: &str,
    separator: &str,
    symbol: &str,
) -> Result<Vec<(String, String)>, TreeError> {
    let config = tx.config();
    let query = scoped(config, scope).reorder_by(Column::Left, Direction::Asc);
    let nodes = tx.select(&query).await?;

    Ok(nodes
        .into_iter()
        .map(|node| {
            let value = if column == config.columns.id {
                node.id.clone()
            } else {
                match node.attribute(column) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                }
            };
            let depth = node.depth.unwrap_or(0).max(0) as usize;
            let label = format!("{}{}{}", separator.repeat(depth), symbol, value);
            (node.id, label)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Predicate;
    use serde_json::json;

    fn node(id: &str, left: i64, right: i64) -> TreeNode {
        let mut node = TreeNode::with_id(id);
        node.left = Some(left);
        node.right = Some(right);
        node.depth = Some(1);
        node.parent_id = Some("root".to_string());
        node
    }

    #[test]
    fn test_descendants_bounds() {
        let config = TreeConfig::default();
        let query = descendants(&config, &node("b", 2, 7));

        assert_eq!(
            query.predicates,
            vec![
                Predicate::Compare {
                    column: Column::Left,
                    cmp: Cmp::Ge,
                    value: json!(2)
                },
                Predicate::Compare {
                    column: Column::Left,
                    cmp: Cmp::Lt,
                    value: json!(7)
                },
                Predicate::Compare {
                    column: Column::Id,
                    cmp: Cmp::Ne,
                    value: json!("b")
                },
            ]
        );
        assert_eq!(query.order, vec![(Column::Order, Direction::Asc)]);
    }

    #[test]
    fn test_unpositioned_node_has_no_relatives() {
        let config = TreeConfig::default();
        let fresh = TreeNode::with_id("fresh");
        assert_eq!(descendants(&config, &fresh).predicates, nothing().predicates);
        assert_eq!(ancestors_and_self(&config, &fresh), nothing());
    }

    #[test]
    fn test_siblings_of_root_match_null_parent() {
        let config = TreeConfig::default().with_scope(["tenant"]);
        let root = TreeNode::with_id("r").with_scope_value("tenant", json!(1));
        let query = siblings_and_self(&config, &root);

        assert!(query.predicates.contains(&Predicate::Compare {
            column: Column::Parent,
            cmp: Cmp::Eq,
            value: Value::Null
        }));
        assert!(query.predicates.contains(&Predicate::Compare {
            column: Column::Scope("tenant".to_string()),
            cmp: Cmp::Eq,
            value: json!(1)
        }));
    }

    #[test]
    fn test_left_siblings_order_descending() {
        let config = TreeConfig::default();
        let query = left_siblings(&config, &node("c", 6, 7));
        assert_eq!(query.order, vec![(Column::Left, Direction::Desc)]);
    }

    #[test]
    fn test_trunks_exclude_roots_and_leaves() {
        let config = TreeConfig::default();
        let query = trunks(&config, None);
        assert!(query.predicates.contains(&Predicate::NotNull(Column::Parent)));
        assert!(query.predicates.contains(&Predicate::Span {
            cmp: Cmp::Ne,
            value: 1
        }));
    }
}

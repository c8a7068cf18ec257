//! Invariant Validator
//!
//! Read-only check of the nested set invariants, scope by scope, over live
//! rows. Diagnostic only: nothing on the write path calls it, and it never
//! repairs (see `RebuildEngine`).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::db::{Column, Direction, NodeQuery, StoreTransaction, TreeStore, TxMode};
use crate::models::{Scope, TreeNode};
use crate::tree::TreeError;

/// One violated invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A live row without left or right bound
    MissingBounds { id: String },

    /// `left >= right`
    InvertedBounds { id: String, left: i64, right: i64 },

    /// Bound value used more than once in the scope
    DuplicateBound { value: i64, ids: Vec<String> },

    /// Parent reference to a row that is not live in the scope
    MissingParent { id: String, parent_id: String },

    /// Children do not exactly tile the parent's interior
    ///
    /// `expected` is the bound the next child (or the parent's own right
    /// bound) should have had.
    ChildrenGap {
        parent_id: String,
        child_id: Option<String>,
        expected: i64,
        found: i64,
    },

    /// Stored depth differs from the number of ancestors
    DepthMismatch {
        id: String,
        expected: i64,
        found: i64,
    },

    /// Two roots overlap or are out of order
    RootOverlap { first: String, second: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBounds { id } => write!(f, "node {} has no interval", id),
            Self::InvertedBounds { id, left, right } => {
                write!(f, "node {} has left {} >= right {}", id, left, right)
            }
            Self::DuplicateBound { value, ids } => {
                write!(f, "bound {} is shared by {}", value, ids.join(", "))
            }
            Self::MissingParent { id, parent_id } => {
                write!(f, "node {} references missing parent {}", id, parent_id)
            }
            Self::ChildrenGap {
                parent_id,
                child_id,
                expected,
                found,
            } => match child_id {
                Some(child) => write!(
                    f,
                    "child {} of {} starts at {}, expected {}",
                    child, parent_id, found, expected
                ),
                None => write!(
                    f,
                    "node {} ends at {}, expected {}",
                    parent_id, found, expected
                ),
            },
            Self::DepthMismatch {
                id,
                expected,
                found,
            } => write!(f, "node {} has depth {}, expected {}", id, found, expected),
            Self::RootOverlap { first, second } => {
                write!(f, "roots {} and {} overlap", first, second)
            }
        }
    }
}

/// Result of validating a table (or one scope)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub scopes: usize,
    pub nodes: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn passes(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Err(ValidationFailed)` listing every issue when the check failed
    pub fn into_result(self) -> Result<Self, TreeError> {
        if self.passes() {
            return Ok(self);
        }
        let details: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        Err(TreeError::ValidationFailed(details.join("; ")))
    }
}

fn interval_of(node: &TreeNode) -> (i64, i64) {
    node.interval().unwrap_or((0, 0))
}

/// Check every invariant over one scope's live rows
pub fn check_scope(nodes: &[TreeNode]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // Bounds present, ordered and unique
    let mut owners: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    let mut positioned: Vec<&TreeNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Some((left, right)) = node.interval() else {
            issues.push(ValidationIssue::MissingBounds {
                id: node.id.clone(),
            });
            continue;
        };
        if left >= right {
            issues.push(ValidationIssue::InvertedBounds {
                id: node.id.clone(),
                left,
                right,
            });
        }
        owners.entry(left).or_default().push(node.id.clone());
        owners.entry(right).or_default().push(node.id.clone());
        positioned.push(node);
    }
    for (value, ids) in owners {
        if ids.len() > 1 {
            issues.push(ValidationIssue::DuplicateBound { value, ids });
        }
    }

    let by_id: HashMap<&str, &TreeNode> = positioned.iter().map(|n| (n.id.as_str(), *n)).collect();
    let mut children: HashMap<&str, Vec<&TreeNode>> = HashMap::new();
    let mut roots: Vec<&TreeNode> = Vec::new();
    for node in positioned.iter().copied() {
        match node.parent_id.as_deref() {
            None => roots.push(node),
            Some(parent) if by_id.contains_key(parent) => {
                children.entry(parent).or_default().push(node)
            }
            Some(parent) => issues.push(ValidationIssue::MissingParent {
                id: node.id.clone(),
                parent_id: parent.to_string(),
            }),
        }
    }

    // Children tile the parent's interior; a leaf has right = left + 1
    for parent in positioned.iter().copied() {
        let (left, right) = interval_of(parent);
        let mut kids = children.get(parent.id.as_str()).cloned().unwrap_or_default();
        kids.sort_by_key(|kid| interval_of(kid).0);

        let mut expected = left + 1;
        for kid in kids {
            let (kid_left, kid_right) = interval_of(kid);
            if kid_left != expected {
                issues.push(ValidationIssue::ChildrenGap {
                    parent_id: parent.id.clone(),
                    child_id: Some(kid.id.clone()),
                    expected,
                    found: kid_left,
                });
            }
            expected = kid_right + 1;
        }
        if right != expected {
            issues.push(ValidationIssue::ChildrenGap {
                parent_id: parent.id.clone(),
                child_id: None,
                expected,
                found: right,
            });
        }
    }

    // Roots are disjoint and ordered
    roots.sort_by_key(|root| interval_of(root).0);
    for pair in roots.windows(2) {
        if interval_of(pair[1]).0 <= interval_of(pair[0]).1 {
            issues.push(ValidationIssue::RootOverlap {
                first: pair[0].id.clone(),
                second: pair[1].id.clone(),
            });
        }
    }

    // Depth equals the number of ancestors, walking down from each root
    let mut seen = HashSet::new();
    let mut stack: Vec<(&TreeNode, i64)> = roots.iter().map(|root| (*root, 0)).collect();
    while let Some((node, expected)) = stack.pop() {
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        let found = node.depth.unwrap_or(-1);
        if found != expected {
            issues.push(ValidationIssue::DepthMismatch {
                id: node.id.clone(),
                expected,
                found,
            });
        }
        if let Some(kids) = children.get(node.id.as_str()) {
            stack.extend(kids.iter().map(|kid| (*kid, expected + 1)));
        }
    }

    issues
}

pub(crate) async fn validate_in(
    tx: &dyn StoreTransaction,
    only: Option<&Scope>,
) -> Result<ValidationReport, TreeError> {
    let config = tx.config();

    let mut query = NodeQuery::new();
    if let Some(values) = only {
        query = query.in_scope(&config.scope_columns, values);
    }
    for column in &config.scope_columns {
        query = query.order_by(Column::Scope(column.clone()), Direction::Asc);
    }
    let nodes = tx
        .select(&query.order_by(Column::Left, Direction::Asc))
        .await?;

    let mut report = ValidationReport {
        nodes: nodes.len(),
        ..Default::default()
    };
    for group in nodes.chunk_by(|a, b| a.scope == b.scope) {
        report.scopes += 1;
        report.issues.extend(check_scope(group));
    }

    if !report.passes() {
        tracing::warn!(
            "Validation of '{}' found {} issue(s)",
            config.table,
            report.issues.len()
        );
    }
    Ok(report)
}

/// Read-only invariant check over a store
pub struct Validator {
    store: Arc<dyn TreeStore>,
}

impl Validator {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Validate every scope of the table
    pub async fn validate(&self) -> Result<ValidationReport, TreeError> {
        self.run(None).await
    }

    /// Validate one scope
    pub async fn validate_scope(&self, values: &Scope) -> Result<ValidationReport, TreeError> {
        self.run(Some(values)).await
    }

    async fn run(&self, only: Option<&Scope>) -> Result<ValidationReport, TreeError> {
        let tx = self.store.begin(TxMode::Read).await?;
        let result = validate_in(tx.as_ref(), only).await;
        match &result {
            Ok(_) => tx.commit().await?,
            Err(_) => tx.rollback().await?,
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, left: i64, right: i64, depth: i64) -> TreeNode {
        let mut node = TreeNode::with_id(id);
        node.parent_id = parent.map(str::to_string);
        node.left = Some(left);
        node.right = Some(right);
        node.depth = Some(depth);
        node
    }

    fn valid_forest() -> Vec<TreeNode> {
        vec![
            node("a", None, 1, 6, 0),
            node("b", Some("a"), 2, 3, 1),
            node("c", Some("a"), 4, 5, 1),
            node("d", None, 7, 8, 0),
        ]
    }

    #[test]
    fn test_valid_forest_passes() {
        assert!(check_scope(&valid_forest()).is_empty());
        assert!(check_scope(&[]).is_empty());
    }

    #[test]
    fn test_detects_gap_between_siblings() {
        let mut nodes = valid_forest();
        nodes[2] = node("c", Some("a"), 5, 6, 1);
        nodes[0] = node("a", None, 1, 7, 0);
        nodes[3] = node("d", None, 8, 9, 0);

        let issues = check_scope(&nodes);
        assert_eq!(
            issues,
            vec![ValidationIssue::ChildrenGap {
                parent_id: "a".to_string(),
                child_id: Some("c".to_string()),
                expected: 4,
                found: 5
            }]
        );
    }

    #[test]
    fn test_detects_duplicates_and_overlapping_roots() {
        let mut nodes = valid_forest();
        nodes[3] = node("d", None, 6, 9, 0);

        let issues = check_scope(&nodes);
        assert!(issues.contains(&ValidationIssue::DuplicateBound {
            value: 6,
            ids: vec!["a".to_string(), "d".to_string()]
        }));
        assert!(issues.contains(&ValidationIssue::RootOverlap {
            first: "a".to_string(),
            second: "d".to_string()
        }));
    }

    #[test]
    fn test_detects_depth_drift_and_leaf_width() {
        let mut nodes = valid_forest();
        nodes[1] = node("b", Some("a"), 2, 3, 3);
        nodes[3] = node("d", None, 7, 10, 0);

        let issues = check_scope(&nodes);
        assert!(issues.contains(&ValidationIssue::DepthMismatch {
            id: "b".to_string(),
            expected: 1,
            found: 3
        }));
        assert!(issues.contains(&ValidationIssue::ChildrenGap {
            parent_id: "d".to_string(),
            child_id: None,
            expected: 8,
            found: 10
        }));
    }

    #[test]
    fn test_report_into_result() {
        let report = ValidationReport {
            scopes: 1,
            nodes: 1,
            issues: vec![ValidationIssue::MissingBounds {
                id: "x".to_string(),
            }],
        };
        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("node x has no interval"));
    }
}

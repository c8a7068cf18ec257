//! Move Arithmetic
//!
//! A move relocates the subtree `[left, right]` of width `w` in four steps
//! that all run inside one write transaction:
//!
//! 1. **Park**: reflect the subtree's bounds into negative space
//!    (`b -> -b`), so no later shift can touch it
//! 2. **Close**: every bound greater than `right` drops by `w`
//! 3. **Open**: with the target re-read, every bound `>= anchor` grows by `w`
//! 4. **Unpark**: reflect the parked bounds back around `anchor - left`
//!    (`-b -> anchor - left + b`), which shifts the subtree so its root's
//!    left bound lands on `anchor`
//!
//! The functions here are pure; `MutationEngine` issues the statements.

use crate::models::TreeNode;
use crate::tree::TreeError;

/// Where a moved node ends up, relative to a target node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// Immediately before the target, as its sibling
    LeftOf(String),

    /// Immediately after the target, as its sibling
    RightOf(String),

    /// Last child of the target
    ChildOf(String),

    /// Last root of the scope
    Root,
}

impl Position {
    /// ID of the target node, if the position has one
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::LeftOf(id) | Self::RightOf(id) | Self::ChildOf(id) => Some(id),
            Self::Root => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LeftOf(_) => "left",
            Self::RightOf(_) => "right",
            Self::ChildOf(_) => "child",
            Self::Root => "root",
        }
    }

    /// Left bound the moved node will have, given the target as re-read after
    /// the gap was closed (or, for `Root`, the scope's maximum right bound)
    pub fn anchor(&self, target: Option<&TreeNode>, max_right: Option<i64>) -> Option<i64> {
        match self {
            Self::Root => Some(max_right.map_or(1, |max| max + 1)),
            Self::LeftOf(_) => target.and_then(|t| t.left),
            Self::RightOf(_) => target.and_then(|t| t.right).map(|right| right + 1),
            Self::ChildOf(_) => target.and_then(|t| t.right),
        }
    }

    /// Depth the moved node will have
    pub fn depth(&self, target: Option<&TreeNode>) -> i64 {
        let target_depth = target.and_then(|t| t.depth).unwrap_or(0);
        match self {
            Self::Root => 0,
            Self::LeftOf(_) | Self::RightOf(_) => target_depth,
            Self::ChildOf(_) => target_depth + 1,
        }
    }

    /// Parent the moved node will have
    pub fn parent(&self, target: Option<&TreeNode>) -> Option<String> {
        match self {
            Self::Root => None,
            Self::LeftOf(_) | Self::RightOf(_) => target.and_then(|t| t.parent_id.clone()),
            Self::ChildOf(_) => target.map(|t| t.id.clone()),
        }
    }
}

/// Reject moves that would break the tree before any row is touched
///
/// `target` is `None` only for `Position::Root`.
pub fn check_move(
    node: &TreeNode,
    target: Option<&TreeNode>,
    position: &Position,
) -> Result<(), TreeError> {
    if node.interval().is_none() {
        return Err(TreeError::invalid_move(&node.id, "node has no interval"));
    }

    let target = match (target, position) {
        (None, Position::Root) => return Ok(()),
        (Some(target), _) => target,
        (None, _) => {
            return Err(TreeError::invalid_move(
                &node.id,
                format!("{} target does not exist", position.name()),
            ))
        }
    };

    if target.id == node.id {
        return Err(TreeError::invalid_move(
            &node.id,
            "a node cannot be moved relative to itself",
        ));
    }
    if !node.in_same_scope(target) {
        return Err(TreeError::invalid_move(
            &node.id,
            format!("target {} is in a different scope", target.id),
        ));
    }
    if target.is_descendant_of(node) {
        return Err(TreeError::invalid_move(
            &node.id,
            format!("target {} is inside the moved subtree", target.id),
        ));
    }
    if target.interval().is_none() {
        return Err(TreeError::invalid_move(
            &node.id,
            format!("target {} has no interval", target.id),
        ));
    }

    Ok(())
}

/// Bounds of the subtree being moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub left: i64,
    pub right: i64,
}

impl MovePlan {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Parked range of left bounds (after reflecting around 0)
    pub fn parked_range(&self) -> (i64, i64) {
        (-self.right, -self.left)
    }

    /// Pivot that unparks the subtree so its left bound becomes `anchor`
    pub fn unpark_pivot(&self, anchor: i64) -> i64 {
        anchor - self.left
    }

    /// Lowest left bound touched by the move
    pub fn lock_floor(&self, target: Option<&TreeNode>) -> i64 {
        target
            .and_then(|t| t.left)
            .map_or(self.left, |left| left.min(self.left))
    }
}

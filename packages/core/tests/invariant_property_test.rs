//! Property Tests for Tree Invariants
//!
//! Random sequences of inserts, moves, deletes and delete/restore pairs are
//! applied to a fresh table; the validator must pass after every step, and
//! rebuilding the result must be idempotent.

mod common;

use anyhow::{bail, Result};
use canopy_core::config::TreeConfig;
use canopy_core::db::{Column, Direction, NodeQuery};
use canopy_core::models::TreeNode;
use canopy_core::services::TreeService;
use canopy_core::tree::{TreeError, TxScope};
use proptest::prelude::*;

use crate::common::create_test_service;

#[derive(Debug, Clone)]
enum Op {
    /// Insert under the n-th live node, or as a root
    Insert(Option<usize>),
    /// Move the n-th live node relative to the t-th, `kind` picks the position
    Move(usize, usize, u8),
    /// Soft-delete the n-th live node, restoring it right away when set
    Delete(usize, bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => proptest::option::of(0usize..64).prop_map(Op::Insert),
        4 => (0usize..64, 0usize..64, 0u8..5).prop_map(|(n, t, kind)| Op::Move(n, t, kind)),
        1 => (0usize..64, any::<bool>()).prop_map(|(n, restore)| Op::Delete(n, restore)),
    ]
}

async fn live_nodes(service: &TreeService) -> Result<Vec<TreeNode>> {
    Ok(service
        .select(&NodeQuery::new().order_by(Column::Id, Direction::Asc))
        .await?)
}

async fn apply(service: &TreeService, step: usize, op: &Op) -> Result<()> {
    let live = live_nodes(service).await?;
    let engine = service.engine();

    match op {
        Op::Insert(parent) => {
            let mut node = TreeNode::with_id(format!("n{:03}", step));
            if let (Some(index), false) = (parent, live.is_empty()) {
                node.parent_id = Some(live[index % live.len()].id.clone());
            }
            service.create(node).await?;
        }
        Op::Move(n, t, kind) => {
            if live.is_empty() {
                return Ok(());
            }
            let node = &live[n % live.len()];
            let target = &live[t % live.len()];
            let scope = TxScope::Owned;
            let result = match kind {
                0 => engine.make_child_of(node, target, &scope).await,
                1 => engine.move_to_left_of(node, target, &scope).await,
                2 => engine.move_to_right_of(node, target, &scope).await,
                3 => engine.make_first_child_of(node, target, &scope).await,
                _ => engine.make_root(node, &scope).await,
            };
            match result {
                Ok(_) | Err(TreeError::InvalidMove { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Op::Delete(n, restore) => {
            if live.is_empty() {
                return Ok(());
            }
            let node = &live[n % live.len()];
            let before = service.descendants(node, None).await?;
            service.delete(node).await?;

            if *restore {
                let restored = service.restore(node).await?;
                let after = service.descendants(&restored, None).await?;
                let before: Vec<&str> = before.iter().map(|n| n.id.as_str()).collect();
                let after: Vec<&str> = after.iter().map(|n| n.id.as_str()).collect();
                if before != after {
                    bail!("restore changed descendants: {:?} -> {:?}", before, after);
                }
            }
        }
    }
    Ok(())
}

async fn run(ops: Vec<Op>) -> Result<()> {
    let config = TreeConfig::new("nodes").with_soft_deletes("deleted_at");
    let (service, _temp_dir) = create_test_service(config).await?;

    for (step, op) in ops.iter().enumerate() {
        apply(&service, step, op).await?;

        let report = service.validate().await?;
        if !report.passes() {
            bail!("step {} ({:?}) broke the tree: {:?}", step, op, report.issues);
        }
    }

    service.rebuild().await?;
    let again = service.rebuild().await?;
    if again.updated != 0 {
        bail!("second rebuild changed {} row(s)", again.updated);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_operations_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let result = tokio_test::block_on(run(ops));
        prop_assert!(result.is_ok(), "{:?}", result.err());
    }
}

//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use canopy_core::config::TreeConfig;
use canopy_core::db::TursoStore;
use canopy_core::models::TreeNode;
use canopy_core::services::TreeService;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG`; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper to create a service over a fresh file database
pub async fn create_test_service(config: TreeConfig) -> Result<(TreeService, TempDir)> {
    let (store, temp_dir) = create_test_store(config).await?;
    Ok((TreeService::new(store), temp_dir))
}

/// Helper to create a store when a test needs raw SQL access as well
pub async fn create_test_store(config: TreeConfig) -> Result<(Arc<TursoStore>, TempDir)> {
    init_tracing();
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let store = TursoStore::open(db_path, config).await?;
    Ok((Arc::new(store), temp_dir))
}

/// Create a node with the given ID under `parent` (or as a root)
pub async fn add(service: &TreeService, id: &str, parent: Option<&str>) -> Result<TreeNode> {
    let mut node = TreeNode::with_id(id);
    node.parent_id = parent.map(str::to_string);
    Ok(service.create(node).await?)
}

/// `(left, right, depth)` of a live node
pub async fn bounds(service: &TreeService, id: &str) -> Result<(i64, i64, i64)> {
    let node = service.get(id).await?;
    Ok((
        node.left.unwrap_or_default(),
        node.right.unwrap_or_default(),
        node.depth.unwrap_or_default(),
    ))
}

pub fn ids(nodes: &[TreeNode]) -> Vec<&str> {
    nodes.iter().map(|node| node.id.as_str()).collect()
}

/// Fail the test with every issue when the tree is inconsistent
pub async fn assert_valid(service: &TreeService) -> Result<()> {
    service.validate().await?.into_result()?;
    Ok(())
}

//! Rebuild and Validation Tests
//!
//! The rebuild engine recomputes every interval from parent links alone; the
//! validator reports what is wrong with a table without touching it.

mod common;

#[cfg(test)]
mod rebuild_tests {
    use anyhow::Result;
    use canopy_core::config::TreeConfig;
    use canopy_core::db::TursoStore;
    use canopy_core::services::TreeService;
    use canopy_core::tree::{RebuildEngine, TreeError, TxScope, ValidationIssue, Validator};

    use crate::common::{add, bounds, create_test_store, ids};

    /// R(1,10) [ A(2,7) [ A1(3,4), A2(5,6) ], B(8,9) ], S(11,12)
    async fn seed(service: &TreeService) -> Result<()> {
        add(service, "R", None).await?;
        add(service, "A", Some("R")).await?;
        add(service, "A1", Some("A")).await?;
        add(service, "A2", Some("A")).await?;
        add(service, "B", Some("R")).await?;
        add(service, "S", None).await?;
        Ok(())
    }

    async fn run_sql(store: &TursoStore, sql: &str) -> Result<()> {
        let conn = store.database().connect_with_timeout().await?;
        conn.execute(sql, ()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_rebuild_of_consistent_tree_changes_nothing() -> Result<()> {
        let (store, _temp_dir) = create_test_store(TreeConfig::default()).await?;
        let service = TreeService::new(store.clone());
        seed(&service).await?;

        let summary = service.rebuild().await?;
        assert_eq!(summary.scopes, 1);
        assert_eq!(summary.numbered, 6);
        assert_eq!(summary.updated, 0);
        assert!(summary.skipped.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_rebuild_repairs_corrupted_bounds() -> Result<()> {
        let (store, _temp_dir) = create_test_store(TreeConfig::default()).await?;
        let service = TreeService::new(store.clone());
        seed(&service).await?;

        run_sql(&store, "UPDATE nodes SET rgt = rgt + 20, depth = 7").await?;

        let report = service.validate().await?;
        assert!(!report.passes());
        assert!(report
            .issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::DepthMismatch { .. })));
        assert!(matches!(
            report.into_result(),
            Err(TreeError::ValidationFailed(_))
        ));

        let summary = service.rebuild().await?;
        assert_eq!(summary.updated, 6);

        assert_eq!(bounds(&service, "R").await?, (1, 10, 0));
        assert_eq!(bounds(&service, "A").await?, (2, 7, 1));
        assert_eq!(bounds(&service, "A2").await?, (5, 6, 2));
        assert_eq!(bounds(&service, "B").await?, (8, 9, 1));
        assert_eq!(bounds(&service, "S").await?, (11, 12, 0));
        assert!(service.validate().await?.passes());

        // Idempotent on its own output
        let again = service.rebuild().await?;
        assert_eq!(again.updated, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_rebuild_leaves_orphans_untouched() -> Result<()> {
        let (store, _temp_dir) = create_test_store(TreeConfig::default()).await?;
        let service = TreeService::new(store.clone());
        seed(&service).await?;

        run_sql(&store, "UPDATE nodes SET parent_id = 'gone' WHERE id = 'A'").await?;

        let report = service.validate().await?;
        assert!(report.issues.contains(&ValidationIssue::MissingParent {
            id: "A".to_string(),
            parent_id: "gone".to_string()
        }));

        let summary = service.rebuild().await?;
        let mut skipped = summary.skipped.clone();
        skipped.sort();
        assert_eq!(skipped, vec!["A", "A1", "A2"]);

        // R now only holds B
        assert_eq!(bounds(&service, "R").await?, (1, 4, 0));
        assert_eq!(bounds(&service, "B").await?, (2, 3, 1));
        assert_eq!(bounds(&service, "S").await?, (5, 6, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_engines_over_shared_store() -> Result<()> {
        let (store, _temp_dir) = create_test_store(TreeConfig::default()).await?;
        let service = TreeService::new(store.clone());
        seed(&service).await?;

        run_sql(&store, "UPDATE nodes SET lft = lft + 1 WHERE id = 'B'").await?;

        let validator = Validator::new(store.clone());
        let report = validator.validate().await?;
        assert_eq!(report.nodes, 6);
        assert!(report.issues.iter().any(|issue| matches!(
            issue,
            ValidationIssue::ChildrenGap { child_id: Some(child), .. } if child == "B"
        )));

        RebuildEngine::new(store.clone())
            .rebuild(&TxScope::Owned)
            .await?;
        assert!(validator.validate().await?.passes());

        let r = service.get("R").await?;
        assert_eq!(ids(&service.children(&r).await?), vec!["A", "B"]);
        Ok(())
    }
}

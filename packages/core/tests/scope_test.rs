//! Scope Tests
//!
//! A scoped table holds one independent forest per combination of scope
//! column values. Numbering, traversal and validation never cross scopes.

mod common;

#[cfg(test)]
mod scope_tests {
    use anyhow::Result;
    use canopy_core::config::{OrderKey, TreeConfig};
    use canopy_core::models::{Scope, TreeNode};
    use canopy_core::services::TreeService;
    use canopy_core::tree::{TreeError, TxScope};
    use serde_json::json;

    use crate::common::{bounds, create_test_service, ids};

    fn tenant(id: i64) -> Scope {
        Scope::from([("tenant_id".to_string(), json!(id))])
    }

    async fn add_in(
        service: &TreeService,
        tenant_id: i64,
        id: &str,
        parent: Option<&str>,
    ) -> Result<TreeNode> {
        let mut node = TreeNode::with_id(id).with_scope(tenant(tenant_id));
        node.parent_id = parent.map(str::to_string);
        Ok(service.create(node).await?)
    }

    fn scoped_config() -> TreeConfig {
        TreeConfig::new("menus").with_scope(["tenant_id"])
    }

    #[tokio::test]
    async fn test_scopes_are_numbered_independently() -> Result<()> {
        let (service, _temp_dir) = create_test_service(scoped_config()).await?;

        add_in(&service, 1, "a", None).await?;
        add_in(&service, 1, "a1", Some("a")).await?;
        add_in(&service, 2, "b", None).await?;
        add_in(&service, 2, "b1", Some("b")).await?;
        add_in(&service, 2, "b2", Some("b")).await?;

        assert_eq!(bounds(&service, "a").await?, (1, 4, 0));
        assert_eq!(bounds(&service, "b").await?, (1, 6, 0));
        assert_eq!(bounds(&service, "b2").await?, (4, 5, 1));

        assert_eq!(ids(&service.roots(Some(&tenant(1))).await?), vec!["a"]);
        assert_eq!(ids(&service.all_leaves(Some(&tenant(2))).await?), vec!["b1", "b2"]);

        let report = service.validate().await?;
        assert!(report.passes(), "{:?}", report.issues);
        assert_eq!(report.scopes, 2);
        assert_eq!(report.nodes, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_in_one_scope_leaves_other_untouched() -> Result<()> {
        let (service, _temp_dir) = create_test_service(scoped_config()).await?;

        add_in(&service, 1, "a", None).await?;
        let a1 = add_in(&service, 1, "a1", Some("a")).await?;
        add_in(&service, 2, "b", None).await?;
        add_in(&service, 2, "b1", Some("b")).await?;

        service.delete(&a1).await?;

        assert_eq!(bounds(&service, "a").await?, (1, 2, 0));
        assert_eq!(bounds(&service, "b").await?, (1, 4, 0));
        assert_eq!(bounds(&service, "b1").await?, (2, 3, 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_cross_scope_move_is_rejected() -> Result<()> {
        let (service, _temp_dir) = create_test_service(scoped_config()).await?;

        let a = add_in(&service, 1, "a", None).await?;
        let b = add_in(&service, 2, "b", None).await?;

        let err = service
            .engine()
            .make_child_of(&a, &b, &TxScope::Owned)
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidMove { .. }));

        assert_eq!(bounds(&service, "a").await?, (1, 2, 0));
        assert_eq!(bounds(&service, "b").await?, (1, 2, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_changing_scope_of_persisted_node_is_rejected() -> Result<()> {
        let (service, _temp_dir) = create_test_service(scoped_config()).await?;

        let mut a = add_in(&service, 1, "a", None).await?;
        a.scope = tenant(2);

        let err = service.save(&a).await.unwrap_err();
        assert!(matches!(err, TreeError::ScopeChange { .. }));
        assert_eq!(service.get("a").await?.scope, tenant(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_attribute_order_key_sorts_siblings() -> Result<()> {
        let config = scoped_config().with_order(OrderKey::Attribute("title".to_string()));
        let (service, _temp_dir) = create_test_service(config).await?;

        let root = add_in(&service, 1, "root", None).await?;
        for (id, title) in [("x", "Zebra"), ("y", "Apple"), ("z", "Mango")] {
            let node = TreeNode::with_id(id)
                .with_scope(tenant(1))
                .with_parent("root")
                .with_attribute("title", json!(title));
            service.create(node).await?;
        }

        // Interval order follows insertion, traversal order follows titles
        assert_eq!(bounds(&service, "x").await?, (2, 3, 1));
        assert_eq!(ids(&service.children(&root).await?), vec!["y", "z", "x"]);

        // Rebuild renumbers siblings in title order
        service.rebuild().await?;
        assert_eq!(bounds(&service, "y").await?, (2, 3, 1));
        assert_eq!(bounds(&service, "z").await?, (4, 5, 1));
        assert_eq!(bounds(&service, "x").await?, (6, 7, 1));
        assert!(service.validate().await?.passes());
        Ok(())
    }
}

//! TursoStore - TreeStore Implementation for Turso/libsql Backend
//!
//! This module implements `TreeStore` and `StoreTransaction` on top of
//! libsql, rendering `NodeQuery` values into parameterized SQL.
//!
//! # Locking
//!
//! SQLite has no row locks. Write transactions start with `BEGIN IMMEDIATE`,
//! which takes the database reserved lock up front, so every structural write
//! is serialized against other writers for its whole duration. `lock()` still
//! reads the requested rows (inside the transaction) so the call sites mirror
//! a row-locking backend, but the guarantee comes from the reserved lock.
//!
//! # Row Format
//!
//! Every select reads, in order: id, parent, left, right, depth, attributes,
//! updated_at, soft-delete marker (or NULL when disabled), then one column per
//! configured scope column.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::params::Params;
use libsql::Row;
use serde_json::{Map, Value};

use crate::config::{OrderKey, TreeConfig};
use crate::db::quote_ident;
use crate::db::query::{Cmp, Column, Direction, NodeQuery, Predicate, Trashed};
use crate::db::tree_store::{
    LockMode, SharedTransaction, StoreTransaction, TreeStore, TxMode,
};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::TreeNode;
use crate::tree::TreeError;

/// Number of fixed columns preceding the scope columns in a select
const FIXED_COLUMNS: usize = 8;

/// TursoStore implements TreeStore for the libsql backend
///
/// # Examples
///
/// ```rust,no_run
/// use canopy_core::config::TreeConfig;
/// use canopy_core::db::{TreeStore, TursoStore, TxMode};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = TursoStore::open("./data/tree.db", TreeConfig::new("categories")).await?;
/// let tx = store.begin(TxMode::Write).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct TursoStore {
    /// Underlying database service
    db: Arc<DatabaseService>,

    /// Table configuration shared with every transaction
    config: Arc<TreeConfig>,
}

impl TursoStore {
    /// Wrap an existing database service
    ///
    /// The table must already exist (see `DatabaseService::initialize_tree_table`).
    pub fn new(db: Arc<DatabaseService>, config: TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        Ok(Self {
            db,
            config: Arc::new(config),
        })
    }

    /// Open the database at `path` and create the table for `config`
    pub async fn open(path: impl AsRef<Path>, config: TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        let db = DatabaseService::new(path).await?;
        db.initialize_tree_table(&config).await?;
        Self::new(Arc::new(db), config)
    }

    /// Underlying database service
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }
}

#[async_trait]
impl TreeStore for TursoStore {
    fn config(&self) -> &TreeConfig {
        &self.config
    }

    async fn begin(&self, mode: TxMode) -> Result<SharedTransaction, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let statement = match mode {
            TxMode::Read => "BEGIN DEFERRED",
            TxMode::Write => "BEGIN IMMEDIATE",
        };
        conn.execute(statement, ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        Ok(Arc::new(TursoTransaction {
            conn,
            config: self.config.clone(),
            active: AtomicBool::new(true),
        }))
    }
}

/// One open libsql transaction
pub struct TursoTransaction {
    conn: libsql::Connection,
    config: Arc<TreeConfig>,
    active: AtomicBool,
}

impl Drop for TursoTransaction {
    fn drop(&mut self) {
        // Closing the connection rolls back anything uncommitted
        if self.active.load(Ordering::SeqCst) {
            tracing::warn!(
                "Transaction on '{}' dropped without commit or rollback",
                self.config.table
            );
        }
    }
}

impl TursoTransaction {
    fn ensure_active(&self) -> Result<(), DatabaseError> {
        if self.active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::TransactionClosed)
        }
    }

    async fn execute(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
        context: &str,
    ) -> Result<u64, DatabaseError> {
        self.ensure_active()?;
        tracing::trace!(sql, "execute");
        self.conn
            .execute(sql, Params::Positional(params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to {}: {}", context, e)))
    }

    async fn query(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
        context: &str,
    ) -> Result<libsql::Rows, DatabaseError> {
        self.ensure_active()?;
        tracing::trace!(sql, "query");
        self.conn
            .query(sql, Params::Positional(params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to {}: {}", context, e)))
    }

    fn table(&self) -> String {
        quote_ident(&self.config.table)
    }

    fn select_list(&self) -> String {
        let config = &self.config;
        let columns = &config.columns;
        let mut list = vec![
            quote_ident(&columns.id),
            quote_ident(&columns.parent),
            quote_ident(&columns.left),
            quote_ident(&columns.right),
            quote_ident(&columns.depth),
            quote_ident(&config.attributes_column),
            quote_ident(&config.updated_at_column),
            config
                .soft_delete_column
                .as_deref()
                .map(quote_ident)
                .unwrap_or_else(|| "NULL".to_string()),
        ];
        list.extend(config.scope_columns.iter().map(|c| quote_ident(c)));
        list.join(", ")
    }

    /// Convert a libsql row (see module docs for layout) to a `TreeNode`
    fn row_to_node(&self, row: &Row) -> Result<TreeNode, DatabaseError> {
        let decode = |field: &str, e: libsql::Error| {
            DatabaseError::row_decode(format!("Failed to get {}: {}", field, e))
        };

        let id: String = row.get(0).map_err(|e| decode("id", e))?;
        let mut node = TreeNode::with_id(id);
        node.parent_id = row.get(1).map_err(|e| decode("parent", e))?;
        node.left = row.get(2).map_err(|e| decode("left", e))?;
        node.right = row.get(3).map_err(|e| decode("right", e))?;
        node.depth = row.get(4).map_err(|e| decode("depth", e))?;

        let attributes: Option<String> = row.get(5).map_err(|e| decode("attributes", e))?;
        node.attributes = match attributes {
            Some(json) => serde_json::from_str::<Map<String, Value>>(&json).map_err(|e| {
                DatabaseError::row_decode(format!("Failed to parse attributes JSON: {}", e))
            })?,
            None => Map::new(),
        };

        let updated_at: Option<String> = row.get(6).map_err(|e| decode("updated_at", e))?;
        node.updated_at = updated_at.as_deref().map(parse_timestamp).transpose()?;
        let deleted_at: Option<String> = row.get(7).map_err(|e| decode("deleted_at", e))?;
        node.deleted_at = deleted_at.as_deref().map(parse_timestamp).transpose()?;

        for (offset, column) in self.config.scope_columns.iter().enumerate() {
            let value = row
                .get_value((FIXED_COLUMNS + offset) as i32)
                .map_err(|e| decode(column, e))?;
            node.scope.insert(column.clone(), from_sql_value(value));
        }

        node.mark_persisted();
        Ok(node)
    }
}

#[async_trait]
impl StoreTransaction for TursoTransaction {
    fn config(&self) -> &TreeConfig {
        &self.config
    }

    async fn select(&self, query: &NodeQuery) -> Result<Vec<TreeNode>, DatabaseError> {
        let mut sql = SqlBuilder::new(&self.config);
        let where_clause = sql.where_clause(query)?;
        let order_clause = sql.order_clause(query)?;
        let limit_clause = query
            .limit
            .map(|n| format!(" LIMIT {}", n))
            .unwrap_or_default();
        let statement = format!(
            "SELECT {} FROM {}{}{}{}",
            self.select_list(),
            self.table(),
            where_clause,
            order_clause,
            limit_clause
        );

        let mut rows = self.query(&statement, sql.params, "select nodes").await?;
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            nodes.push(self.row_to_node(&row)?);
        }
        Ok(nodes)
    }

    async fn count(&self, query: &NodeQuery) -> Result<u64, DatabaseError> {
        let mut sql = SqlBuilder::new(&self.config);
        let where_clause = sql.where_clause(query)?;
        let statement = format!("SELECT COUNT(*) FROM {}{}", self.table(), where_clause);

        let mut rows = self.query(&statement, sql.params, "count nodes").await?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .ok_or_else(|| DatabaseError::sql_execution("COUNT returned no row"))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::row_decode(e.to_string()))?;
        Ok(count as u64)
    }

    async fn lock(&self, query: &NodeQuery, mode: LockMode) -> Result<Vec<String>, DatabaseError> {
        let mut sql = SqlBuilder::new(&self.config);
        let where_clause = sql.where_clause(query)?;
        let order_clause = sql.order_clause(query)?;
        let limit_clause = query
            .limit
            .map(|n| format!(" LIMIT {}", n))
            .unwrap_or_default();
        let statement = format!(
            "SELECT {} FROM {}{}{}{}",
            quote_ident(&self.config.columns.id),
            self.table(),
            where_clause,
            order_clause,
            limit_clause
        );

        let mut rows = self.query(&statement, sql.params, "lock nodes").await?;
        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            ids.push(
                row.get::<String>(0)
                    .map_err(|e| DatabaseError::row_decode(e.to_string()))?,
            );
        }
        tracing::trace!(?mode, rows = ids.len(), "locked rows");
        Ok(ids)
    }

    async fn insert(&self, node: &TreeNode) -> Result<(), DatabaseError> {
        let config = &self.config;
        let columns = &config.columns;

        let mut names = vec![
            quote_ident(&columns.id),
            quote_ident(&columns.parent),
            quote_ident(&columns.left),
            quote_ident(&columns.right),
            quote_ident(&columns.depth),
            quote_ident(&config.attributes_column),
            quote_ident(&config.updated_at_column),
        ];
        let mut params = vec![
            libsql::Value::Text(node.id.clone()),
            optional_text(node.parent_id.clone()),
            optional_integer(node.left),
            optional_integer(node.right),
            libsql::Value::Integer(node.depth.unwrap_or(0)),
            libsql::Value::Text(attributes_json(node)?),
            optional_text(node.updated_at.map(|t| t.to_rfc3339())),
        ];
        if let Some(column) = &config.soft_delete_column {
            names.push(quote_ident(column));
            params.push(optional_text(node.deleted_at.map(|t| t.to_rfc3339())));
        }
        for column in &config.scope_columns {
            names.push(quote_ident(column));
            params.push(to_sql_value(
                node.scope.get(column).unwrap_or(&Value::Null),
            ));
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            placeholders
        );
        self.execute(&statement, params, "insert node").await?;
        Ok(())
    }

    async fn update_row(&self, node: &TreeNode) -> Result<u64, DatabaseError> {
        let config = &self.config;
        let assignments = vec![
            format!("{} = ?", quote_ident(&config.attributes_column)),
            format!("{} = ?", quote_ident(&config.updated_at_column)),
        ];
        let mut params = vec![
            libsql::Value::Text(attributes_json(node)?),
            optional_text(node.updated_at.map(|t| t.to_rfc3339())),
        ];
        params.push(libsql::Value::Text(node.id.clone()));

        // The soft-delete marker is owned by the delete and restore paths
        let mut statement = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table(),
            assignments.join(", "),
            quote_ident(&config.columns.id)
        );
        if let Some(column) = &config.soft_delete_column {
            statement.push_str(&format!(" AND {} IS NULL", quote_ident(column)));
        }
        self.execute(&statement, params, "update node").await
    }

    async fn assign(
        &self,
        query: &NodeQuery,
        values: &[(Column, Value)],
    ) -> Result<u64, DatabaseError> {
        if values.is_empty() {
            return Ok(0);
        }

        let mut sql = SqlBuilder::new(&self.config);
        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values {
            assignments.push(format!("{} = ?", sql.column(column)?));
            sql.params.push(to_sql_value(value));
        }
        let where_clause = sql.where_clause(query)?;

        let statement = format!(
            "UPDATE {} SET {}{}",
            self.table(),
            assignments.join(", "),
            where_clause
        );
        self.execute(&statement, sql.params, "assign columns").await
    }

    async fn increment(
        &self,
        query: &NodeQuery,
        column: Column,
        delta: i64,
    ) -> Result<u64, DatabaseError> {
        let mut sql = SqlBuilder::new(&self.config);
        let target = sql.column(&column)?;
        sql.params.push(libsql::Value::Integer(delta));
        let where_clause = sql.where_clause(query)?;

        let statement = format!(
            "UPDATE {} SET {} = {} + ?{}",
            self.table(),
            target,
            target,
            where_clause
        );
        self.execute(&statement, sql.params, "shift column").await
    }

    async fn reflect_bounds(&self, query: &NodeQuery, pivot: i64) -> Result<u64, DatabaseError> {
        let mut sql = SqlBuilder::new(&self.config);
        let left = quote_ident(&self.config.columns.left);
        let right = quote_ident(&self.config.columns.right);
        sql.params.push(libsql::Value::Integer(pivot));
        sql.params.push(libsql::Value::Integer(pivot));
        let where_clause = sql.where_clause(query)?;

        let statement = format!(
            "UPDATE {} SET {} = ? - {}, {} = ? - {}{}",
            self.table(),
            left,
            left,
            right,
            right,
            where_clause
        );
        self.execute(&statement, sql.params, "reflect bounds").await
    }

    async fn delete(&self, query: &NodeQuery) -> Result<u64, DatabaseError> {
        let mut sql = SqlBuilder::new(&self.config);
        let where_clause = sql.where_clause(query)?;
        let statement = format!("DELETE FROM {}{}", self.table(), where_clause);
        self.execute(&statement, sql.params, "delete nodes").await
    }

    async fn commit(&self) -> Result<(), DatabaseError> {
        self.ensure_active()?;
        self.active.store(false, Ordering::SeqCst);
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            let _rollback = self.conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DatabaseError> {
        self.ensure_active()?;
        self.active.store(false, Ordering::SeqCst);
        self.conn.execute("ROLLBACK", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to roll back transaction: {}", e))
        })?;
        Ok(())
    }
}

/// Renders `NodeQuery` pieces into SQL while collecting positional parameters
struct SqlBuilder<'c> {
    config: &'c TreeConfig,
    params: Vec<libsql::Value>,
}

impl<'c> SqlBuilder<'c> {
    fn new(config: &'c TreeConfig) -> Self {
        Self {
            config,
            params: Vec::new(),
        }
    }

    fn column(&self, column: &Column) -> Result<String, DatabaseError> {
        let config = self.config;
        let columns = &config.columns;
        Ok(match column {
            Column::Id => quote_ident(&columns.id),
            Column::Parent => quote_ident(&columns.parent),
            Column::Left => quote_ident(&columns.left),
            Column::Right => quote_ident(&columns.right),
            Column::Depth => quote_ident(&columns.depth),
            Column::Order => match &config.order {
                OrderKey::Left => quote_ident(&columns.left),
                OrderKey::Attribute(name) => format!(
                    "json_extract({}, '$.{}')",
                    quote_ident(&config.attributes_column),
                    name
                ),
            },
            Column::UpdatedAt => quote_ident(&config.updated_at_column),
            Column::DeletedAt => match &config.soft_delete_column {
                Some(name) => quote_ident(name),
                None => {
                    return Err(DatabaseError::sql_execution(
                        "soft deletes are not enabled for this table",
                    ))
                }
            },
            Column::Scope(name) => {
                if !config.scope_columns.contains(name) {
                    return Err(DatabaseError::sql_execution(format!(
                        "'{}' is not a scope column",
                        name
                    )));
                }
                quote_ident(name)
            }
        })
    }

    fn predicate(&mut self, predicate: &Predicate) -> Result<String, DatabaseError> {
        Ok(match predicate {
            Predicate::Compare {
                column,
                cmp,
                value: Value::Null,
            } if matches!(cmp, Cmp::Eq | Cmp::Ne) => {
                let keyword = if *cmp == Cmp::Eq { "IS NULL" } else { "IS NOT NULL" };
                format!("{} {}", self.column(column)?, keyword)
            }
            Predicate::Compare { column, cmp, value } => {
                let sql = format!("{} {} ?", self.column(column)?, cmp.as_sql());
                self.params.push(to_sql_value(value));
                sql
            }
            Predicate::IsNull(column) => format!("{} IS NULL", self.column(column)?),
            Predicate::NotNull(column) => format!("{} IS NOT NULL", self.column(column)?),
            Predicate::Between { column, low, high } => {
                let sql = format!("{} BETWEEN ? AND ?", self.column(column)?);
                self.params.push(libsql::Value::Integer(*low));
                self.params.push(libsql::Value::Integer(*high));
                sql
            }
            Predicate::Span { cmp, value } => {
                let columns = &self.config.columns;
                let sql = format!(
                    "({} - {}) {} ?",
                    quote_ident(&columns.right),
                    quote_ident(&columns.left),
                    cmp.as_sql()
                );
                self.params.push(libsql::Value::Integer(*value));
                sql
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // IN () is not valid SQLite
                    return Ok(if *negated { "1" } else { "0" }.to_string());
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                let sql = format!(
                    "{} {}IN ({})",
                    self.column(column)?,
                    if *negated { "NOT " } else { "" },
                    placeholders
                );
                self.params.extend(values.iter().map(to_sql_value));
                sql
            }
        })
    }

    fn where_clause(&mut self, query: &NodeQuery) -> Result<String, DatabaseError> {
        let mut terms = Vec::with_capacity(query.predicates.len() + 1);
        for predicate in &query.predicates {
            terms.push(self.predicate(predicate)?);
        }

        match (query.trashed, &self.config.soft_delete_column) {
            (Trashed::Exclude, Some(column)) => {
                terms.push(format!("{} IS NULL", quote_ident(column)))
            }
            (Trashed::Only, Some(column)) => {
                terms.push(format!("{} IS NOT NULL", quote_ident(column)))
            }
            (Trashed::Only, None) => terms.push("0".to_string()),
            _ => {}
        }

        if terms.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", terms.join(" AND ")))
        }
    }

    fn order_clause(&self, query: &NodeQuery) -> Result<String, DatabaseError> {
        if query.order.is_empty() {
            return Ok(String::new());
        }
        let mut keys = Vec::with_capacity(query.order.len());
        for (column, direction) in &query.order {
            let direction = match direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            keys.push(format!("{} {}", self.column(column)?, direction));
        }
        Ok(format!(" ORDER BY {}", keys.join(", ")))
    }
}

/// Parse timestamp from database - handles both SQLite and RFC3339 formats
///
/// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
/// Rows written by this crate use RFC3339: "YYYY-MM-DDTHH:MM:SS+00:00"
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    Err(DatabaseError::row_decode(format!(
        "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
        s
    )))
}

fn attributes_json(node: &TreeNode) -> Result<String, DatabaseError> {
    serde_json::to_string(&node.attributes).map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to serialize attributes: {}", e))
    })
}

fn optional_text(value: Option<String>) -> libsql::Value {
    value.map(libsql::Value::Text).unwrap_or(libsql::Value::Null)
}

fn optional_integer(value: Option<i64>) -> libsql::Value {
    value
        .map(libsql::Value::Integer)
        .unwrap_or(libsql::Value::Null)
}

fn to_sql_value(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Bool(b) => libsql::Value::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => libsql::Value::Integer(i),
            None => libsql::Value::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => libsql::Value::Text(s.clone()),
        other => libsql::Value::Text(other.to_string()),
    }
}

fn from_sql_value(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::from(i),
        libsql::Value::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        libsql::Value::Text(s) => Value::String(s),
        libsql::Value::Blob(bytes) => Value::from(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_clause_renders_null_comparisons() {
        let config = TreeConfig::default();
        let mut sql = SqlBuilder::new(&config);
        let query = NodeQuery::new()
            .eq(Column::Parent, Value::Null)
            .compare(Column::Left, Cmp::Gt, 4)
            .span(Cmp::Eq, 1);

        let clause = sql.where_clause(&query).unwrap();

        assert_eq!(
            clause,
            " WHERE \"parent_id\" IS NULL AND \"lft\" > ? AND (\"rgt\" - \"lft\") = ?"
        );
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn test_where_clause_excludes_trashed_rows() {
        let config = TreeConfig::default().with_soft_deletes("deleted_at");
        let mut sql = SqlBuilder::new(&config);

        let clause = sql.where_clause(&NodeQuery::new()).unwrap();
        assert_eq!(clause, " WHERE \"deleted_at\" IS NULL");

        let clause = sql.where_clause(&NodeQuery::new().with_trashed()).unwrap();
        assert_eq!(clause, "");

        let clause = sql.where_clause(&NodeQuery::new().only_trashed()).unwrap();
        assert_eq!(clause, " WHERE \"deleted_at\" IS NOT NULL");
    }

    #[test]
    fn test_empty_in_lists() {
        let config = TreeConfig::default();
        let mut sql = SqlBuilder::new(&config);
        let query = NodeQuery::new()
            .not_in(Column::Id, vec![])
            .in_list(Column::Id, vec![]);

        assert_eq!(sql.where_clause(&query).unwrap(), " WHERE 1 AND 0");
    }

    #[test]
    fn test_attribute_order_key() {
        let config = TreeConfig::default().with_order(OrderKey::Attribute("name".to_string()));
        let sql = SqlBuilder::new(&config);
        let query = NodeQuery::new()
            .order_by(Column::Order, Direction::Asc)
            .order_by(Column::Id, Direction::Desc);

        assert_eq!(
            sql.order_clause(&query).unwrap(),
            " ORDER BY json_extract(\"attributes\", '$.name') ASC, \"id\" DESC"
        );
    }

    #[test]
    fn test_unknown_scope_column_is_rejected() {
        let config = TreeConfig::default();
        let sql = SqlBuilder::new(&config);
        assert!(sql.column(&Column::Scope("tenant".to_string())).is_err());
        assert!(sql.column(&Column::DeletedAt).is_err());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(to_sql_value(&json!(3)), libsql::Value::Integer(3));
        assert_eq!(to_sql_value(&json!(true)), libsql::Value::Integer(1));
        assert_eq!(
            to_sql_value(&json!("a")),
            libsql::Value::Text("a".to_string())
        );
        assert_eq!(from_sql_value(libsql::Value::Integer(9)), json!(9));
        assert_eq!(from_sql_value(libsql::Value::Null), Value::Null);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2025-01-03 10:00:00").is_ok());
        assert!(parse_timestamp("2025-01-03T10:00:00+00:00").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}

//! Database Connection Management
//!
//! This module provides the database connection and schema initialization
//! for nested set tables using libsql/Turso.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid path
//! - **Config-driven schema**: Table and column names come from `TreeConfig`
//! - **WAL mode**: Write-Ahead Logging so readers do not block the writer
//! - **No parent foreign key**: Deletes are renumbered by the tree engine;
//!   a cascading foreign key would remove rows behind its back
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** The 5-second
//! busy timeout lets a structural write wait for a concurrent writer to
//! commit instead of failing immediately with `SQLITE_BUSY`.

use crate::config::TreeConfig;
use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Busy timeout applied to every connection
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database service for managing the libsql connection and tree schema
///
/// # Examples
///
/// ```no_run
/// use canopy_core::config::TreeConfig;
/// use canopy_core::db::DatabaseService;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new("/path/to/tree.db").await?;
///     db.initialize_tree_table(&TreeConfig::default()).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

/// Quote an identifier for SQLite
///
/// Identifiers are validated by `TreeConfig::validate()` before they get here.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

impl DatabaseService {
    /// Open (or create) the database file
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Enable WAL mode and the busy timeout
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the parent directory cannot be created or
    /// the connection fails.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        let conn = service.connect_with_timeout().await?;
        service
            .execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        tracing::debug!("Opened tree database at {:?}", service.db_path);
        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create the node table and its indexes for `config`
    ///
    /// Idempotent (CREATE ... IF NOT EXISTS), safe to call on every start.
    ///
    /// # Schema
    ///
    /// - id (TEXT PRIMARY KEY)
    /// - parent (TEXT, nullable)
    /// - left, right, depth (INTEGER)
    /// - attributes (JSON object, default `{}`)
    /// - updated_at (TEXT, RFC 3339)
    /// - soft-delete marker (TEXT, RFC 3339, only when enabled)
    /// - one untyped column per scope column
    pub async fn initialize_tree_table(&self, config: &TreeConfig) -> Result<(), DatabaseError> {
        config
            .validate()
            .map_err(|e| DatabaseError::initialization_failed(e.to_string()))?;

        let conn = self.connect_with_timeout().await?;
        let columns = &config.columns;

        let mut definitions = vec![
            format!("{} TEXT PRIMARY KEY", quote_ident(&columns.id)),
            format!("{} TEXT", quote_ident(&columns.parent)),
            format!("{} INTEGER", quote_ident(&columns.left)),
            format!("{} INTEGER", quote_ident(&columns.right)),
            format!("{} INTEGER NOT NULL DEFAULT 0", quote_ident(&columns.depth)),
            format!(
                "{} JSON NOT NULL DEFAULT '{{}}'",
                quote_ident(&config.attributes_column)
            ),
            format!("{} TEXT", quote_ident(&config.updated_at_column)),
        ];
        if let Some(column) = &config.soft_delete_column {
            definitions.push(format!("{} TEXT", quote_ident(column)));
        }
        for column in &config.scope_columns {
            definitions.push(quote_ident(column));
        }

        let table = quote_ident(&config.table);
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                table,
                definitions.join(", ")
            ),
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create table '{}': {}",
                config.table, e
            ))
        })?;

        let scope_prefix: String = config
            .scope_columns
            .iter()
            .map(|c| format!("{}, ", quote_ident(c)))
            .collect();

        let indexes = [
            ("parent", quote_ident(&columns.parent)),
            (
                "left",
                format!("{}{}", scope_prefix, quote_ident(&columns.left)),
            ),
            (
                "right",
                format!("{}{}", scope_prefix, quote_ident(&columns.right)),
            ),
        ];

        for (suffix, index_columns) in indexes {
            let name = format!("idx_{}_{}", config.table, suffix);
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                    quote_ident(&name),
                    table,
                    index_columns
                ),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        tracing::info!("Initialized nested set table '{}'", config.table);
        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// **⚠️ WARNING**: Only use this in synchronous, single-threaded contexts.
    /// In async functions use `connect_with_timeout()` instead.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// **✅ RECOMMENDED**: Use this for all async functions.
    ///
    /// Sets a 5-second busy timeout so a transaction that needs the write
    /// lock waits for the current writer instead of failing immediately.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
            .await?;

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_parent_directory_and_table() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("tree.db");

        let db = DatabaseService::new(&db_path).await.unwrap();
        let config = TreeConfig::new("menus").with_scope(["menu_id"]).with_soft_deletes("deleted_at");
        db.initialize_tree_table(&config).await.unwrap();
        // Second call is a no-op
        db.initialize_tree_table(&config).await.unwrap();

        assert!(db_path.exists());

        let conn = db.connect_with_timeout().await.unwrap();
        let mut rows = conn
            .query(
                "SELECT name FROM pragma_table_info('menus') ORDER BY cid",
                (),
            )
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(0).unwrap());
        }

        assert_eq!(
            names,
            vec![
                "id",
                "parent_id",
                "lft",
                "rgt",
                "depth",
                "attributes",
                "updated_at",
                "deleted_at",
                "menu_id"
            ]
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(temp_dir.path().join("tree.db"))
            .await
            .unwrap();

        let result = db.initialize_tree_table(&TreeConfig::new("bad name")).await;
        assert!(matches!(
            result,
            Err(DatabaseError::InitializationFailed(_))
        ));
    }
}

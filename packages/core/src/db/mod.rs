//! Database Layer
//!
//! This module handles all database interactions using libsql/Turso:
//!
//! - Database initialization and connection management
//! - Config-driven nested set table schema
//! - Backend-neutral node queries (`NodeQuery`)
//! - Transactional storage trait consumed by the tree engine
//!
//! # Architecture
//!
//! The tree engine only depends on the `TreeStore` / `StoreTransaction`
//! traits. `TursoStore` is the embedded libsql implementation; it renders
//! `NodeQuery` values into SQL against the table described by `TreeConfig`.

mod database;
mod error;
pub mod query;
pub mod tree_store;
mod turso_store;

pub use database::DatabaseService;
pub(crate) use database::quote_ident;
pub use error::DatabaseError;
pub use query::{Cmp, Column, Direction, NodeQuery, Predicate, Trashed};
pub use tree_store::{LockMode, SharedTransaction, StoreTransaction, TreeStore, TxMode};
pub use turso_store::{TursoStore, TursoTransaction};

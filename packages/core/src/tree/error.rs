//! Tree Engine Error Types
//!
//! Errors surfaced by the mutation engine, rebuild engine, mapper and
//! validator. Storage failures are wrapped from the db layer so callers only
//! match on one enum.

use crate::db::DatabaseError;
use thiserror::Error;

/// Tree operation errors
#[derive(Error, Debug)]
pub enum TreeError {
    /// Move target is inside the moved subtree, unknown, or in another scope
    #[error("Invalid move of node {node_id}: {reason}")]
    InvalidMove { node_id: String, reason: String },

    /// A value read for an offset computation no longer matched at write time
    #[error("Stale tree state: {context}")]
    StaleState { context: String },

    /// Underlying store failure (transaction rolled back)
    #[error("Storage failure: {0}")]
    Storage(#[from] DatabaseError),

    /// Invariant validator found a broken scope
    #[error("Nested set validation failed: {0}")]
    ValidationFailed(String),

    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Persisted node's scope values changed
    #[error("Node {node_id} cannot change scope")]
    ScopeChange { node_id: String },

    /// Configuration rejected
    #[error("Invalid tree configuration: {0}")]
    InvalidConfig(String),

    /// Mapper document is malformed
    #[error("Invalid tree document: {0}")]
    InvalidDocument(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TreeError {
    /// Create an invalid move error
    pub fn invalid_move(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a stale state error
    pub fn stale(context: impl Into<String>) -> Self {
        Self::StaleState {
            context: context.into(),
        }
    }

    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid document error
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Whether retrying the whole transaction may succeed
    ///
    /// Busy/locked storage errors are reported by SQLite when another writer
    /// holds the reserved lock past the busy timeout; they are treated the
    /// same as a stale read.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StaleState { .. } => true,
            Self::Storage(e) => e.is_busy(),
            _ => false,
        }
    }
}

//! Nested Set Tree Engine
//!
//! - [`traversal`]: query builders and read helpers derived from intervals
//! - [`movement`]: move positions and the pure move arithmetic
//! - [`mutation`]: insert, move, delete and restore algorithms
//! - [`rebuild`]: reconstruction of the numbering from parent links
//! - [`mapper`]: bulk application of nested documents
//! - [`validator`]: read-only invariant check
//! - [`retry`]: transaction scoping and bounded retry

mod error;
pub mod mapper;
pub mod movement;
pub mod mutation;
pub mod rebuild;
pub mod retry;
pub mod traversal;
pub mod validator;

pub use error::TreeError;
pub use mapper::{MapSummary, TreeMapper};
pub use movement::{MovePlan, Position};
pub use mutation::{MutationEngine, ParentChange};
pub use rebuild::{RebuildEngine, RebuildSummary};
pub use retry::TxScope;
pub use validator::{ValidationIssue, ValidationReport, Validator};

//! Data Models
//!
//! This module contains the data structures the tree engine operates on:
//!
//! - `TreeNode` - In-memory image of one nested set row
//! - `NodeEntry` - Parsed entry of a bulk mapping document
//!
//! Non-structural fields use the Pure JSON approach: they live in the
//! `attributes` column as a JSON object.

pub mod document;
pub mod node;

pub use document::NodeEntry;
pub use node::{key_from_value, FillMode, Scope, TreeNode};

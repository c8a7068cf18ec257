//! Services
//!
//! - `TreeService` - repository operations over a nested set table: row
//!   persistence with the tree lifecycle wired in, reads, bulk mapping,
//!   rebuild and validation
//!
//! Services coordinate between the database layer and the tree engine.

pub mod tree_service;

pub use tree_service::TreeService;

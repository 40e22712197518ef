//! Storage layer
//!
//! The document store contract plus its two backends.
//!
//! ## Architecture
//!
//! - **adapter**: the `DocumentStore` trait every service depends on
//! - **query**: filters and single-document updates
//! - **memory**: lock-guarded in-process store
//! - **sqlite**: one JSON document per row, persisted on disk
//!
//! No operation spans more than one document atomically.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod query;
pub mod schema;
pub mod sqlite;

pub use adapter::DocumentStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{
    AccountFilter, AccountUpdate, CollectionFilter, CollectionUpdate, NoteFilter, NoteUpdate,
    SnapshotMatch,
};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteStore;

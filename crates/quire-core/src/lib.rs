//! Quire Core Library
//!
//! Backend core for a personal note and collection app with per-account
//! sharing and a friend graph.
//!
//! # Architecture
//!
//! The store guarantees atomicity for one document at a time and nothing
//! more. Everything that must keep several documents consistent is written
//! as a sequence of idempotent single-document steps:
//!
//! - **Relationships**: pending and established edges mirrored on both accounts
//! - **Access cascade**: grants between two accounts removed when they part
//! - **Propagation**: note edits copied into the snapshots inside collections
//! - **Position check**: whether a rename moves an entry in the listing
//!
//! # Quick Start
//!
//! ```text
//! let quire = Quire::in_memory();
//! let alice = quire.accounts().create_account("alice")?;
//! let bob = quire.accounts().create_account("bob")?;
//!
//! quire.relationships().request(alice.id, bob.id)?;
//! quire.relationships().decide(bob.id, alice.id, true)?;
//! ```
//!
//! # Modules
//!
//! - `quire`: Facade over a store (main entry point)
//! - `models`: Accounts, notes, collections and snapshots
//! - `storage`: Document store contract, in-memory and SQLite backends
//! - `service`: Account, relationship, note and collection operations
//! - `access`: Sharing and the access-rights cascade
//! - `propagate`: Snapshot synchronization
//! - `listing`: Combined listing and rename position check
//! - `config`: Application configuration

pub mod access;
pub mod config;
pub mod error;
pub mod listing;
pub mod models;
pub mod propagate;
pub mod quire;
pub mod service;
pub mod storage;

pub use access::{revoke_between, CascadeReport, SharingService};
pub use config::Config;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use listing::{position_changed, DisplayFilter, ListingEntry};
pub use models::{
    AccessRight, Account, AccountId, AccountSummary, Collection, CollectionFields, CollectionId,
    Note, NoteFields, NoteId, RelationState, RelationshipEntry, RoleSet, Snapshot,
};
pub use propagate::{propagate_delete, propagate_update, PropagationReport};
pub use quire::Quire;
pub use service::{
    AccountDeleteOutcome, AccountService, CollectionService, CollectionUpdateOutcome,
    DecideOutcome, DissolveOutcome, NoteDeleteOutcome, NoteService, NoteUpdateOutcome,
    RelationshipService, RequestOutcome,
};
pub use storage::{DocumentStore, MemoryStore, SqliteStore, StoreError};

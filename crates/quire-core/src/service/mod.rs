//! Services over a [`DocumentStore`](crate::storage::DocumentStore)
//!
//! Each service borrows the store and keeps no state of its own, so they
//! are cheap to build per call.

pub mod accounts;
pub mod collections;
pub mod notes;
pub mod relationship;

pub use accounts::{AccountDeleteOutcome, AccountService};
pub use collections::{CollectionService, CollectionUpdateOutcome};
pub use notes::{NoteDeleteOutcome, NoteService, NoteUpdateOutcome};
pub use relationship::{DecideOutcome, DissolveOutcome, RelationshipService, RequestOutcome};

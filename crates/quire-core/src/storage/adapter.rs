//! The document store contract
//!
//! Every service in this crate talks to storage through [`DocumentStore`].
//! The contract is deliberately narrow: each call touches documents of one
//! entity type, and only single-document updates are atomic. Nothing here
//! offers a transaction across documents.

use crate::models::{Account, AccountId, AccountSummary, Collection, Note};
use crate::storage::error::StoreResult;
use crate::storage::query::{
    AccountFilter, AccountUpdate, CollectionFilter, CollectionUpdate, NoteFilter, NoteUpdate,
};

/// Per-entity document storage with per-document atomicity
///
/// `update_*` re-checks the filter and applies the update to the first
/// matching document as one atomic step, returning the stored result, or
/// `None` when nothing matched. `delete_*` removes every match and returns
/// the removed documents. Lists come back in insertion order.
pub trait DocumentStore: Send + Sync {
    fn find_account(&self, filter: &AccountFilter) -> StoreResult<Option<Account>>;
    fn find_accounts(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>>;
    fn create_account(&self, account: &Account) -> StoreResult<()>;
    fn update_account(
        &self,
        filter: &AccountFilter,
        update: AccountUpdate,
    ) -> StoreResult<Option<Account>>;
    fn delete_account(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>>;

    fn find_note(&self, filter: &NoteFilter) -> StoreResult<Option<Note>>;
    fn find_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>>;
    fn create_note(&self, note: &Note) -> StoreResult<()>;
    fn update_note(&self, filter: &NoteFilter, update: NoteUpdate) -> StoreResult<Option<Note>>;
    fn delete_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>>;

    fn find_collection(&self, filter: &CollectionFilter) -> StoreResult<Option<Collection>>;
    fn find_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>>;
    fn create_collection(&self, collection: &Collection) -> StoreResult<()>;
    fn update_collection(
        &self,
        filter: &CollectionFilter,
        update: CollectionUpdate,
    ) -> StoreResult<Option<Collection>>;
    fn delete_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>>;

    /// Dereference account ids, preserving order and skipping ids that no
    /// longer resolve
    fn populate_accounts(&self, ids: &[AccountId]) -> StoreResult<Vec<AccountSummary>> {
        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(account) = self.find_account(&AccountFilter::id(*id))? {
                summaries.push(account.summary());
            }
        }
        Ok(summaries)
    }
}

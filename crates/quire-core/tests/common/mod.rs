//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use quire_core::models::{Account, AccountSummary, Collection, Note};
use quire_core::storage::{
    AccountFilter, AccountUpdate, CollectionFilter, CollectionUpdate, DocumentStore, MemoryStore,
    NoteFilter, NoteUpdate, StoreError, StoreResult,
};
use quire_core::{AccountId, Quire};

/// Create accounts with the given usernames
pub fn accounts(quire: &Quire, names: &[&str]) -> Vec<Account> {
    names
        .iter()
        .map(|name| quire.accounts().create_account(name).unwrap())
        .collect()
}

pub fn reload(store: &dyn DocumentStore, id: AccountId) -> Account {
    store.find_account(&AccountFilter::id(id)).unwrap().unwrap()
}

/// Memory store that starts failing collection updates after a budget
/// of successful ones is spent
pub struct FailingStore {
    inner: MemoryStore,
    collection_updates_left: AtomicUsize,
}

impl FailingStore {
    pub fn new(collection_updates: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            collection_updates_left: AtomicUsize::new(collection_updates),
        }
    }

    pub fn allow_collection_updates(&self, count: usize) {
        self.collection_updates_left.store(count, Ordering::SeqCst);
    }
}

impl DocumentStore for FailingStore {
    fn find_account(&self, filter: &AccountFilter) -> StoreResult<Option<Account>> {
        self.inner.find_account(filter)
    }

    fn find_accounts(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>> {
        self.inner.find_accounts(filter)
    }

    fn create_account(&self, account: &Account) -> StoreResult<()> {
        self.inner.create_account(account)
    }

    fn update_account(
        &self,
        filter: &AccountFilter,
        update: AccountUpdate,
    ) -> StoreResult<Option<Account>> {
        self.inner.update_account(filter, update)
    }

    fn delete_account(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>> {
        self.inner.delete_account(filter)
    }

    fn find_note(&self, filter: &NoteFilter) -> StoreResult<Option<Note>> {
        self.inner.find_note(filter)
    }

    fn find_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>> {
        self.inner.find_notes(filter)
    }

    fn create_note(&self, note: &Note) -> StoreResult<()> {
        self.inner.create_note(note)
    }

    fn update_note(&self, filter: &NoteFilter, update: NoteUpdate) -> StoreResult<Option<Note>> {
        self.inner.update_note(filter, update)
    }

    fn delete_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>> {
        self.inner.delete_notes(filter)
    }

    fn find_collection(&self, filter: &CollectionFilter) -> StoreResult<Option<Collection>> {
        self.inner.find_collection(filter)
    }

    fn find_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>> {
        self.inner.find_collections(filter)
    }

    fn create_collection(&self, collection: &Collection) -> StoreResult<()> {
        self.inner.create_collection(collection)
    }

    fn update_collection(
        &self,
        filter: &CollectionFilter,
        update: CollectionUpdate,
    ) -> StoreResult<Option<Collection>> {
        let spent = self.collection_updates_left.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |left| left.checked_sub(1),
        );
        if spent.is_err() {
            return Err(StoreError::Unavailable("injected fault".to_string()));
        }
        self.inner.update_collection(filter, update)
    }

    fn delete_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>> {
        self.inner.delete_collections(filter)
    }

    fn populate_accounts(&self, ids: &[AccountId]) -> StoreResult<Vec<AccountSummary>> {
        self.inner.populate_accounts(ids)
    }
}

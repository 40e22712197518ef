//! In-memory document store
//!
//! Keeps each entity type in its own lock-guarded vector. Used by tests and
//! by callers that do not need persistence.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{titles_equal, Account, Collection, Note};
use crate::storage::adapter::DocumentStore;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::query::{
    AccountFilter, AccountUpdate, CollectionFilter, CollectionUpdate, NoteFilter, NoteUpdate,
};

/// Document store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<Vec<Account>>,
    notes: RwLock<Vec<Note>>,
    collections: RwLock<Vec<Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

/// Remove and return every element matching `pred`, keeping the rest in order
fn drain_matching<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> Vec<T> {
    let mut removed = Vec::new();
    let mut kept = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if pred(&item) {
            removed.push(item);
        } else {
            kept.push(item);
        }
    }
    *items = kept;
    removed
}

impl DocumentStore for MemoryStore {
    fn find_account(&self, filter: &AccountFilter) -> StoreResult<Option<Account>> {
        Ok(read(&self.accounts)?
            .iter()
            .find(|a| filter.matches(a))
            .cloned())
    }

    fn find_accounts(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>> {
        Ok(read(&self.accounts)?
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    fn create_account(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = write(&self.accounts)?;
        if accounts
            .iter()
            .any(|a| a.id == account.id || titles_equal(&a.username, &account.username))
        {
            return Err(StoreError::Duplicate {
                entity: "account",
                key: account.username.clone(),
            });
        }
        accounts.push(account.clone());
        Ok(())
    }

    fn update_account(
        &self,
        filter: &AccountFilter,
        update: AccountUpdate,
    ) -> StoreResult<Option<Account>> {
        let mut accounts = write(&self.accounts)?;
        Ok(accounts.iter_mut().find(|a| filter.matches(a)).map(|a| {
            update.apply(a);
            a.clone()
        }))
    }

    fn delete_account(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>> {
        let mut accounts = write(&self.accounts)?;
        Ok(drain_matching(&mut accounts, |a| filter.matches(a)))
    }

    fn find_note(&self, filter: &NoteFilter) -> StoreResult<Option<Note>> {
        Ok(read(&self.notes)?.iter().find(|n| filter.matches(n)).cloned())
    }

    fn find_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>> {
        Ok(read(&self.notes)?
            .iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect())
    }

    fn create_note(&self, note: &Note) -> StoreResult<()> {
        let mut notes = write(&self.notes)?;
        if notes.iter().any(|n| {
            n.id == note.id || (n.owner == note.owner && titles_equal(n.title(), note.title()))
        }) {
            return Err(StoreError::Duplicate {
                entity: "note",
                key: note.title().to_string(),
            });
        }
        notes.push(note.clone());
        Ok(())
    }

    fn update_note(&self, filter: &NoteFilter, update: NoteUpdate) -> StoreResult<Option<Note>> {
        let mut notes = write(&self.notes)?;
        let Some(index) = notes.iter().position(|n| filter.matches(n)) else {
            return Ok(None);
        };
        if let NoteUpdate::Replace(fields) = &update {
            let target = &notes[index];
            if notes.iter().any(|n| {
                n.id != target.id && n.owner == target.owner && titles_equal(n.title(), &fields.title)
            }) {
                return Err(StoreError::Duplicate {
                    entity: "note",
                    key: fields.title.clone(),
                });
            }
        }
        update.apply(&mut notes[index]);
        Ok(Some(notes[index].clone()))
    }

    fn delete_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>> {
        let mut notes = write(&self.notes)?;
        Ok(drain_matching(&mut notes, |n| filter.matches(n)))
    }

    fn find_collection(&self, filter: &CollectionFilter) -> StoreResult<Option<Collection>> {
        Ok(read(&self.collections)?
            .iter()
            .find(|c| filter.matches(c))
            .cloned())
    }

    fn find_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>> {
        Ok(read(&self.collections)?
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    fn create_collection(&self, collection: &Collection) -> StoreResult<()> {
        let mut collections = write(&self.collections)?;
        if collections.iter().any(|c| {
            c.id == collection.id
                || (c.owner == collection.owner && titles_equal(c.title(), collection.title()))
        }) {
            return Err(StoreError::Duplicate {
                entity: "collection",
                key: collection.title().to_string(),
            });
        }
        collections.push(collection.clone());
        Ok(())
    }

    fn update_collection(
        &self,
        filter: &CollectionFilter,
        update: CollectionUpdate,
    ) -> StoreResult<Option<Collection>> {
        let mut collections = write(&self.collections)?;
        let Some(index) = collections.iter().position(|c| filter.matches(c)) else {
            return Ok(None);
        };
        if let CollectionUpdate::Replace { fields, .. } = &update {
            let target = &collections[index];
            if collections.iter().any(|c| {
                c.id != target.id
                    && c.owner == target.owner
                    && titles_equal(c.title(), &fields.title)
            }) {
                return Err(StoreError::Duplicate {
                    entity: "collection",
                    key: fields.title.clone(),
                });
            }
        }
        update.apply(&mut collections[index]);
        Ok(Some(collections[index].clone()))
    }

    fn delete_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>> {
        let mut collections = write(&self.collections)?;
        Ok(drain_matching(&mut collections, |c| filter.matches(c)))
    }
}

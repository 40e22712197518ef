//! Account registration and removal
//!
//! Credentials live outside this crate; an account here is only an id, a
//! username and its place in the friend graph.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::models::{normalize_title, Account, AccountId, RoleSet};
use crate::storage::{
    AccountFilter, AccountUpdate, CollectionFilter, CollectionUpdate, DocumentStore, NoteFilter,
    NoteUpdate,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDeleteOutcome {
    pub account: Account,
    /// Other accounts whose role sets referenced the deleted one
    pub counterparts_updated: usize,
    pub grants_revoked: usize,
    pub notes_deleted: usize,
    pub collections_deleted: usize,
}

pub struct AccountService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> AccountService<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Validate a username and check it is free, returning it normalized
    pub fn check_username(&self, username: &str) -> CoreResult<String> {
        let username = normalize_title(username);
        if username.is_empty() {
            return Err(CoreError::Validation("a username is required".to_string()));
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(CoreError::Validation(format!(
                "username '{username}' may only contain letters, digits, '_', '-' and '.'"
            )));
        }
        if self
            .store
            .find_account(&AccountFilter::username(&username))?
            .is_some()
        {
            return Err(CoreError::Conflict(format!(
                "username '{username}' is already taken"
            )));
        }
        Ok(username)
    }

    pub fn create_account(&self, username: &str) -> CoreResult<Account> {
        let username = self.check_username(username)?;
        let account = Account::new(username);
        self.store.create_account(&account)?;
        info!(username = %account.username, id = %account.id, "Created account");
        Ok(account)
    }

    pub fn get(&self, id: AccountId) -> CoreResult<Account> {
        self.store
            .find_account(&AccountFilter::id(id))?
            .ok_or(CoreError::IdentityNotFound(id))
    }

    pub fn find_by_username(&self, username: &str) -> CoreResult<Account> {
        self.store
            .find_account(&AccountFilter::username(username))?
            .ok_or_else(|| {
                CoreError::NotFound(format!("no account named '{}'", normalize_title(username)))
            })
    }

    /// Remove an account together with everything that points at it
    ///
    /// Order: role-set entries on other accounts, grants to the account on
    /// other owners' entities, the account's own notes and collections, and
    /// finally the account itself. Until that last step a rerun finds the
    /// account again and resumes.
    pub fn delete_account(&self, id: AccountId) -> CoreResult<AccountDeleteOutcome> {
        let account = self.get(id)?;
        let mut completed = 0;

        // Counterparts listed on the account, plus any that reference it
        // without a mirrored entry
        let mut counterparts = account.counterparts();
        for role in RoleSet::ALL {
            for other in self
                .store
                .find_accounts(&AccountFilter::default().holding(role, id))?
            {
                if !counterparts.contains(&other.id) {
                    counterparts.push(other.id);
                }
            }
        }

        let mut counterparts_updated = 0;
        for other in &counterparts {
            let mut touched = false;
            for role in RoleSet::ALL {
                let updated = self
                    .store
                    .update_account(
                        &AccountFilter::id(*other).holding(role, id),
                        AccountUpdate::Pull(role, id),
                    )
                    .map_err(|e| CoreError::from(e).after(completed))?;
                if updated.is_some() {
                    completed += 1;
                    touched = true;
                }
            }
            if touched {
                counterparts_updated += 1;
                debug!(account = %other, removed = %id, "Dropped relationship entries");
            }
        }

        let mut grants_revoked = 0;
        let shared_notes = self
            .store
            .find_notes(&NoteFilter::default().shared_with(id))
            .map_err(|e| CoreError::from(e).after(completed))?;
        for note in shared_notes.iter().filter(|n| n.owner != id) {
            if self
                .store
                .update_note(&NoteFilter::id(note.id), NoteUpdate::PullAccess(id))
                .map_err(|e| CoreError::from(e).after(completed))?
                .is_some()
            {
                completed += 1;
                grants_revoked += 1;
            }
        }
        let shared_collections = self
            .store
            .find_collections(&CollectionFilter::default().shared_with(id))
            .map_err(|e| CoreError::from(e).after(completed))?;
        for collection in shared_collections.iter().filter(|c| c.owner != id) {
            if self
                .store
                .update_collection(
                    &CollectionFilter::id(collection.id),
                    CollectionUpdate::PullAccess(id),
                )
                .map_err(|e| CoreError::from(e).after(completed))?
                .is_some()
            {
                completed += 1;
                grants_revoked += 1;
            }
        }

        let notes_deleted = self
            .store
            .delete_notes(&NoteFilter::owned_by(id))
            .map_err(|e| CoreError::from(e).after(completed))?
            .len();
        completed += notes_deleted;

        let collections_deleted = self
            .store
            .delete_collections(&CollectionFilter::owned_by(id))
            .map_err(|e| CoreError::from(e).after(completed))?
            .len();
        completed += collections_deleted;

        self.store
            .delete_account(&AccountFilter::id(id))
            .map_err(|e| CoreError::from(e).after(completed))?;

        info!(
            username = %account.username,
            notes = notes_deleted,
            collections = collections_deleted,
            "Deleted account"
        );
        Ok(AccountDeleteOutcome {
            account,
            counterparts_updated,
            grants_revoked,
            notes_deleted,
            collections_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::SharingService;
    use crate::models::{CollectionFields, NoteFields};
    use crate::service::{CollectionService, NoteService, RelationshipService};
    use crate::storage::MemoryStore;

    #[test]
    fn test_create_account_normalizes_username() {
        let store = MemoryStore::new();
        let accounts = AccountService::new(&store);

        let account = accounts.create_account("  Alice ").unwrap();
        assert_eq!(account.username, "alice");
        assert_eq!(accounts.find_by_username("ALICE").unwrap().id, account.id);
    }

    #[test]
    fn test_username_rules() {
        let store = MemoryStore::new();
        let accounts = AccountService::new(&store);
        accounts.create_account("alice").unwrap();

        assert!(matches!(
            accounts.check_username("Alice"),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            accounts.check_username("two words"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            accounts.check_username(""),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(accounts.check_username("bob.b").unwrap(), "bob.b");
    }

    #[test]
    fn test_delete_account_cleans_references() {
        let store = MemoryStore::new();
        let accounts = AccountService::new(&store);
        let relationships = RelationshipService::new(&store);
        let notes = NoteService::new(&store);
        let collections = CollectionService::new(&store);
        let sharing = SharingService::new(&store);

        let alice = accounts.create_account("alice").unwrap();
        let bob = accounts.create_account("bob").unwrap();
        let carol = accounts.create_account("carol").unwrap();

        relationships.request(alice.id, bob.id).unwrap();
        relationships.decide(bob.id, alice.id, true).unwrap();
        relationships.request(alice.id, carol.id).unwrap();

        notes
            .create_note(alice.id, NoteFields::new("mine", "x"))
            .unwrap();
        collections
            .create_collection(alice.id, CollectionFields::new("folder"), &["mine".to_string()])
            .unwrap();
        notes
            .create_note(bob.id, NoteFields::new("bobs", "y"))
            .unwrap();
        sharing.share_note(bob.id, "bobs", alice.id).unwrap();

        let outcome = accounts.delete_account(alice.id).unwrap();
        assert_eq!(outcome.counterparts_updated, 2);
        assert_eq!(outcome.grants_revoked, 1);
        assert_eq!(outcome.notes_deleted, 1);
        assert_eq!(outcome.collections_deleted, 1);

        assert!(matches!(
            accounts.get(alice.id),
            Err(CoreError::IdentityNotFound(_))
        ));
        let bob = accounts.get(bob.id).unwrap();
        assert!(bob.counterparts().is_empty());
        let carol = accounts.get(carol.id).unwrap();
        assert!(carol.counterparts().is_empty());
        assert!(notes.get_note(bob.id, "bobs").unwrap().access_rights.is_empty());
    }
}

//! Access rights on notes and collections
//!
//! Owners grant friends access one entity at a time. Grants only ever point
//! at established friends; when a friendship ends, [`revoke_between`] strips
//! every grant either side gave the other.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::models::{AccessRight, Account, AccountId, Collection, Note, RoleSet};
use crate::storage::{
    AccountFilter, CollectionFilter, CollectionUpdate, DocumentStore, NoteFilter, NoteUpdate,
};

/// Entities that lost a grant during a cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub notes_updated: usize,
    pub collections_updated: usize,
}

impl CascadeReport {
    pub fn total(&self) -> usize {
        self.notes_updated + self.collections_updated
    }
}

/// Remove every grant that `a` gave `b` and that `b` gave `a`
///
/// Runs one write per affected entity. A failure stops the sweep; entities
/// already cleaned stay cleaned and a rerun picks up the rest.
pub fn revoke_between(
    store: &dyn DocumentStore,
    a: AccountId,
    b: AccountId,
) -> CoreResult<CascadeReport> {
    let mut report = CascadeReport::default();

    for (owner, grantee) in [(a, b), (b, a)] {
        let notes = store
            .find_notes(&NoteFilter::owned_by(owner).shared_with(grantee))
            .map_err(|e| CoreError::from(e).after(report.total()))?;
        for note in notes {
            let updated = store
                .update_note(
                    &NoteFilter::id(note.id).shared_with(grantee),
                    NoteUpdate::PullAccess(grantee),
                )
                .map_err(|e| CoreError::from(e).after(report.total()))?;
            if updated.is_some() {
                report.notes_updated += 1;
                debug!(note = %note.id, %grantee, "Revoked note access");
            }
        }

        let collections = store
            .find_collections(&CollectionFilter::owned_by(owner).shared_with(grantee))
            .map_err(|e| CoreError::from(e).after(report.total()))?;
        for collection in collections {
            let updated = store
                .update_collection(
                    &CollectionFilter::id(collection.id).shared_with(grantee),
                    CollectionUpdate::PullAccess(grantee),
                )
                .map_err(|e| CoreError::from(e).after(report.total()))?;
            if updated.is_some() {
                report.collections_updated += 1;
                debug!(collection = %collection.id, %grantee, "Revoked collection access");
            }
        }
    }

    Ok(report)
}

/// Grants and revokes access to single entities
pub struct SharingService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> SharingService<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    fn load(&self, id: AccountId) -> CoreResult<Account> {
        self.store
            .find_account(&AccountFilter::id(id))?
            .ok_or(CoreError::IdentityNotFound(id))
    }

    fn require_friends(&self, owner: AccountId, grantee: AccountId) -> CoreResult<()> {
        if owner == grantee {
            return Err(CoreError::SelfReference);
        }
        let owner = self.load(owner)?;
        let grantee = self.load(grantee)?;
        if owner.holds(RoleSet::Established, grantee.id)
            && grantee.holds(RoleSet::Established, owner.id)
        {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "'{}' is not a friend of '{}'",
                grantee.username, owner.username
            )))
        }
    }

    fn owned_note(&self, owner: AccountId, title: &str) -> CoreResult<Note> {
        self.store
            .find_note(&NoteFilter::owned_by(owner).titled(title))?
            .ok_or_else(|| CoreError::NotFound(format!("note '{}'", title.trim())))
    }

    fn owned_collection(&self, owner: AccountId, title: &str) -> CoreResult<Collection> {
        self.store
            .find_collection(&CollectionFilter::owned_by(owner).titled(title))?
            .ok_or_else(|| CoreError::NotFound(format!("collection '{}'", title.trim())))
    }

    pub fn share_note(&self, owner: AccountId, title: &str, grantee: AccountId) -> CoreResult<Note> {
        self.require_friends(owner, grantee)?;
        let note = self.owned_note(owner, title)?;
        let right = AccessRight {
            grantee,
            entity: note.id,
        };
        let note = self
            .store
            .update_note(&NoteFilter::id(note.id), NoteUpdate::PushAccess(right))?
            .ok_or_else(|| CoreError::NotFound(format!("note '{}'", title.trim())))?;
        info!(note = %note.title(), %grantee, "Shared note");
        Ok(note)
    }

    pub fn unshare_note(
        &self,
        owner: AccountId,
        title: &str,
        grantee: AccountId,
    ) -> CoreResult<Note> {
        let note = self.owned_note(owner, title)?;
        let note = self
            .store
            .update_note(&NoteFilter::id(note.id), NoteUpdate::PullAccess(grantee))?
            .ok_or_else(|| CoreError::NotFound(format!("note '{}'", title.trim())))?;
        info!(note = %note.title(), %grantee, "Unshared note");
        Ok(note)
    }

    pub fn share_collection(
        &self,
        owner: AccountId,
        title: &str,
        grantee: AccountId,
    ) -> CoreResult<Collection> {
        self.require_friends(owner, grantee)?;
        let collection = self.owned_collection(owner, title)?;
        let right = AccessRight {
            grantee,
            entity: collection.id,
        };
        let collection = self
            .store
            .update_collection(
                &CollectionFilter::id(collection.id),
                CollectionUpdate::PushAccess(right),
            )?
            .ok_or_else(|| CoreError::NotFound(format!("collection '{}'", title.trim())))?;
        info!(collection = %collection.title(), %grantee, "Shared collection");
        Ok(collection)
    }

    pub fn unshare_collection(
        &self,
        owner: AccountId,
        title: &str,
        grantee: AccountId,
    ) -> CoreResult<Collection> {
        let collection = self.owned_collection(owner, title)?;
        let collection = self
            .store
            .update_collection(
                &CollectionFilter::id(collection.id),
                CollectionUpdate::PullAccess(grantee),
            )?
            .ok_or_else(|| CoreError::NotFound(format!("collection '{}'", title.trim())))?;
        info!(collection = %collection.title(), %grantee, "Unshared collection");
        Ok(collection)
    }
}

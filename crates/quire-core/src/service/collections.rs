//! Collection operations
//!
//! A collection embeds snapshots of its owner's notes, copied at edit time.
//! Callers select notes by title; the same note may appear more than once.

use serde::Serialize;
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::listing::{compare_titles, position_changed, DisplayFilter};
use crate::models::{
    normalize_tags, normalize_title, titles_equal, AccountId, Collection, CollectionFields,
    Snapshot,
};
use crate::propagate::orphaned_sources;
use crate::storage::{
    AccountFilter, CollectionFilter, CollectionUpdate, DocumentStore, NoteFilter, SnapshotMatch,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionUpdateOutcome {
    pub collection: Collection,
    pub position_changed: bool,
}

fn clean_fields(fields: CollectionFields) -> CoreResult<CollectionFields> {
    let title = normalize_title(&fields.title);
    if title.is_empty() {
        return Err(CoreError::Validation(
            "a collection must have a title".to_string(),
        ));
    }
    Ok(CollectionFields {
        title,
        subject: fields
            .subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        body: fields.body.filter(|b| !b.trim().is_empty()),
        tags: normalize_tags(&fields.tags),
    })
}

fn not_found(title: &str) -> CoreError {
    CoreError::NotFound(format!("collection '{}'", normalize_title(title)))
}

pub struct CollectionService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CollectionService<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    fn owned(&self, owner: AccountId, title: &str) -> CoreResult<Option<Collection>> {
        Ok(self
            .store
            .find_collection(&CollectionFilter::owned_by(owner).titled(title))?)
    }

    /// Copy the owner's current notes, in the order given
    fn snapshots(&self, owner: AccountId, note_titles: &[String]) -> CoreResult<Vec<Snapshot>> {
        if note_titles.is_empty() {
            return Err(CoreError::Validation(
                "a collection must hold at least one note".to_string(),
            ));
        }
        note_titles
            .iter()
            .map(|title| {
                self.store
                    .find_note(&NoteFilter::owned_by(owner).titled(title))?
                    .map(|note| note.snapshot())
                    .ok_or_else(|| {
                        CoreError::NotFound(format!("note '{}'", normalize_title(title)))
                    })
            })
            .collect()
    }

    /// Check that `title` is free for `owner`, returning it normalized
    pub fn check_title(&self, owner: AccountId, title: &str) -> CoreResult<String> {
        let title = normalize_title(title);
        if title.is_empty() {
            return Err(CoreError::Validation("a title is required".to_string()));
        }
        if self.owned(owner, &title)?.is_some() {
            return Err(CoreError::Conflict(format!(
                "you already have a collection titled '{title}'"
            )));
        }
        Ok(title)
    }

    pub fn create_collection(
        &self,
        owner: AccountId,
        fields: CollectionFields,
        note_titles: &[String],
    ) -> CoreResult<Collection> {
        let fields = clean_fields(fields)?;
        if self.store.find_account(&AccountFilter::id(owner))?.is_none() {
            return Err(CoreError::IdentityNotFound(owner));
        }
        self.check_title(owner, &fields.title)?;
        let snapshots = self.snapshots(owner, note_titles)?;

        let collection = Collection::new(owner, fields, snapshots);
        self.store.create_collection(&collection)?;
        info!(collection = %collection.title(), notes = collection.snapshots.len(), "Created collection");
        Ok(collection)
    }

    /// Replace metadata and the note selection of a collection
    pub fn update_collection(
        &self,
        owner: AccountId,
        old_title: &str,
        fields: CollectionFields,
        note_titles: &[String],
        filter: DisplayFilter,
    ) -> CoreResult<CollectionUpdateOutcome> {
        let fields = clean_fields(fields)?;
        let previous = self
            .owned(owner, old_title)?
            .ok_or_else(|| not_found(old_title))?;

        let renamed = !titles_equal(previous.title(), &fields.title);
        if renamed && self.owned(owner, &fields.title)?.is_some() {
            return Err(CoreError::Conflict(format!(
                "you already have a collection titled '{}'",
                fields.title
            )));
        }
        let snapshots = self.snapshots(owner, note_titles)?;

        let moved = renamed
            && position_changed(
                self.store,
                owner,
                previous.id,
                previous.title(),
                &fields.title,
                filter,
            )?;

        let collection = self
            .store
            .update_collection(
                &CollectionFilter::id(previous.id),
                CollectionUpdate::Replace { fields, snapshots },
            )?
            .ok_or_else(|| not_found(old_title))?;

        info!(from = %previous.title(), to = %collection.title(), "Updated collection");
        Ok(CollectionUpdateOutcome {
            collection,
            position_changed: moved,
        })
    }

    pub fn delete_collection(&self, owner: AccountId, title: &str) -> CoreResult<Collection> {
        let collection = self
            .store
            .delete_collections(&CollectionFilter::owned_by(owner).titled(title))?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(title))?;
        info!(collection = %collection.title(), "Deleted collection");
        Ok(collection)
    }

    /// Append snapshots of more notes; duplicates are kept
    pub fn add_to_collection(
        &self,
        owner: AccountId,
        title: &str,
        note_titles: &[String],
    ) -> CoreResult<Collection> {
        let existing = self.owned(owner, title)?.ok_or_else(|| not_found(title))?;
        let snapshots = self.snapshots(owner, note_titles)?;
        self.store
            .update_collection(
                &CollectionFilter::id(existing.id),
                CollectionUpdate::AppendSnapshots(snapshots),
            )?
            .ok_or_else(|| not_found(title))
    }

    /// Reorder snapshots; `order[i]` is the current index of the snapshot
    /// that moves to position `i`
    pub fn reorder_collection(
        &self,
        owner: AccountId,
        title: &str,
        order: &[usize],
    ) -> CoreResult<Collection> {
        let existing = self.owned(owner, title)?.ok_or_else(|| not_found(title))?;
        if !crate::storage::query::is_permutation(order, existing.snapshots.len()) {
            return Err(CoreError::Validation(format!(
                "order must list each of the {} positions exactly once",
                existing.snapshots.len()
            )));
        }
        let collection = self
            .store
            .update_collection(
                &CollectionFilter::id(existing.id),
                CollectionUpdate::Reorder(order.to_vec()),
            )?
            .ok_or_else(|| not_found(title))?;
        if collection.snapshots.len() != order.len() {
            return Err(CoreError::Conflict(format!(
                "collection '{}' changed while reordering",
                collection.title()
            )));
        }
        Ok(collection)
    }

    /// Remove every snapshot of the note titled `note_title`, including
    /// leftovers of a deleted note that had the same title
    pub fn remove_from_collection(
        &self,
        owner: AccountId,
        title: &str,
        note_title: &str,
    ) -> CoreResult<Collection> {
        let existing = self.owned(owner, title)?.ok_or_else(|| not_found(title))?;
        let matcher = match self
            .store
            .find_note(&NoteFilter::owned_by(owner).titled(note_title))?
        {
            Some(note) => {
                let orphaned = orphaned_sources(self.store, owner, note.title(), Some(note.id))?;
                SnapshotMatch::note(&note).with_orphaned(orphaned)
            }
            None => SnapshotMatch::title(note_title),
        };
        if !existing.snapshots.iter().any(|s| matcher.matches(s)) {
            return Err(CoreError::NotFound(format!(
                "note '{}' in collection '{}'",
                normalize_title(note_title),
                existing.title()
            )));
        }
        self.store
            .update_collection(
                &CollectionFilter::id(existing.id),
                CollectionUpdate::PullSnapshots(matcher),
            )?
            .ok_or_else(|| not_found(title))
    }

    /// A collection owned by `account`, or else one shared with it
    pub fn get_collection(&self, account: AccountId, title: &str) -> CoreResult<Collection> {
        if let Some(collection) = self.owned(account, title)? {
            return Ok(collection);
        }
        self.store
            .find_collection(&CollectionFilter::visible_to(account).titled(title))?
            .ok_or_else(|| not_found(title))
    }

    pub fn list_collections(&self, account: AccountId) -> CoreResult<Vec<Collection>> {
        let mut collections = self
            .store
            .find_collections(&CollectionFilter::visible_to(account))?;
        collections.sort_by(|a, b| compare_titles(a.title(), b.title()));
        Ok(collections)
    }
}

//! Keeps collection snapshots in step with their source notes
//!
//! Runs after the canonical note has been written. Each affected collection
//! is a separate store update whose filter re-checks that the collection
//! still holds a matching snapshot, so reruns only touch what is left.
//!
//! Snapshots whose source note no longer exists are leftovers of a delete
//! that stopped part way. They are matched by title, like snapshots that
//! never recorded a source.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::models::{AccountId, Note, NoteId};
use crate::storage::{CollectionFilter, CollectionUpdate, DocumentStore, NoteFilter, SnapshotMatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub collections_updated: usize,
}

/// Sources of `owner`'s snapshots titled `title` that no longer resolve
/// to a note, apart from `live`
pub fn orphaned_sources(
    store: &dyn DocumentStore,
    owner: AccountId,
    title: &str,
    live: Option<NoteId>,
) -> CoreResult<Vec<NoteId>> {
    let matcher = SnapshotMatch::title(title);
    let collections =
        store.find_collections(&CollectionFilter::owned_by(owner).containing(matcher.clone()))?;

    let mut orphaned: Vec<NoteId> = Vec::new();
    for source in collections
        .iter()
        .flat_map(|c| c.snapshots.iter())
        .filter(|s| matcher.matches(s))
        .filter_map(|s| s.source)
    {
        if Some(source) == live || orphaned.contains(&source) {
            continue;
        }
        if store.find_note(&NoteFilter::id(source))?.is_none() {
            orphaned.push(source);
        }
    }
    Ok(orphaned)
}

fn sweep(
    store: &dyn DocumentStore,
    owner: AccountId,
    title: &str,
    matcher: SnapshotMatch,
    update: CollectionUpdate,
) -> CoreResult<PropagationReport> {
    let mut report = PropagationReport::default();

    let collections =
        store.find_collections(&CollectionFilter::owned_by(owner).containing(matcher.clone()))?;

    for collection in collections {
        let filter = CollectionFilter::id(collection.id).containing(matcher.clone());
        match store.update_collection(&filter, update.clone()) {
            Ok(Some(_)) => {
                report.collections_updated += 1;
                debug!(collection = %collection.title(), note = %title, "Propagated note change");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    collection = %collection.title(),
                    committed = report.collections_updated,
                    error = %e,
                    "Snapshot propagation stopped"
                );
                return Err(CoreError::from(e).after(report.collections_updated));
            }
        }
    }

    Ok(report)
}

/// Overwrite every snapshot of `previous` with the fields of `current`
///
/// Snapshots are found through `previous`, since they still mirror the
/// note as it was before the update. Leftovers under the old title are
/// taken over by the note.
pub fn propagate_update(
    store: &dyn DocumentStore,
    previous: &Note,
    current: &Note,
) -> CoreResult<PropagationReport> {
    let orphaned = orphaned_sources(store, previous.owner, previous.title(), Some(previous.id))?;
    let matcher = SnapshotMatch::note(previous).with_orphaned(orphaned);
    let update = CollectionUpdate::RewriteSnapshots {
        matching: matcher.clone(),
        fields: current.fields.clone(),
        source: Some(current.id),
    };
    sweep(store, previous.owner, previous.title(), matcher, update)
}

/// Remove every snapshot of a deleted note, and any leftovers under its title
pub fn propagate_delete(store: &dyn DocumentStore, note: &Note) -> CoreResult<PropagationReport> {
    let orphaned = orphaned_sources(store, note.owner, note.title(), Some(note.id))?;
    let matcher = SnapshotMatch::note(note).with_orphaned(orphaned);
    sweep(
        store,
        note.owner,
        note.title(),
        matcher.clone(),
        CollectionUpdate::PullSnapshots(matcher),
    )
}

/// Remove snapshots titled `title` that no longer belong to any note
///
/// Finishes a note delete whose sweep stopped part way. Returns `None`
/// when there is nothing left to remove.
pub fn propagate_leftovers(
    store: &dyn DocumentStore,
    owner: AccountId,
    title: &str,
) -> CoreResult<Option<PropagationReport>> {
    let orphaned = orphaned_sources(store, owner, title, None)?;
    if orphaned.is_empty() {
        return Ok(None);
    }
    let matcher = SnapshotMatch::leftovers(title, orphaned);
    sweep(
        store,
        owner,
        title,
        matcher.clone(),
        CollectionUpdate::PullSnapshots(matcher),
    )
    .map(Some)
}

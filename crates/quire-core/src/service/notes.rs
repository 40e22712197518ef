//! Note operations
//!
//! Notes are addressed by owner and title. Titles are stored trimmed and
//! lowercase, so lookups ignore case. Updates and deletes write the note
//! first and then push the change into the owner's collections.

use serde::Serialize;
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::listing::{compare_titles, position_changed, DisplayFilter};
use crate::models::{
    normalize_tags, normalize_title, titles_equal, AccountId, Note, NoteFields,
};
use crate::propagate::{
    propagate_delete, propagate_leftovers, propagate_update, PropagationReport,
};
use crate::storage::{AccountFilter, DocumentStore, NoteFilter, NoteUpdate};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteUpdateOutcome {
    pub note: Note,
    /// The rename moved the note within the listing
    pub position_changed: bool,
    pub propagation: PropagationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteDeleteOutcome {
    pub title: String,
    /// `None` when the note was already gone and only leftover snapshots
    /// of an interrupted delete were removed
    pub note: Option<Note>,
    pub propagation: PropagationReport,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Normalize incoming fields; title and body are required
fn clean_fields(fields: NoteFields) -> CoreResult<NoteFields> {
    let title = normalize_title(&fields.title);
    if title.is_empty() || fields.body.trim().is_empty() {
        return Err(CoreError::Validation(
            "a note must have a title and body".to_string(),
        ));
    }
    Ok(NoteFields {
        title,
        subject: trimmed(fields.subject),
        body: fields.body,
        tags: normalize_tags(&fields.tags),
        syntax: trimmed(fields.syntax),
    })
}

pub struct NoteService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> NoteService<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    fn owned(&self, owner: AccountId, title: &str) -> CoreResult<Option<Note>> {
        Ok(self
            .store
            .find_note(&NoteFilter::owned_by(owner).titled(title))?)
    }

    /// Check that `title` is free for `owner`, returning it normalized
    pub fn check_title(&self, owner: AccountId, title: &str) -> CoreResult<String> {
        let title = normalize_title(title);
        if title.is_empty() {
            return Err(CoreError::Validation("a title is required".to_string()));
        }
        if self.owned(owner, &title)?.is_some() {
            return Err(CoreError::Conflict(format!(
                "you already have a note titled '{title}'"
            )));
        }
        Ok(title)
    }

    pub fn create_note(&self, owner: AccountId, fields: NoteFields) -> CoreResult<Note> {
        let fields = clean_fields(fields)?;
        if self.store.find_account(&AccountFilter::id(owner))?.is_none() {
            return Err(CoreError::IdentityNotFound(owner));
        }
        self.check_title(owner, &fields.title)?;

        let note = Note::new(owner, fields);
        self.store.create_note(&note)?;
        info!(note = %note.title(), %owner, "Created note");
        Ok(note)
    }

    /// Replace the fields of the note titled `old_title`
    ///
    /// The position flag is computed against the listing as it was before
    /// the write. Snapshots are updated after the note itself; a failure
    /// there is reported as a partial failure with the note already saved.
    pub fn update_note(
        &self,
        owner: AccountId,
        old_title: &str,
        fields: NoteFields,
        filter: DisplayFilter,
    ) -> CoreResult<NoteUpdateOutcome> {
        let fields = clean_fields(fields)?;
        let previous = self
            .owned(owner, old_title)?
            .ok_or_else(|| CoreError::NotFound(format!("note '{}'", normalize_title(old_title))))?;

        let renamed = !titles_equal(previous.title(), &fields.title);
        if renamed && self.owned(owner, &fields.title)?.is_some() {
            return Err(CoreError::Conflict(format!(
                "you already have a note titled '{}'",
                fields.title
            )));
        }

        let moved = renamed
            && position_changed(
                self.store,
                owner,
                previous.id,
                previous.title(),
                &fields.title,
                filter,
            )?;

        let note = self
            .store
            .update_note(&NoteFilter::id(previous.id), NoteUpdate::Replace(fields))?
            .ok_or_else(|| CoreError::NotFound(format!("note '{}'", previous.title())))?;

        let propagation = propagate_update(self.store, &previous, &note).map_err(|e| e.after(1))?;

        info!(
            from = %previous.title(),
            to = %note.title(),
            collections = propagation.collections_updated,
            "Updated note"
        );
        Ok(NoteUpdateOutcome {
            note,
            position_changed: moved,
            propagation,
        })
    }

    /// Delete the note and its snapshots
    ///
    /// When the note is already gone but snapshots of it survive an earlier
    /// delete that stopped part way, those snapshots are removed instead.
    pub fn delete_note(&self, owner: AccountId, title: &str) -> CoreResult<NoteDeleteOutcome> {
        let deleted = self
            .store
            .delete_notes(&NoteFilter::owned_by(owner).titled(title))?
            .into_iter()
            .next();

        let Some(note) = deleted else {
            let propagation = propagate_leftovers(self.store, owner, title)?.ok_or_else(|| {
                CoreError::NotFound(format!("note '{}'", normalize_title(title)))
            })?;
            info!(
                note = %normalize_title(title),
                collections = propagation.collections_updated,
                "Removed leftover snapshots"
            );
            return Ok(NoteDeleteOutcome {
                title: normalize_title(title),
                note: None,
                propagation,
            });
        };

        let propagation = propagate_delete(self.store, &note).map_err(|e| e.after(1))?;

        info!(note = %note.title(), collections = propagation.collections_updated, "Deleted note");
        Ok(NoteDeleteOutcome {
            title: note.title().to_string(),
            note: Some(note),
            propagation,
        })
    }

    /// A note owned by `account`, or else one shared with it
    pub fn get_note(&self, account: AccountId, title: &str) -> CoreResult<Note> {
        if let Some(note) = self.owned(account, title)? {
            return Ok(note);
        }
        self.store
            .find_note(&NoteFilter::visible_to(account).titled(title))?
            .ok_or_else(|| CoreError::NotFound(format!("note '{}'", normalize_title(title))))
    }

    /// Notes owned by or shared with `account`, in listing order
    pub fn list_notes(&self, account: AccountId) -> CoreResult<Vec<Note>> {
        let mut notes = self.store.find_notes(&NoteFilter::visible_to(account))?;
        notes.sort_by(|a, b| compare_titles(a.title(), b.title()));
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;
    use crate::storage::MemoryStore;

    fn setup() -> (MemoryStore, Account) {
        let store = MemoryStore::new();
        let alice = Account::new("alice");
        store.create_account(&alice).unwrap();
        (store, alice)
    }

    #[test]
    fn test_create_normalizes_fields() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);

        let note = notes
            .create_note(
                alice.id,
                NoteFields::new("  My Draft ", "body")
                    .with_tags(["Rust", "rust", "CLI"])
                    .with_subject("  "),
            )
            .unwrap();

        assert_eq!(note.title(), "my draft");
        assert_eq!(note.fields.tags, vec!["rust", "cli"]);
        assert_eq!(note.fields.subject, None);
    }

    #[test]
    fn test_create_requires_title_and_body() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);

        assert!(matches!(
            notes.create_note(alice.id, NoteFields::new("", "body")),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            notes.create_note(alice.id, NoteFields::new("draft", "  ")),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_create_duplicate_title_conflicts() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);

        notes
            .create_note(alice.id, NoteFields::new("draft", "a"))
            .unwrap();
        let err = notes
            .create_note(alice.id, NoteFields::new("DRAFT", "b"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert!(matches!(
            notes.check_title(alice.id, "Draft"),
            Err(CoreError::Conflict(_))
        ));
        assert_eq!(notes.check_title(alice.id, "Other ").unwrap(), "other");
    }

    #[test]
    fn test_create_for_unknown_owner() {
        let store = MemoryStore::new();
        let notes = NoteService::new(&store);
        let ghost = uuid::Uuid::new_v4();

        assert!(matches!(
            notes.create_note(ghost, NoteFields::new("draft", "a")),
            Err(CoreError::IdentityNotFound(id)) if id == ghost
        ));
    }

    #[test]
    fn test_update_into_taken_title_conflicts() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);
        notes
            .create_note(alice.id, NoteFields::new("draft", "a"))
            .unwrap();
        notes
            .create_note(alice.id, NoteFields::new("notes", "b"))
            .unwrap();

        let err = notes
            .update_note(
                alice.id,
                "draft",
                NoteFields::new("Notes", "c"),
                DisplayFilter::All,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(notes.get_note(alice.id, "draft").unwrap().fields.body, "a");
    }

    #[test]
    fn test_update_missing_note() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);

        let err = notes
            .update_note(alice.id, "nothing", NoteFields::new("x", "y"), DisplayFilter::All)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn test_update_body_only_keeps_position() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);
        notes
            .create_note(alice.id, NoteFields::new("draft", "a"))
            .unwrap();

        let outcome = notes
            .update_note(alice.id, "draft", NoteFields::new("draft", "b"), DisplayFilter::All)
            .unwrap();
        assert!(!outcome.position_changed);
        assert_eq!(outcome.note.fields.body, "b");
    }

    #[test]
    fn test_delete_missing_note() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);
        assert!(matches!(
            notes.delete_note(alice.id, "draft"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_notes_sorted() {
        let (store, alice) = setup();
        let notes = NoteService::new(&store);
        for title in ["zeta", "Alpha", "mid"] {
            notes
                .create_note(alice.id, NoteFields::new(title, "x"))
                .unwrap();
        }

        let titles: Vec<_> = notes
            .list_notes(alice.id)
            .unwrap()
            .iter()
            .map(|n| n.title().to_string())
            .collect();
        assert_eq!(titles, vec!["alpha", "mid", "zeta"]);
    }
}

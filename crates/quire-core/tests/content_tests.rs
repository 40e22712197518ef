//! Integration tests for snapshot propagation, the position check and the
//! access-rights cascade

mod common;

use std::sync::Arc;

use common::{accounts, FailingStore};
use quire_core::models::Snapshot;
use quire_core::storage::{CollectionFilter, DocumentStore};
use quire_core::{
    Account, Collection, CollectionFields, Config, CoreError, DisplayFilter, ErrorKind,
    NoteFields, Quire,
};

fn titles(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn snapshot_titles(collection: &Collection) -> Vec<String> {
    collection
        .snapshots
        .iter()
        .map(|s| s.title().to_string())
        .collect()
}

fn collection(store: &dyn DocumentStore, id: uuid::Uuid) -> Collection {
    store
        .find_collection(&CollectionFilter::id(id))
        .unwrap()
        .unwrap()
}

#[test]
fn test_rename_scenario() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice"]);
    let alice = &users[0];

    quire
        .notes()
        .create_note(alice.id, NoteFields::new("draft", "first pass"))
        .unwrap();
    let folder = quire
        .collections()
        .create_collection(alice.id, CollectionFields::new("folder"), &titles(&["draft"]))
        .unwrap();

    quire
        .notes()
        .update_note(
            alice.id,
            "draft",
            NoteFields::new("notes", "first pass"),
            DisplayFilter::All,
        )
        .unwrap();

    let folder = collection(quire.store(), folder.id);
    assert_eq!(snapshot_titles(&folder), vec!["notes"]);
}

#[test]
fn test_rename_then_delete_propagates() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice"]);
    let alice = &users[0];
    let notes = quire.notes();
    let collections = quire.collections();

    notes
        .create_note(
            alice.id,
            NoteFields::new("draft", "v1")
                .with_subject("ideas")
                .with_tags(["a"])
                .with_syntax("markdown"),
        )
        .unwrap();
    notes
        .create_note(alice.id, NoteFields::new("other", "x"))
        .unwrap();

    let mut ids = Vec::new();
    for (title, members) in [
        ("one", vec!["draft"]),
        ("two", vec!["other", "draft", "draft"]),
        ("three", vec!["other"]),
    ] {
        ids.push(
            collections
                .create_collection(alice.id, CollectionFields::new(title), &titles(&members))
                .unwrap()
                .id,
        );
    }

    let outcome = notes
        .update_note(
            alice.id,
            "draft",
            NoteFields::new("notes", "v2")
                .with_subject("plans")
                .with_tags(["b", "c"])
                .with_syntax("text"),
            DisplayFilter::All,
        )
        .unwrap();
    assert_eq!(outcome.propagation.collections_updated, 2);

    let two = collection(quire.store(), ids[1]);
    assert_eq!(snapshot_titles(&two), vec!["other", "notes", "notes"]);
    let copied = &two.snapshots[1].fields;
    assert_eq!(copied.body, "v2");
    assert_eq!(copied.subject.as_deref(), Some("plans"));
    assert_eq!(copied.tags, vec!["b", "c"]);
    assert_eq!(copied.syntax.as_deref(), Some("text"));

    let deleted = notes.delete_note(alice.id, "notes").unwrap();
    assert_eq!(deleted.propagation.collections_updated, 2);

    assert!(collection(quire.store(), ids[0]).snapshots.is_empty());
    assert_eq!(snapshot_titles(&collection(quire.store(), ids[1])), vec!["other"]);
    assert_eq!(snapshot_titles(&collection(quire.store(), ids[2])), vec!["other"]);
}

#[test]
fn test_propagation_stays_within_owner() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice", "bob"]);
    let (alice, bob) = (&users[0], &users[1]);

    for user in [alice, bob] {
        quire
            .notes()
            .create_note(user.id, NoteFields::new("draft", "x"))
            .unwrap();
        quire
            .collections()
            .create_collection(user.id, CollectionFields::new("folder"), &titles(&["draft"]))
            .unwrap();
    }

    quire
        .notes()
        .update_note(alice.id, "draft", NoteFields::new("notes", "y"), DisplayFilter::All)
        .unwrap();

    let bobs = quire.collections().get_collection(bob.id, "folder").unwrap();
    assert_eq!(snapshot_titles(&bobs), vec!["draft"]);
}

#[test]
fn test_title_matched_snapshots_follow_rename() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice"]);
    let alice = &users[0];
    quire
        .notes()
        .create_note(alice.id, NoteFields::new("draft", "x"))
        .unwrap();

    // Snapshot without a recorded source, matched by title alone
    let legacy = Collection::new(
        alice.id,
        CollectionFields::new("folder"),
        vec![Snapshot {
            source: None,
            fields: NoteFields::new("DRAFT", "x"),
        }],
    );
    quire.store().create_collection(&legacy).unwrap();

    quire
        .notes()
        .update_note(alice.id, "draft", NoteFields::new("notes", "x"), DisplayFilter::All)
        .unwrap();

    let stored = collection(quire.store(), legacy.id);
    assert_eq!(snapshot_titles(&stored), vec!["notes"]);
}

#[test]
fn test_position_flag() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice"]);
    let alice = &users[0];
    let notes = quire.notes();
    for title in ["alpha", "draft", "zeta"] {
        notes
            .create_note(alice.id, NoteFields::new(title, "x"))
            .unwrap();
    }

    // Stays between alpha and zeta
    let outcome = notes
        .update_note(alice.id, "draft", NoteFields::new("notes", "x"), DisplayFilter::All)
        .unwrap();
    assert!(!outcome.position_changed);

    // Crosses zeta
    let outcome = notes
        .update_note(alice.id, "notes", NoteFields::new("zz top", "x"), DisplayFilter::All)
        .unwrap();
    assert!(outcome.position_changed);
    let id = outcome.note.id;

    // Same answer every time for the same listing
    for _ in 0..3 {
        assert!(quire_core::position_changed(
            quire.store(),
            alice.id,
            id,
            "zz top",
            "beta",
            DisplayFilter::All
        )
        .unwrap());
        assert!(!quire_core::position_changed(
            quire.store(),
            alice.id,
            id,
            "zz top",
            "zz",
            DisplayFilter::All
        )
        .unwrap());
    }
}

#[test]
fn test_position_flag_with_shared_note_of_same_title() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice", "bob"]);
    let (alice, bob) = (&users[0], &users[1]);
    quire.relationships().request(bob.id, alice.id).unwrap();
    quire.relationships().decide(alice.id, bob.id, true).unwrap();

    for user in [bob, alice] {
        quire
            .notes()
            .create_note(user.id, NoteFields::new("draft", "x"))
            .unwrap();
    }
    quire.sharing().share_note(bob.id, "draft", alice.id).unwrap();

    let listed: Vec<_> = quire_core::listing::listing(quire.store(), alice.id, DisplayFilter::All)
        .unwrap()
        .iter()
        .map(|e| e.id())
        .collect();
    let bobs = quire.notes().get_note(bob.id, "draft").unwrap();
    assert_eq!(listed[0], bobs.id);

    // Alice's draft stays second, after Bob's
    let outcome = quire
        .notes()
        .update_note(alice.id, "draft", NoteFields::new("e", "x"), DisplayFilter::All)
        .unwrap();
    assert!(!outcome.position_changed);

    // Going back to "a" puts it ahead of Bob's draft
    let outcome = quire
        .notes()
        .update_note(alice.id, "e", NoteFields::new("a", "x"), DisplayFilter::All)
        .unwrap();
    assert!(outcome.position_changed);
}

#[test]
fn test_propagation_failure_keeps_canonical_write() {
    let store = Arc::new(FailingStore::new(usize::MAX));
    let quire = Quire::with_store(store.clone(), Config::default());
    let users = accounts(&quire, &["alice"]);
    let alice = &users[0];

    quire
        .notes()
        .create_note(alice.id, NoteFields::new("draft", "v1"))
        .unwrap();
    let mut ids = Vec::new();
    for title in ["one", "two", "three"] {
        ids.push(
            quire
                .collections()
                .create_collection(alice.id, CollectionFields::new(title), &titles(&["draft"]))
                .unwrap()
                .id,
        );
    }

    store.allow_collection_updates(1);
    let err = quire
        .notes()
        .update_note(alice.id, "draft", NoteFields::new("notes", "v2"), DisplayFilter::All)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreFault);
    // The note itself plus one collection were written before the fault
    assert!(matches!(err, CoreError::PartialFailure { completed: 2, .. }));

    let note = quire.notes().get_note(alice.id, "notes").unwrap();
    assert_eq!(note.fields.body, "v2");
    assert_eq!(snapshot_titles(&collection(quire.store(), ids[0])), vec!["notes"]);
    assert_eq!(snapshot_titles(&collection(quire.store(), ids[1])), vec!["draft"]);
    assert_eq!(snapshot_titles(&collection(quire.store(), ids[2])), vec!["draft"]);
}

/// Alice's "draft" sits in three collections and the delete sweep stops
/// after the first one
fn interrupted_delete() -> (Quire, Account, Vec<uuid::Uuid>) {
    let store = Arc::new(FailingStore::new(usize::MAX));
    let quire = Quire::with_store(store.clone(), Config::default());
    let alice = accounts(&quire, &["alice"]).remove(0);

    quire
        .notes()
        .create_note(alice.id, NoteFields::new("draft", "v1"))
        .unwrap();
    let mut ids = Vec::new();
    for title in ["one", "two", "three"] {
        ids.push(
            quire
                .collections()
                .create_collection(alice.id, CollectionFields::new(title), &titles(&["draft"]))
                .unwrap()
                .id,
        );
    }

    store.allow_collection_updates(1);
    let err = quire.notes().delete_note(alice.id, "draft").unwrap_err();
    assert!(matches!(err, CoreError::PartialFailure { completed: 2, .. }));
    assert!(collection(quire.store(), ids[0]).snapshots.is_empty());
    assert_eq!(snapshot_titles(&collection(quire.store(), ids[1])), vec!["draft"]);
    store.allow_collection_updates(usize::MAX);

    (quire, alice, ids)
}

#[test]
fn test_retried_delete_removes_leftover_snapshots() {
    let (quire, alice, ids) = interrupted_delete();

    let outcome = quire.notes().delete_note(alice.id, "Draft").unwrap();
    assert_eq!(outcome.title, "draft");
    assert!(outcome.note.is_none());
    assert_eq!(outcome.propagation.collections_updated, 2);
    for id in &ids {
        assert!(collection(quire.store(), *id).snapshots.is_empty());
    }

    let err = quire.notes().delete_note(alice.id, "draft").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_leftover_snapshots_after_title_reused() {
    let (quire, alice, ids) = interrupted_delete();
    let notes = quire.notes();
    let collections = quire.collections();

    let fresh = notes
        .create_note(alice.id, NoteFields::new("draft", "v2"))
        .unwrap();

    // Explicit removal reaches the leftover even though a new "draft" exists
    let two = collections
        .remove_from_collection(alice.id, "two", "draft")
        .unwrap();
    assert!(two.snapshots.is_empty());

    // The leftover in "three" is taken over by the new note on rename
    collections
        .add_to_collection(alice.id, "three", &titles(&["draft"]))
        .unwrap();
    notes
        .update_note(alice.id, "draft", NoteFields::new("renamed", "v3"), DisplayFilter::All)
        .unwrap();

    let three = collection(quire.store(), ids[2]);
    assert_eq!(snapshot_titles(&three), vec!["renamed", "renamed"]);
    assert!(three.snapshots.iter().all(|s| s.source == Some(fresh.id)));
    assert!(three.snapshots.iter().all(|s| s.fields.body == "v3"));
}

#[test]
fn test_cascade_completeness() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice", "bob", "carol"]);
    let (alice, bob, carol) = (&users[0], &users[1], &users[2]);
    let relationships = quire.relationships();
    let sharing = quire.sharing();

    for other in [bob, carol] {
        relationships.request(alice.id, other.id).unwrap();
        relationships.decide(other.id, alice.id, true).unwrap();
    }

    for (owner, title) in [(alice, "a1"), (alice, "a2"), (bob, "b1")] {
        quire
            .notes()
            .create_note(owner.id, NoteFields::new(title, "x"))
            .unwrap();
    }
    quire
        .collections()
        .create_collection(alice.id, CollectionFields::new("ac"), &titles(&["a1"]))
        .unwrap();
    quire
        .collections()
        .create_collection(bob.id, CollectionFields::new("bc"), &titles(&["b1"]))
        .unwrap();

    sharing.share_note(alice.id, "a1", bob.id).unwrap();
    sharing.share_note(alice.id, "a2", bob.id).unwrap();
    sharing.share_note(alice.id, "a2", carol.id).unwrap();
    sharing.share_collection(alice.id, "ac", bob.id).unwrap();
    sharing.share_note(bob.id, "b1", alice.id).unwrap();
    sharing.share_collection(bob.id, "bc", alice.id).unwrap();

    let outcome = relationships.dissolve(alice.id, bob.id).unwrap();
    assert_eq!(outcome.cascade.notes_updated, 3);
    assert_eq!(outcome.cascade.collections_updated, 2);

    let store = quire.store();
    for (owner, grantee) in [(alice, bob), (bob, alice)] {
        let listing = quire.listing(owner.id, DisplayFilter::All).unwrap();
        assert!(!listing.is_empty());
        for note in store
            .find_notes(&quire_core::storage::NoteFilter::owned_by(owner.id))
            .unwrap()
        {
            assert!(!note.is_shared_with(grantee.id), "{} still shared", note.title());
        }
        for collection in store
            .find_collections(&CollectionFilter::owned_by(owner.id))
            .unwrap()
        {
            assert!(!collection.is_shared_with(grantee.id));
        }
    }

    // Carol's grant is untouched
    assert!(quire
        .notes()
        .get_note(alice.id, "a2")
        .unwrap()
        .is_shared_with(carol.id));

    // Bob no longer sees any of Alice's entities
    let visible = quire.listing(bob.id, DisplayFilter::All).unwrap();
    assert!(visible
        .iter()
        .all(|entry| !matches!(entry.title(), "a1" | "a2" | "ac")));
}

#[test]
fn test_shared_entities_appear_in_listing() {
    let quire = Quire::in_memory();
    let users = accounts(&quire, &["alice", "bob"]);
    let (alice, bob) = (&users[0], &users[1]);
    quire.relationships().request(alice.id, bob.id).unwrap();
    quire.relationships().request(bob.id, alice.id).unwrap();

    quire
        .notes()
        .create_note(alice.id, NoteFields::new("shared", "x"))
        .unwrap();
    quire
        .notes()
        .create_note(bob.id, NoteFields::new("own", "x"))
        .unwrap();
    quire.sharing().share_note(alice.id, "shared", bob.id).unwrap();

    let titles: Vec<_> = quire
        .listing(bob.id, DisplayFilter::Notes)
        .unwrap()
        .iter()
        .map(|e| e.title().to_string())
        .collect();
    assert_eq!(titles, vec!["own", "shared"]);
    assert_eq!(
        quire.notes().get_note(bob.id, "shared").unwrap().owner,
        alice.id
    );
}

#[test]
fn test_rename_scenario_on_sqlite() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    let quire = Quire::open_with_config(config).unwrap();
    let users = accounts(&quire, &["alice"]);
    let alice = &users[0];

    quire
        .notes()
        .create_note(alice.id, NoteFields::new("draft", "x"))
        .unwrap();
    quire
        .collections()
        .create_collection(alice.id, CollectionFields::new("folder"), &titles(&["draft"]))
        .unwrap();
    quire
        .notes()
        .update_note(alice.id, "draft", NoteFields::new("notes", "x"), DisplayFilter::All)
        .unwrap();

    let folder = quire.collections().get_collection(alice.id, "folder").unwrap();
    assert_eq!(snapshot_titles(&folder), vec!["notes"]);

    // The old title is free again, the new one is taken
    assert_eq!(quire.notes().check_title(alice.id, "draft").unwrap(), "draft");
    assert!(matches!(
        quire.notes().check_title(alice.id, "notes"),
        Err(CoreError::Conflict(_))
    ));
}

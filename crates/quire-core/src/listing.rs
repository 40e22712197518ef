//! Combined note and collection listing, and the rename position check
//!
//! Both use the same ordering: titles compared case-insensitively, with the
//! exact title as a tie-break, notes before collections on a full tie.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use uuid::Uuid;

use crate::models::{normalize_title, titles_equal, AccountId, Collection, Note};
use crate::storage::{CollectionFilter, DocumentStore, NoteFilter};

/// Which entity types a listing shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFilter {
    Notes,
    Collections,
    #[default]
    All,
}

impl DisplayFilter {
    pub fn includes_notes(self) -> bool {
        matches!(self, DisplayFilter::Notes | DisplayFilter::All)
    }

    pub fn includes_collections(self) -> bool {
        matches!(self, DisplayFilter::Collections | DisplayFilter::All)
    }
}

impl FromStr for DisplayFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "notes" | "note" => Ok(DisplayFilter::Notes),
            "collections" | "collection" => Ok(DisplayFilter::Collections),
            "all" | "both" | "" => Ok(DisplayFilter::All),
            other => Err(CoreError::Validation(format!(
                "unknown display filter '{other}' (expected notes, collections or all)"
            ))),
        }
    }
}

impl fmt::Display for DisplayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayFilter::Notes => "notes",
            DisplayFilter::Collections => "collections",
            DisplayFilter::All => "all",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListingEntry {
    Note(Note),
    Collection(Collection),
}

impl ListingEntry {
    pub fn title(&self) -> &str {
        match self {
            ListingEntry::Note(note) => note.title(),
            ListingEntry::Collection(collection) => collection.title(),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ListingEntry::Note(note) => note.id,
            ListingEntry::Collection(collection) => collection.id,
        }
    }
}

/// Listing order for titles
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    normalize_title(a)
        .cmp(&normalize_title(b))
        .then_with(|| a.cmp(b))
}

/// Everything `account` owns or has been granted, filtered and sorted
pub fn listing(
    store: &dyn DocumentStore,
    account: AccountId,
    filter: DisplayFilter,
) -> CoreResult<Vec<ListingEntry>> {
    let mut entries = Vec::new();
    if filter.includes_notes() {
        entries.extend(
            store
                .find_notes(&NoteFilter::visible_to(account))?
                .into_iter()
                .map(ListingEntry::Note),
        );
    }
    if filter.includes_collections() {
        entries.extend(
            store
                .find_collections(&CollectionFilter::visible_to(account))?
                .into_iter()
                .map(ListingEntry::Collection),
        );
    }
    entries.sort_by(|a, b| compare_titles(a.title(), b.title()));
    Ok(entries)
}

fn insertion_point<S: AsRef<str>>(sorted: &[S], title: &str) -> usize {
    sorted.partition_point(|t| compare_titles(t.as_ref(), title) == Ordering::Less)
}

/// Whether renaming the entry at `current` from `old_title` to
/// `new_title` moves it within `sorted`
///
/// When `current` is `None` the old index is where `old_title` would sit.
/// The new index is where `new_title` lands once the old entry is taken out.
pub fn rename_moves<S: AsRef<str>>(
    sorted: &[S],
    current: Option<usize>,
    old_title: &str,
    new_title: &str,
) -> bool {
    let old_index = current.unwrap_or_else(|| insertion_point(sorted, old_title));
    let remaining: Vec<&str> = sorted
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != current)
        .map(|(_, t)| t.as_ref())
        .collect();
    let new_index = insertion_point(&remaining, new_title);

    old_index != new_index
}

/// Whether renaming `entity` changes its position in the account's listing
///
/// The entity is located by id, so entries of the same title shared by
/// other accounts do not stand in for it.
pub fn position_changed(
    store: &dyn DocumentStore,
    account: AccountId,
    entity: Uuid,
    old_title: &str,
    new_title: &str,
    filter: DisplayFilter,
) -> CoreResult<bool> {
    if titles_equal(old_title, new_title) {
        return Ok(false);
    }
    let entries = listing(store, account, filter)?;
    let current = entries.iter().position(|e| e.id() == entity);
    let titles: Vec<&str> = entries.iter().map(ListingEntry::title).collect();
    Ok(rename_moves(&titles, current, old_title, new_title))
}

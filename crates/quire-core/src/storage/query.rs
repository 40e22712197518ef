//! Filters and updates understood by every store backend
//!
//! A filter selects documents of one entity type; an update describes a
//! single-document mutation. Backends evaluate `matches` and `apply` while
//! holding the document, so a filtered update is atomic per document.
//!
//! Array updates use add-to-set pushes and pull-all removals, which makes
//! replaying any update harmless.

use chrono::Utc;

use crate::models::{
    normalize_title, titles_equal, AccessRight, Account, AccountId, Collection, CollectionFields,
    CollectionId, Note, NoteFields, NoteId, RoleSet, Snapshot,
};

/// Selects accounts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub id: Option<AccountId>,
    pub username: Option<String>,
    /// Only accounts holding this counterpart in this role set
    pub holding: Option<(RoleSet, AccountId)>,
    /// Only accounts not yet holding this counterpart in this role set
    pub lacking: Option<(RoleSet, AccountId)>,
}

impl AccountFilter {
    pub fn id(id: AccountId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn username(username: &str) -> Self {
        Self {
            username: Some(normalize_title(username)),
            ..Self::default()
        }
    }

    pub fn holding(mut self, role: RoleSet, counterpart: AccountId) -> Self {
        self.holding = Some((role, counterpart));
        self
    }

    pub fn lacking(mut self, role: RoleSet, counterpart: AccountId) -> Self {
        self.lacking = Some((role, counterpart));
        self
    }

    pub fn matches(&self, account: &Account) -> bool {
        self.id.map_or(true, |id| account.id == id)
            && self
                .username
                .as_deref()
                .map_or(true, |name| account.username == name)
            && self
                .holding
                .map_or(true, |(role, other)| account.holds(role, other))
            && self
                .lacking
                .map_or(true, |(role, other)| !account.holds(role, other))
    }
}

/// Single-account mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountUpdate {
    /// Add the counterpart to a role set unless already present
    Push(RoleSet, AccountId),
    /// Remove every occurrence of the counterpart from a role set
    Pull(RoleSet, AccountId),
}

impl AccountUpdate {
    /// Apply to a document, returning whether it changed
    pub fn apply(&self, account: &mut Account) -> bool {
        match *self {
            AccountUpdate::Push(role, other) => {
                let set = account.roles_mut(role);
                if set.contains(&other) {
                    false
                } else {
                    set.push(other);
                    true
                }
            }
            AccountUpdate::Pull(role, other) => {
                let set = account.roles_mut(role);
                let before = set.len();
                set.retain(|id| *id != other);
                set.len() != before
            }
        }
    }
}

/// Selects notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub id: Option<NoteId>,
    pub owner: Option<AccountId>,
    /// Normalized title
    pub title: Option<String>,
    /// Only notes carrying an access right for this account
    pub shared_with: Option<AccountId>,
    /// Only notes owned by or shared with this account
    pub visible_to: Option<AccountId>,
}

impl NoteFilter {
    pub fn id(id: NoteId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn owned_by(owner: AccountId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn visible_to(account: AccountId) -> Self {
        Self {
            visible_to: Some(account),
            ..Self::default()
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(normalize_title(title));
        self
    }

    pub fn shared_with(mut self, grantee: AccountId) -> Self {
        self.shared_with = Some(grantee);
        self
    }

    pub fn matches(&self, note: &Note) -> bool {
        self.id.map_or(true, |id| note.id == id)
            && self.owner.map_or(true, |owner| note.owner == owner)
            && self
                .title
                .as_deref()
                .map_or(true, |title| titles_equal(note.title(), title))
            && self
                .shared_with
                .map_or(true, |grantee| note.is_shared_with(grantee))
            && self
                .visible_to
                .map_or(true, |who| note.owner == who || note.is_shared_with(who))
    }
}

/// Single-note mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteUpdate {
    /// Overwrite the display fields
    Replace(NoteFields),
    /// Grant access, once per grantee
    PushAccess(AccessRight),
    /// Remove every grant held by this account
    PullAccess(AccountId),
}

impl NoteUpdate {
    pub fn apply(&self, note: &mut Note) -> bool {
        let changed = match self {
            NoteUpdate::Replace(fields) => {
                note.fields = fields.clone();
                true
            }
            NoteUpdate::PushAccess(right) => push_access(&mut note.access_rights, *right),
            NoteUpdate::PullAccess(grantee) => pull_access(&mut note.access_rights, *grantee),
        };
        if changed {
            note.updated_at = Utc::now();
        }
        changed
    }
}

/// Identifies the snapshots that belong to one note
///
/// A snapshot whose source is the live note matches on the id alone. A
/// snapshot without a source, or whose source is listed in `orphaned`,
/// matches on case-insensitive title equality. With `any_source` set every
/// snapshot is compared by title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMatch {
    pub note_id: Option<NoteId>,
    pub title: String,
    /// Deleted notes whose leftover snapshots fall back to the title
    pub orphaned: Vec<NoteId>,
    pub any_source: bool,
}

impl SnapshotMatch {
    /// Match the snapshots of `note` as it is currently stored
    pub fn note(note: &Note) -> Self {
        Self {
            note_id: Some(note.id),
            title: note.title().to_string(),
            orphaned: Vec::new(),
            any_source: false,
        }
    }

    /// Match by title only
    pub fn title(title: &str) -> Self {
        Self {
            note_id: None,
            title: normalize_title(title),
            orphaned: Vec::new(),
            any_source: true,
        }
    }

    /// Match only leftovers of deleted notes, plus sourceless snapshots
    pub fn leftovers(title: &str, orphaned: Vec<NoteId>) -> Self {
        Self {
            note_id: None,
            title: normalize_title(title),
            orphaned,
            any_source: false,
        }
    }

    pub fn with_orphaned(mut self, orphaned: Vec<NoteId>) -> Self {
        self.orphaned = orphaned;
        self
    }

    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        match snapshot.source {
            Some(source) if self.note_id == Some(source) => true,
            Some(source) if !self.any_source && !self.orphaned.contains(&source) => false,
            _ => titles_equal(snapshot.title(), &self.title),
        }
    }
}

/// Selects collections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    pub id: Option<CollectionId>,
    pub owner: Option<AccountId>,
    /// Normalized title
    pub title: Option<String>,
    pub shared_with: Option<AccountId>,
    pub visible_to: Option<AccountId>,
    /// Only collections holding at least one matching snapshot
    pub containing: Option<SnapshotMatch>,
}

impl CollectionFilter {
    pub fn id(id: CollectionId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn owned_by(owner: AccountId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn visible_to(account: AccountId) -> Self {
        Self {
            visible_to: Some(account),
            ..Self::default()
        }
    }

    pub fn and_owner(mut self, owner: AccountId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(normalize_title(title));
        self
    }

    pub fn shared_with(mut self, grantee: AccountId) -> Self {
        self.shared_with = Some(grantee);
        self
    }

    pub fn containing(mut self, matcher: SnapshotMatch) -> Self {
        self.containing = Some(matcher);
        self
    }

    pub fn matches(&self, collection: &Collection) -> bool {
        self.id.map_or(true, |id| collection.id == id)
            && self.owner.map_or(true, |owner| collection.owner == owner)
            && self
                .title
                .as_deref()
                .map_or(true, |title| titles_equal(collection.title(), title))
            && self
                .shared_with
                .map_or(true, |grantee| collection.is_shared_with(grantee))
            && self.visible_to.map_or(true, |who| {
                collection.owner == who || collection.is_shared_with(who)
            })
            && self.containing.as_ref().map_or(true, |matcher| {
                collection.snapshots.iter().any(|s| matcher.matches(s))
            })
    }
}

/// Single-collection mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionUpdate {
    /// Overwrite metadata and the whole snapshot list
    Replace {
        fields: CollectionFields,
        snapshots: Vec<Snapshot>,
    },
    /// Append snapshots at the end, duplicates allowed
    AppendSnapshots(Vec<Snapshot>),
    /// Reorder snapshots; `order[i]` is the current index of the snapshot
    /// that should end up at position `i`. Ignored unless it is a
    /// permutation of the current positions.
    Reorder(Vec<usize>),
    /// Overwrite the mirrored fields of every matching snapshot
    RewriteSnapshots {
        matching: SnapshotMatch,
        fields: NoteFields,
        source: Option<NoteId>,
    },
    /// Remove every matching snapshot
    PullSnapshots(SnapshotMatch),
    PushAccess(AccessRight),
    PullAccess(AccountId),
}

impl CollectionUpdate {
    pub fn apply(&self, collection: &mut Collection) -> bool {
        let changed = match self {
            CollectionUpdate::Replace { fields, snapshots } => {
                collection.fields = fields.clone();
                collection.snapshots = snapshots.clone();
                true
            }
            CollectionUpdate::AppendSnapshots(snapshots) => {
                collection.snapshots.extend(snapshots.iter().cloned());
                !snapshots.is_empty()
            }
            CollectionUpdate::Reorder(order) => {
                if !is_permutation(order, collection.snapshots.len()) {
                    return false;
                }
                let current = std::mem::take(&mut collection.snapshots);
                collection.snapshots = order.iter().map(|&i| current[i].clone()).collect();
                true
            }
            CollectionUpdate::RewriteSnapshots {
                matching,
                fields,
                source,
            } => {
                let mut changed = false;
                for snapshot in collection
                    .snapshots
                    .iter_mut()
                    .filter(|s| matching.matches(s))
                {
                    snapshot.fields = fields.clone();
                    if source.is_some() {
                        snapshot.source = *source;
                    }
                    changed = true;
                }
                changed
            }
            CollectionUpdate::PullSnapshots(matching) => {
                let before = collection.snapshots.len();
                collection.snapshots.retain(|s| !matching.matches(s));
                collection.snapshots.len() != before
            }
            CollectionUpdate::PushAccess(right) => {
                push_access(&mut collection.access_rights, *right)
            }
            CollectionUpdate::PullAccess(grantee) => {
                pull_access(&mut collection.access_rights, *grantee)
            }
        };
        if changed {
            collection.updated_at = Utc::now();
        }
        changed
    }
}

fn push_access(rights: &mut Vec<AccessRight>, right: AccessRight) -> bool {
    if rights.iter().any(|r| r.grantee == right.grantee) {
        return false;
    }
    rights.push(right);
    true
}

fn pull_access(rights: &mut Vec<AccessRight>, grantee: AccountId) -> bool {
    let before = rights.len();
    rights.retain(|r| r.grantee != grantee);
    rights.len() != before
}

/// Whether `order` lists every index below `len` exactly once
pub fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in order {
        if i >= len || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn legacy_snapshot(title: &str) -> Snapshot {
        Snapshot {
            source: None,
            fields: NoteFields::new(title, "body"),
        }
    }

    #[test]
    fn test_push_is_add_to_set() {
        let mut account = Account::new("alice");
        let other = Uuid::new_v4();
        let push = AccountUpdate::Push(RoleSet::Established, other);

        assert!(push.apply(&mut account));
        assert!(!push.apply(&mut account));
        assert_eq!(account.established, vec![other]);
    }

    #[test]
    fn test_pull_removes_all_and_reports_change() {
        let mut account = Account::new("alice");
        let other = Uuid::new_v4();
        account.incoming_pending = vec![other, other];
        let pull = AccountUpdate::Pull(RoleSet::IncomingPending, other);

        assert!(pull.apply(&mut account));
        assert!(account.incoming_pending.is_empty());
        assert!(!pull.apply(&mut account));
    }

    #[test]
    fn test_account_filter_holding() {
        let mut account = Account::new("alice");
        let other = Uuid::new_v4();
        account.outgoing_pending.push(other);

        let filter = AccountFilter::id(account.id).holding(RoleSet::OutgoingPending, other);
        assert!(filter.matches(&account));
        let filter = AccountFilter::id(account.id).holding(RoleSet::Established, other);
        assert!(!filter.matches(&account));
        let filter = AccountFilter::id(account.id).lacking(RoleSet::OutgoingPending, other);
        assert!(!filter.matches(&account));
        let filter = AccountFilter::id(account.id).lacking(RoleSet::Established, other);
        assert!(filter.matches(&account));
    }

    #[test]
    fn test_username_filter_is_case_insensitive() {
        let account = Account::new("alice");
        assert!(AccountFilter::username("ALICE").matches(&account));
    }

    #[test]
    fn test_note_filter_visible_to() {
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let mut note = Note::new(owner, NoteFields::new("draft", "x"));

        assert!(NoteFilter::visible_to(owner).matches(&note));
        assert!(!NoteFilter::visible_to(friend).matches(&note));

        NoteUpdate::PushAccess(AccessRight {
            grantee: friend,
            entity: note.id,
        })
        .apply(&mut note);
        assert!(NoteFilter::visible_to(friend).matches(&note));
        assert!(NoteFilter::owned_by(owner).shared_with(friend).matches(&note));
    }

    #[test]
    fn test_snapshot_match_prefers_source_id() {
        let owner = Uuid::new_v4();
        let note = Note::new(owner, NoteFields::new("draft", "x"));
        let other = Note::new(owner, NoteFields::new("draft", "y"));

        let matcher = SnapshotMatch::note(&note);
        assert!(matcher.matches(&note.snapshot()));
        // Same title but a different recorded source
        assert!(!matcher.matches(&other.snapshot()));
        // Legacy snapshot falls back to title
        assert!(matcher.matches(&legacy_snapshot("Draft")));
        assert!(!matcher.matches(&legacy_snapshot("notes")));
    }

    #[test]
    fn test_snapshot_match_orphaned_sources_fall_back_to_title() {
        let owner = Uuid::new_v4();
        let deleted = Note::new(owner, NoteFields::new("draft", "old"));
        let live = Note::new(owner, NoteFields::new("draft", "new"));
        let unrelated = Note::new(owner, NoteFields::new("draft", "other"));

        let matcher = SnapshotMatch::note(&live).with_orphaned(vec![deleted.id]);
        assert!(matcher.matches(&live.snapshot()));
        assert!(matcher.matches(&deleted.snapshot()));
        assert!(!matcher.matches(&unrelated.snapshot()));

        let leftovers = SnapshotMatch::leftovers("Draft", vec![deleted.id]);
        assert!(leftovers.matches(&deleted.snapshot()));
        assert!(leftovers.matches(&legacy_snapshot("draft")));
        assert!(!leftovers.matches(&live.snapshot()));

        // An orphaned source still has to carry the title
        let mut renamed = deleted.snapshot();
        renamed.fields.title = "notes".to_string();
        assert!(!matcher.matches(&renamed));
    }

    #[test]
    fn test_rewrite_snapshots_updates_only_matches() {
        let owner = Uuid::new_v4();
        let mut collection = Collection::new(
            owner,
            CollectionFields::new("folder"),
            vec![legacy_snapshot("draft"), legacy_snapshot("other")],
        );

        let changed = CollectionUpdate::RewriteSnapshots {
            matching: SnapshotMatch::title("draft"),
            fields: NoteFields::new("notes", "new body"),
            source: None,
        }
        .apply(&mut collection);

        assert!(changed);
        assert_eq!(collection.snapshots[0].title(), "notes");
        assert_eq!(collection.snapshots[0].fields.body, "new body");
        assert_eq!(collection.snapshots[1].title(), "other");
    }

    #[test]
    fn test_pull_snapshots() {
        let mut collection = Collection::new(
            Uuid::new_v4(),
            CollectionFields::new("folder"),
            vec![
                legacy_snapshot("draft"),
                legacy_snapshot("other"),
                legacy_snapshot("draft"),
            ],
        );

        assert!(CollectionUpdate::PullSnapshots(SnapshotMatch::title("draft"))
            .apply(&mut collection));
        assert_eq!(collection.snapshots.len(), 1);
        assert_eq!(collection.snapshots[0].title(), "other");
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let mut collection = Collection::new(
            Uuid::new_v4(),
            CollectionFields::new("folder"),
            vec![legacy_snapshot("a"), legacy_snapshot("b"), legacy_snapshot("c")],
        );

        assert!(!CollectionUpdate::Reorder(vec![0, 0, 1]).apply(&mut collection));
        assert!(!CollectionUpdate::Reorder(vec![1, 0]).apply(&mut collection));
        assert!(CollectionUpdate::Reorder(vec![2, 0, 1]).apply(&mut collection));

        let titles: Vec<_> = collection.snapshots.iter().map(|s| s.title()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_access_push_once_per_grantee() {
        let mut rights = Vec::new();
        let right = AccessRight {
            grantee: Uuid::new_v4(),
            entity: Uuid::new_v4(),
        };
        assert!(push_access(&mut rights, right));
        assert!(!push_access(&mut rights, right));
        assert!(pull_access(&mut rights, right.grantee));
        assert!(rights.is_empty());
    }
}

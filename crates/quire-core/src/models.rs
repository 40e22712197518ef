//! Data models for Quire
//!
//! Defines the documents held by the store: Account, Note and Collection,
//! plus the values embedded in them (role sets, access rights, snapshots).
//! Each document is the unit of atomicity; nothing here spans documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an account
pub type AccountId = Uuid;
/// Identifier of a note
pub type NoteId = Uuid;
/// Identifier of a collection
pub type CollectionId = Uuid;

/// One of the three relationship role sets carried by every account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSet {
    /// Requests this account sent and the counterpart has not answered
    OutgoingPending,
    /// Requests the counterpart sent to this account
    IncomingPending,
    /// Mutual friends
    Established,
}

impl RoleSet {
    pub const ALL: [RoleSet; 3] = [
        RoleSet::OutgoingPending,
        RoleSet::IncomingPending,
        RoleSet::Established,
    ];

    /// The role the counterpart holds for the same edge
    pub fn mirror(self) -> Self {
        match self {
            RoleSet::OutgoingPending => RoleSet::IncomingPending,
            RoleSet::IncomingPending => RoleSet::OutgoingPending,
            RoleSet::Established => RoleSet::Established,
        }
    }
}

/// A registered identity in the friend graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Lowercase, unique username
    pub username: String,
    #[serde(default)]
    pub outgoing_pending: Vec<AccountId>,
    #[serde(default)]
    pub incoming_pending: Vec<AccountId>,
    #[serde(default)]
    pub established: Vec<AccountId>,
    /// When this account was created
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with empty role sets
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            outgoing_pending: Vec::new(),
            incoming_pending: Vec::new(),
            established: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn roles(&self, role: RoleSet) -> &[AccountId] {
        match role {
            RoleSet::OutgoingPending => &self.outgoing_pending,
            RoleSet::IncomingPending => &self.incoming_pending,
            RoleSet::Established => &self.established,
        }
    }

    pub fn roles_mut(&mut self, role: RoleSet) -> &mut Vec<AccountId> {
        match role {
            RoleSet::OutgoingPending => &mut self.outgoing_pending,
            RoleSet::IncomingPending => &mut self.incoming_pending,
            RoleSet::Established => &mut self.established,
        }
    }

    /// Whether `counterpart` is present in the given role set
    pub fn holds(&self, role: RoleSet, counterpart: AccountId) -> bool {
        self.roles(role).contains(&counterpart)
    }

    /// Every account referenced by any role set, without duplicates
    pub fn counterparts(&self) -> Vec<AccountId> {
        let mut ids = Vec::new();
        for role in RoleSet::ALL {
            for id in self.roles(role) {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
        ids
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Dereferenced view of an account, as embedded in listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSummary {
    pub id: AccountId,
    pub username: String,
}

/// One entry of an account's friends-and-requests listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", content = "account", rename_all = "snake_case")]
pub enum RelationshipEntry {
    Established(AccountSummary),
    IncomingPending(AccountSummary),
    OutgoingPending(AccountSummary),
}

impl RelationshipEntry {
    pub fn account(&self) -> &AccountSummary {
        match self {
            RelationshipEntry::Established(a)
            | RelationshipEntry::IncomingPending(a)
            | RelationshipEntry::OutgoingPending(a) => a,
        }
    }
}

/// Observed state of the edge between two accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RelationState {
    None,
    Pending { from: AccountId, to: AccountId },
    Established,
}

/// Read/edit grant for a non-owner on one note or collection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessRight {
    pub grantee: AccountId,
    pub entity: Uuid,
}

/// The display fields of a note, shared by notes and their snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteFields {
    pub title: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub syntax: Option<String>,
}

impl NoteFields {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }
}

/// Canonical note content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub owner: AccountId,
    #[serde(flatten)]
    pub fields: NoteFields,
    #[serde(default)]
    pub access_rights: Vec<AccessRight>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create a new note owned by `owner`
    pub fn new(owner: AccountId, fields: NoteFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            fields,
            access_rights: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn is_shared_with(&self, account: AccountId) -> bool {
        self.access_rights.iter().any(|r| r.grantee == account)
    }

    /// Copy of the display fields for embedding into a collection
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            source: Some(self.id),
            fields: self.fields.clone(),
        }
    }
}

/// Denormalized copy of a note embedded inside a collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Note this snapshot was copied from. Absent on snapshots written
    /// before source ids were recorded; those match by title.
    #[serde(default)]
    pub source: Option<NoteId>,
    #[serde(flatten)]
    pub fields: NoteFields,
}

impl Snapshot {
    pub fn title(&self) -> &str {
        &self.fields.title
    }
}

/// Collection metadata that is not part of its snapshot list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionFields {
    pub title: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CollectionFields {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Ordered group of note snapshots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: CollectionId,
    pub owner: AccountId,
    #[serde(flatten)]
    pub fields: CollectionFields,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub access_rights: Vec<AccessRight>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    /// Create a new collection owned by `owner`
    pub fn new(owner: AccountId, fields: CollectionFields, snapshots: Vec<Snapshot>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            fields,
            snapshots,
            access_rights: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn is_shared_with(&self, account: AccountId) -> bool {
        self.access_rights.iter().any(|r| r.grantee == account)
    }
}

/// Normalize a title the way it is stored: trimmed and lowercase
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Case-insensitive title comparison
pub fn titles_equal(a: &str, b: &str) -> bool {
    normalize_title(a) == normalize_title(b)
}

/// Trim, lowercase and de-duplicate tags, keeping first-seen order
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

//! Friend relationship state machine
//!
//! An edge between two accounts is never stored on its own. It exists as
//! mirrored entries in the role sets of both accounts, and every transition
//! is a short sequence of independent single-account writes:
//!
//! | transition   | writes                                                   |
//! |--------------|----------------------------------------------------------|
//! | request      | push A.outgoing(B), push B.incoming(A)                   |
//! | accept       | push both `established`, then pull all four pending      |
//! | deny/cancel  | pull A.outgoing(B), pull B.incoming(A)                   |
//! | dissolve     | pull both `established`, then the access-rights cascade  |
//!
//! Pushes are add-to-set and pulls remove every occurrence, so replaying
//! any prefix of a sequence is harmless. Each call decides what to do from
//! freshly read documents, which lets a retry finish a sequence that was
//! interrupted half way.

use serde::Serialize;
use tracing::{debug, info};

use crate::access::{revoke_between, CascadeReport};
use crate::error::{CoreError, CoreResult};
use crate::models::{Account, AccountId, RelationState, RelationshipEntry, RoleSet};
use crate::storage::{AccountFilter, AccountUpdate, DocumentStore};

/// Result of [`RelationshipService::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A pending request now exists from requester to requestee
    Sent,
    /// The counterpart had already asked, so both are now friends
    Established,
    /// They were friends before the call
    AlreadyEstablished,
}

/// Result of [`RelationshipService::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecideOutcome {
    Accepted,
    Denied,
    /// An accept repeated after the edge was already established
    AlreadyEstablished,
}

/// Result of [`RelationshipService::dissolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DissolveOutcome {
    /// Whether an established entry was found on either side
    pub was_established: bool,
    pub cascade: CascadeReport,
}

/// Counts committed account writes so a later failure can report them
struct Writes<'a> {
    store: &'a dyn DocumentStore,
    completed: usize,
}

impl<'a> Writes<'a> {
    fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            completed: 0,
        }
    }

    /// Only a push that adds the entry counts as a write
    fn push(&mut self, on: AccountId, role: RoleSet, counterpart: AccountId) -> CoreResult<()> {
        let updated = self
            .store
            .update_account(
                &AccountFilter::id(on).lacking(role, counterpart),
                AccountUpdate::Push(role, counterpart),
            )
            .map_err(|e| CoreError::from(e).after(self.completed))?;
        if updated.is_some() {
            self.completed += 1;
            debug!(account = %on, ?role, %counterpart, "Pushed relationship entry");
            return Ok(());
        }
        match self.store.find_account(&AccountFilter::id(on)) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(CoreError::IdentityNotFound(on).after(self.completed)),
            Err(e) => Err(CoreError::from(e).after(self.completed)),
        }
    }

    /// Pulling from a missing account is a no-op
    fn pull(&mut self, on: AccountId, role: RoleSet, counterpart: AccountId) -> CoreResult<()> {
        let updated = self
            .store
            .update_account(
                &AccountFilter::id(on).holding(role, counterpart),
                AccountUpdate::Pull(role, counterpart),
            )
            .map_err(|e| CoreError::from(e).after(self.completed))?;
        if updated.is_some() {
            self.completed += 1;
            debug!(account = %on, ?role, %counterpart, "Pulled relationship entry");
        }
        Ok(())
    }

    /// Add both halves of an edge: `from` holds `role`, `to` its mirror
    fn push_edge(&mut self, from: AccountId, role: RoleSet, to: AccountId) -> CoreResult<()> {
        self.push(from, role, to)?;
        self.push(to, role.mirror(), from)
    }

    fn pull_edge(&mut self, from: AccountId, role: RoleSet, to: AccountId) -> CoreResult<()> {
        self.pull(from, role, to)?;
        self.pull(to, role.mirror(), from)
    }

    /// Mark the pair established, then discard pending entries in both
    /// directions. Established goes first so that an interrupted run never
    /// leaves the pair with neither pending nor established entries.
    fn establish(&mut self, a: AccountId, b: AccountId) -> CoreResult<()> {
        self.push_edge(a, RoleSet::Established, b)?;
        self.pull_edge(a, RoleSet::OutgoingPending, b)?;
        self.pull_edge(b, RoleSet::OutgoingPending, a)
    }
}

fn is_established(a: &Account, b: &Account) -> bool {
    a.holds(RoleSet::Established, b.id) || b.holds(RoleSet::Established, a.id)
}

fn is_pending(from: &Account, to: &Account) -> bool {
    from.holds(RoleSet::OutgoingPending, to.id) || to.holds(RoleSet::IncomingPending, from.id)
}

/// Drives transitions of the friend graph
pub struct RelationshipService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> RelationshipService<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    fn load(&self, id: AccountId) -> CoreResult<Account> {
        self.store
            .find_account(&AccountFilter::id(id))?
            .ok_or(CoreError::IdentityNotFound(id))
    }

    fn load_pair(&self, a: AccountId, b: AccountId) -> CoreResult<(Account, Account)> {
        if a == b {
            return Err(CoreError::SelfReference);
        }
        Ok((self.load(a)?, self.load(b)?))
    }

    /// Ask `requestee` to become a friend of `requester`
    ///
    /// When the requestee has already asked the requester, the two requests
    /// meet and the edge goes straight to established. The same check runs
    /// again after the pending pair is written, so two requests racing in
    /// opposite directions also end up established with no pending residue.
    pub fn request(
        &self,
        requester: AccountId,
        requestee: AccountId,
    ) -> CoreResult<RequestOutcome> {
        let (a, b) = self.load_pair(requester, requestee)?;
        let mut writes = Writes::new(self.store);

        if is_established(&a, &b) {
            // Also completes an establish that was interrupted earlier
            writes.establish(a.id, b.id)?;
            return Ok(RequestOutcome::AlreadyEstablished);
        }

        if is_pending(&b, &a) {
            writes.establish(a.id, b.id)?;
            info!(requester = %a.username, requestee = %b.username, "Crossed requests established friendship");
            return Ok(RequestOutcome::Established);
        }

        let has_outgoing = a.holds(RoleSet::OutgoingPending, b.id);
        let has_incoming = b.holds(RoleSet::IncomingPending, a.id);
        if has_outgoing && has_incoming {
            return Err(CoreError::Conflict(format!(
                "friend request to '{}' is already pending",
                b.username
            )));
        }

        writes.push_edge(a.id, RoleSet::OutgoingPending, b.id)?;

        let fresh = self.load(a.id).map_err(|e| e.after(writes.completed))?;
        if fresh.holds(RoleSet::IncomingPending, b.id) || fresh.holds(RoleSet::Established, b.id)
        {
            writes.establish(a.id, b.id)?;
            info!(requester = %a.username, requestee = %b.username, "Concurrent requests established friendship");
            return Ok(RequestOutcome::Established);
        }

        info!(requester = %a.username, requestee = %b.username, "Friend request sent");
        Ok(RequestOutcome::Sent)
    }

    /// [`request`](Self::request) addressed by the requestee's username
    pub fn request_by_username(
        &self,
        requester: AccountId,
        username: &str,
    ) -> CoreResult<RequestOutcome> {
        if username.trim().is_empty() {
            return Err(CoreError::Validation("username is required".to_string()));
        }
        let requestee = self
            .store
            .find_account(&AccountFilter::username(username))?
            .ok_or_else(|| CoreError::NotFound(format!("no account named '{}'", username.trim())))?;
        self.request(requester, requestee.id)
    }

    /// Accept or deny the pending request from `requester` to `decider`
    pub fn decide(
        &self,
        decider: AccountId,
        requester: AccountId,
        accept: bool,
    ) -> CoreResult<DecideOutcome> {
        let (d, r) = self.load_pair(decider, requester)?;
        let mut writes = Writes::new(self.store);

        if !is_pending(&r, &d) {
            if accept && is_established(&d, &r) {
                writes.establish(d.id, r.id)?;
                return Ok(DecideOutcome::AlreadyEstablished);
            }
            return Err(CoreError::NotFound(format!(
                "no pending friend request from '{}'",
                r.username
            )));
        }

        if accept {
            writes.establish(d.id, r.id)?;
            info!(decider = %d.username, requester = %r.username, "Friend request accepted");
            Ok(DecideOutcome::Accepted)
        } else {
            writes.pull_edge(r.id, RoleSet::OutgoingPending, d.id)?;
            info!(decider = %d.username, requester = %r.username, "Friend request denied");
            Ok(DecideOutcome::Denied)
        }
    }

    /// Withdraw a request; returns whether anything was removed
    pub fn cancel(&self, requester: AccountId, requestee: AccountId) -> CoreResult<bool> {
        let (a, b) = self.load_pair(requester, requestee)?;
        if !is_pending(&a, &b) {
            return Ok(false);
        }

        let mut writes = Writes::new(self.store);
        writes.pull_edge(a.id, RoleSet::OutgoingPending, b.id)?;
        info!(requester = %a.username, requestee = %b.username, "Friend request cancelled");
        Ok(writes.completed > 0)
    }

    /// End a friendship and revoke every grant between the two accounts
    ///
    /// Fails with a conflict while the edge is only pending. Calling it when
    /// no edge remains still runs the cascade, so a retry finishes a
    /// dissolution that failed part way.
    pub fn dissolve(&self, a: AccountId, b: AccountId) -> CoreResult<DissolveOutcome> {
        let (a, b) = self.load_pair(a, b)?;
        let was_established = is_established(&a, &b);

        if !was_established && (is_pending(&a, &b) || is_pending(&b, &a)) {
            return Err(CoreError::Conflict(format!(
                "'{}' and '{}' are not friends yet",
                a.username, b.username
            )));
        }

        let mut writes = Writes::new(self.store);
        writes.pull_edge(a.id, RoleSet::Established, b.id)?;

        let cascade =
            revoke_between(self.store, a.id, b.id).map_err(|e| e.after(writes.completed))?;

        info!(
            a = %a.username,
            b = %b.username,
            notes = cascade.notes_updated,
            collections = cascade.collections_updated,
            "Friendship dissolved"
        );
        Ok(DissolveOutcome {
            was_established,
            cascade,
        })
    }

    /// Current state of the edge between two accounts
    pub fn state(&self, a: AccountId, b: AccountId) -> CoreResult<RelationState> {
        let (a, b) = self.load_pair(a, b)?;
        Ok(if is_established(&a, &b) {
            RelationState::Established
        } else if is_pending(&a, &b) {
            RelationState::Pending {
                from: a.id,
                to: b.id,
            }
        } else if is_pending(&b, &a) {
            RelationState::Pending {
                from: b.id,
                to: a.id,
            }
        } else {
            RelationState::None
        })
    }

    /// Friends and requests of an account: incoming requests, then
    /// outgoing requests, then established friends
    pub fn relationships(&self, account: AccountId) -> CoreResult<Vec<RelationshipEntry>> {
        let account = self.load(account)?;
        let mut entries = Vec::new();

        for summary in self.store.populate_accounts(&account.incoming_pending)? {
            entries.push(RelationshipEntry::IncomingPending(summary));
        }
        for summary in self.store.populate_accounts(&account.outgoing_pending)? {
            entries.push(RelationshipEntry::OutgoingPending(summary));
        }
        for summary in self.store.populate_accounts(&account.established)? {
            entries.push(RelationshipEntry::Established(summary));
        }

        Ok(entries)
    }
}

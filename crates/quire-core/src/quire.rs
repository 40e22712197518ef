//! Entry point tying configuration, a store and the services together
//!
//! ## Usage
//!
//! ```ignore
//! let quire = Quire::open()?;  // SQLite under the configured data dir
//!
//! let alice = quire.accounts().create_account("alice")?;
//! quire.notes().create_note(alice.id, NoteFields::new("draft", "body"))?;
//!
//! let entries = quire.listing(alice.id, quire.config().listing_filter)?;
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::access::SharingService;
use crate::config::Config;
use crate::error::CoreResult;
use crate::listing::{listing, DisplayFilter, ListingEntry};
use crate::models::AccountId;
use crate::service::{AccountService, CollectionService, NoteService, RelationshipService};
use crate::storage::{DocumentStore, MemoryStore, SqliteStore};

/// A store plus the configuration it was opened with
///
/// Cloning is cheap and shares the underlying store.
#[derive(Clone)]
pub struct Quire {
    store: Arc<dyn DocumentStore>,
    config: Config,
}

impl Quire {
    /// Open the SQLite store described by the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the SQLite store at `config.sqlite_path()`
    pub fn open_with_config(config: Config) -> Result<Self> {
        let path = config.sqlite_path();
        let store = SqliteStore::open(&path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Volatile store, mostly for tests
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), Config::default())
    }

    pub fn with_store(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(self.store())
    }

    pub fn relationships(&self) -> RelationshipService<'_> {
        RelationshipService::new(self.store())
    }

    pub fn notes(&self) -> NoteService<'_> {
        NoteService::new(self.store())
    }

    pub fn collections(&self) -> CollectionService<'_> {
        CollectionService::new(self.store())
    }

    pub fn sharing(&self) -> SharingService<'_> {
        SharingService::new(self.store())
    }

    /// Combined listing for an account
    pub fn listing(
        &self,
        account: AccountId,
        filter: DisplayFilter,
    ) -> CoreResult<Vec<ListingEntry>> {
        listing(self.store(), account, filter)
    }
}

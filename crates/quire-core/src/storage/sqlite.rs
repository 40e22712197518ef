//! SQLite document store
//!
//! One row per document: the JSON body plus a few indexed columns. Filters
//! are narrowed in SQL on those columns and then evaluated in full against
//! the decoded documents. Each update reloads, applies and writes back its
//! document inside one immediate transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params_from_iter, Connection, ErrorCode, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::models::{normalize_title, Account, Collection, Note};
use crate::storage::adapter::DocumentStore;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::query::{
    AccountFilter, AccountUpdate, CollectionFilter, CollectionUpdate, NoteFilter, NoteUpdate,
};
use crate::storage::schema::{init_schema, needs_init};

/// Column/value pairs used to narrow a query
type Scope = Vec<(&'static str, String)>;

/// A document type that has its own table
trait StoredDocument: Serialize + DeserializeOwned {
    const TABLE: &'static str;
    const ENTITY: &'static str;

    fn id(&self) -> Uuid;

    /// Indexed columns other than `id`
    fn columns(&self) -> Scope;

    /// The unique key reported on conflicts
    fn key(&self) -> String;
}

impl StoredDocument for Account {
    const TABLE: &'static str = "accounts";
    const ENTITY: &'static str = "account";

    fn id(&self) -> Uuid {
        self.id
    }

    fn columns(&self) -> Scope {
        vec![("username", normalize_title(&self.username))]
    }

    fn key(&self) -> String {
        self.username.clone()
    }
}

impl StoredDocument for Note {
    const TABLE: &'static str = "notes";
    const ENTITY: &'static str = "note";

    fn id(&self) -> Uuid {
        self.id
    }

    fn columns(&self) -> Scope {
        vec![
            ("owner_id", self.owner.to_string()),
            ("title", normalize_title(self.title())),
        ]
    }

    fn key(&self) -> String {
        self.title().to_string()
    }
}

impl StoredDocument for Collection {
    const TABLE: &'static str = "collections";
    const ENTITY: &'static str = "collection";

    fn id(&self) -> Uuid {
        self.id
    }

    fn columns(&self) -> Scope {
        vec![
            ("owner_id", self.owner.to_string()),
            ("title", normalize_title(self.title())),
        ]
    }

    fn key(&self) -> String {
        self.title().to_string()
    }
}

fn account_scope(filter: &AccountFilter) -> Scope {
    let mut scope = Scope::new();
    if let Some(id) = filter.id {
        scope.push(("id", id.to_string()));
    }
    if let Some(username) = &filter.username {
        scope.push(("username", username.clone()));
    }
    scope
}

fn owned_scope(id: Option<Uuid>, owner: Option<Uuid>, title: Option<&str>) -> Scope {
    let mut scope = Scope::new();
    if let Some(id) = id {
        scope.push(("id", id.to_string()));
    }
    if let Some(owner) = owner {
        scope.push(("owner_id", owner.to_string()));
    }
    if let Some(title) = title {
        scope.push(("title", normalize_title(title)));
    }
    scope
}

fn note_scope(filter: &NoteFilter) -> Scope {
    owned_scope(filter.id, filter.owner, filter.title.as_deref())
}

fn collection_scope(filter: &CollectionFilter) -> Scope {
    owned_scope(filter.id, filter.owner, filter.title.as_deref())
}

/// Map unique-constraint violations to `Duplicate`
fn constraint_error(error: rusqlite::Error, entity: &'static str, key: String) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, _) = &error {
        if e.code == ErrorCode::ConstraintViolation {
            return StoreError::Duplicate { entity, key };
        }
    }
    StoreError::Database(error)
}

fn select<T: StoredDocument>(conn: &Connection, scope: &Scope) -> StoreResult<Vec<T>> {
    let mut sql = format!("SELECT id, document FROM {}", T::TABLE);
    if !scope.is_empty() {
        let conditions: Vec<String> = scope.iter().map(|(c, _)| format!("{c} = ?")).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(scope.iter().map(|(_, v)| v)), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut documents = Vec::new();
    for row in rows {
        let (id, body) = row?;
        let document = serde_json::from_str(&body).map_err(|e| StoreError::CorruptDocument {
            entity: T::ENTITY,
            id,
            details: e.to_string(),
        })?;
        documents.push(document);
    }
    Ok(documents)
}

fn insert<T: StoredDocument>(conn: &Connection, document: &T) -> StoreResult<()> {
    let columns = document.columns();
    let names: Vec<&str> = columns.iter().map(|(c, _)| *c).collect();
    let placeholders = vec!["?"; columns.len() + 2].join(", ");
    let sql = format!(
        "INSERT INTO {} (id, {}, document) VALUES ({})",
        T::TABLE,
        names.join(", "),
        placeholders
    );

    let mut values = vec![document.id().to_string()];
    values.extend(columns.into_iter().map(|(_, v)| v));
    values.push(serde_json::to_string(document)?);

    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|e| constraint_error(e, T::ENTITY, document.key()))?;
    Ok(())
}

fn write_back<T: StoredDocument>(conn: &Connection, document: &T) -> StoreResult<()> {
    let columns = document.columns();
    let assignments: Vec<String> = columns.iter().map(|(c, _)| format!("{c} = ?")).collect();
    let sql = format!(
        "UPDATE {} SET {}, document = ? WHERE id = ?",
        T::TABLE,
        assignments.join(", ")
    );

    let mut values: Vec<String> = columns.into_iter().map(|(_, v)| v).collect();
    values.push(serde_json::to_string(document)?);
    values.push(document.id().to_string());

    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|e| constraint_error(e, T::ENTITY, document.key()))?;
    Ok(())
}

/// Document store persisted in a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::from_io(e, parent.to_path_buf()))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        debug!(path = %path.display(), "Opened SQLite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn find_all<T: StoredDocument>(
        &self,
        scope: &Scope,
        matches: impl Fn(&T) -> bool,
    ) -> StoreResult<Vec<T>> {
        let conn = self.lock()?;
        Ok(select::<T>(&conn, scope)?
            .into_iter()
            .filter(|d| matches(d))
            .collect())
    }

    fn find_first<T: StoredDocument>(
        &self,
        scope: &Scope,
        matches: impl Fn(&T) -> bool,
    ) -> StoreResult<Option<T>> {
        let conn = self.lock()?;
        Ok(select::<T>(&conn, scope)?.into_iter().find(|d| matches(d)))
    }

    fn create<T: StoredDocument>(&self, document: &T) -> StoreResult<()> {
        let conn = self.lock()?;
        insert(&conn, document)?;
        debug!(entity = T::ENTITY, id = %document.id(), "Created document");
        Ok(())
    }

    fn update_first<T: StoredDocument>(
        &self,
        scope: &Scope,
        matches: impl Fn(&T) -> bool,
        apply: impl FnOnce(&mut T) -> bool,
    ) -> StoreResult<Option<T>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut document) = select::<T>(&tx, scope)?.into_iter().find(|d| matches(d)) else {
            return Ok(None);
        };
        if apply(&mut document) {
            write_back(&tx, &document)?;
            debug!(entity = T::ENTITY, id = %document.id(), "Updated document");
        }

        tx.commit()?;
        Ok(Some(document))
    }

    fn delete_all<T: StoredDocument>(
        &self,
        scope: &Scope,
        matches: impl Fn(&T) -> bool,
    ) -> StoreResult<Vec<T>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed: Vec<T> = select::<T>(&tx, scope)?
            .into_iter()
            .filter(|d| matches(d))
            .collect();
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        for document in &removed {
            tx.execute(&sql, [document.id().to_string()])?;
        }

        tx.commit()?;
        if !removed.is_empty() {
            debug!(entity = T::ENTITY, count = removed.len(), "Deleted documents");
        }
        Ok(removed)
    }
}

impl DocumentStore for SqliteStore {
    fn find_account(&self, filter: &AccountFilter) -> StoreResult<Option<Account>> {
        self.find_first(&account_scope(filter), |a: &Account| filter.matches(a))
    }

    fn find_accounts(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>> {
        self.find_all(&account_scope(filter), |a: &Account| filter.matches(a))
    }

    fn create_account(&self, account: &Account) -> StoreResult<()> {
        self.create(account)
    }

    fn update_account(
        &self,
        filter: &AccountFilter,
        update: AccountUpdate,
    ) -> StoreResult<Option<Account>> {
        self.update_first(
            &account_scope(filter),
            |a: &Account| filter.matches(a),
            |a: &mut Account| update.apply(a),
        )
    }

    fn delete_account(&self, filter: &AccountFilter) -> StoreResult<Vec<Account>> {
        self.delete_all(&account_scope(filter), |a: &Account| filter.matches(a))
    }

    fn find_note(&self, filter: &NoteFilter) -> StoreResult<Option<Note>> {
        self.find_first(&note_scope(filter), |n: &Note| filter.matches(n))
    }

    fn find_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>> {
        self.find_all(&note_scope(filter), |n: &Note| filter.matches(n))
    }

    fn create_note(&self, note: &Note) -> StoreResult<()> {
        self.create(note)
    }

    fn update_note(&self, filter: &NoteFilter, update: NoteUpdate) -> StoreResult<Option<Note>> {
        self.update_first(
            &note_scope(filter),
            |n: &Note| filter.matches(n),
            |n: &mut Note| update.apply(n),
        )
    }

    fn delete_notes(&self, filter: &NoteFilter) -> StoreResult<Vec<Note>> {
        self.delete_all(&note_scope(filter), |n: &Note| filter.matches(n))
    }

    fn find_collection(&self, filter: &CollectionFilter) -> StoreResult<Option<Collection>> {
        self.find_first(&collection_scope(filter), |c: &Collection| filter.matches(c))
    }

    fn find_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>> {
        self.find_all(&collection_scope(filter), |c: &Collection| filter.matches(c))
    }

    fn create_collection(&self, collection: &Collection) -> StoreResult<()> {
        self.create(collection)
    }

    fn update_collection(
        &self,
        filter: &CollectionFilter,
        update: CollectionUpdate,
    ) -> StoreResult<Option<Collection>> {
        self.update_first(
            &collection_scope(filter),
            |c: &Collection| filter.matches(c),
            |c: &mut Collection| update.apply(c),
        )
    }

    fn delete_collections(&self, filter: &CollectionFilter) -> StoreResult<Vec<Collection>> {
        self.delete_all(&collection_scope(filter), |c: &Collection| filter.matches(c))
    }
}

//! A process-local map of database name to [`Database`] (spec.md §4.3
//! `CreateDb`/`DeleteDb`).

use crate::database::Database;
use parking_lot::RwLock;
use peacedb_core::sanitize_db_name;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Owns every database this process knows about. A single lock guards the
/// *set* of databases; each [`Database`] has its own lock for the data
/// inside it, so creating/dropping one database never blocks operations
/// on another (spec.md §5).
#[derive(Default)]
pub struct Engine {
    databases: RwLock<BTreeMap<String, Arc<Database>>>,
}

impl Engine {
    /// A process with no databases yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `name` if it doesn't already exist (idempotent, spec.md §8:
    /// "CreateDb; CreateDb is equivalent to CreateDb").
    pub fn create_db(&self, name: &str) -> Arc<Database> {
        let sanitized = sanitize_db_name(name);
        let mut dbs = self.databases.write();
        dbs.entry(sanitized).or_insert_with(|| Arc::new(Database::new())).clone()
    }

    /// Remove `name` and all its in-memory state. Absent is success
    /// (spec.md §4.3 `DeleteDb` errors: "(none; absent = ok)").
    pub fn delete_db(&self, name: &str) {
        let sanitized = sanitize_db_name(name);
        self.databases.write().remove(&sanitized);
    }

    /// Fetch a handle to `name`'s database, if it exists.
    pub fn get_db(&self, name: &str) -> Option<Arc<Database>> {
        let sanitized = sanitize_db_name(name);
        self.databases.read().get(&sanitized).cloned()
    }

    /// Get-or-create; used by recovery, which must not fail just because a
    /// database directory predates the in-memory registry (spec.md §4.5
    /// recovery step 1: "create (or ensure) the in-memory database").
    pub fn ensure_db(&self, name: &str) -> Arc<Database> {
        self.create_db(name)
    }

    /// Every known database name, sorted.
    pub fn db_names(&self) -> Vec<String> {
        self.databases.read().keys().cloned().collect()
    }
}

//! The multi-database File Storage Engine: owns one [`FileEngineHandle`]
//! per database directory and runs recovery across all of them at
//! startup (spec.md §4.5 recovery protocol step 1: "for each
//! subdirectory of the data root").

use crate::config::StorageConfig;
use crate::handle::FileEngineHandle;
use parking_lot::RwLock;
use peacedb_core::{sanitize_db_name, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Owns every database this process serves, each backed by its own
/// directory under `config.data_root`.
pub struct FileStorageEngine {
    config: Arc<StorageConfig>,
    handles: RwLock<BTreeMap<String, Arc<FileEngineHandle>>>,
}

impl FileStorageEngine {
    /// Recover every existing database directory under `config.data_root`
    /// and return an engine ready to serve traffic.
    pub fn open(config: StorageConfig) -> Result<Self> {
        let config = Arc::new(config);
        std::fs::create_dir_all(&config.data_root)?;
        let mut handles = BTreeMap::new();
        let entries = std::fs::read_dir(&config.data_root)?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            info!(db = %name, "recovering database");
            let handle = Arc::new(FileEngineHandle::open(&name, config.clone())?);
            handles.insert(name, handle);
        }
        Ok(Self {
            config,
            handles: RwLock::new(handles),
        })
    }

    /// Create `name` if it doesn't already exist (idempotent, spec.md
    /// §4.3 `CreateDb`).
    pub fn create_db(&self, name: &str) -> Result<Arc<FileEngineHandle>> {
        let sanitized = sanitize_db_name(name);
        if let Some(existing) = self.handles.read().get(&sanitized) {
            return Ok(existing.clone());
        }
        let mut handles = self.handles.write();
        if let Some(existing) = handles.get(&sanitized) {
            return Ok(existing.clone());
        }
        let handle = Arc::new(FileEngineHandle::open(&sanitized, self.config.clone())?);
        handles.insert(sanitized, handle.clone());
        Ok(handle)
    }

    /// Remove `name`'s in-memory handle and its on-disk directory.
    /// Absent is success (spec.md §4.3 `DeleteDb`).
    pub fn delete_db(&self, name: &str) -> Result<()> {
        let sanitized = sanitize_db_name(name);
        self.handles.write().remove(&sanitized);
        let dir = self.config.data_root.join(&sanitized);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Fetch a handle to `name`'s database, if it exists.
    pub fn get_db(&self, name: &str) -> Option<Arc<FileEngineHandle>> {
        let sanitized = sanitize_db_name(name);
        self.handles.read().get(&sanitized).cloned()
    }

    /// Every known database name, sorted.
    pub fn db_names(&self) -> Vec<String> {
        self.handles.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peacedb_core::{Document, Value};
    use std::collections::BTreeMap as Map;

    fn sample_doc(id: &str) -> Document {
        let mut data = Map::new();
        data.insert("n".to_string(), Value::Int(1));
        Document {
            id: id.to_string(),
            rev: None,
            deleted: false,
            data,
            tags: vec![],
            content: None,
        }
    }

    #[test]
    fn create_then_reopen_recovers_data() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().to_path_buf();
        {
            let engine = FileStorageEngine::open(StorageConfig::new(&data_root)).unwrap();
            let db = engine.create_db("app").unwrap();
            db.post(sample_doc("a")).unwrap();
        }
        let engine = FileStorageEngine::open(StorageConfig::new(&data_root)).unwrap();
        let db = engine.get_db("app").unwrap();
        assert!(db.get("a", None).is_some());
    }

    #[test]
    fn delete_db_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileStorageEngine::open(StorageConfig::new(dir.path())).unwrap();
        engine.create_db("app").unwrap();
        engine.delete_db("app").unwrap();
        assert!(engine.get_db("app").is_none());
        assert!(!dir.path().join("app").exists());
    }

    #[test]
    fn delete_absent_db_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileStorageEngine::open(StorageConfig::new(dir.path())).unwrap();
        assert!(engine.delete_db("nope").is_ok());
    }
}

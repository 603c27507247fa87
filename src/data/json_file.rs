use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use super::{DataAccess, DataError, Entity, Filter, MemoryStore, Order, Record, RecordId};

/// Record store persisted as a single JSON file
///
/// Reads are served from memory. A mutation is applied to a copy, and the
/// copy replaces the in-memory state only once the file has been rewritten.
#[derive(Debug)]
pub struct JsonFileStore {
    inner: MemoryStore,
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        let inner = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let store: MemoryStore = serde_json::from_str(&content)?;
            debug!("Loaded record store from {path:?}");
            store
        } else {
            info!("Record store {path:?} not found, starting empty");
            MemoryStore::new()
        };
        Ok(Self { inner, path })
    }

    fn transact<T>(&mut self, op: impl FnOnce(&mut MemoryStore) -> Result<T, DataError>) -> Result<T, DataError> {
        let mut next = self.inner.clone();
        let value = op(&mut next)?;
        if let Err(e) = write_store(&self.path, &next) {
            error!("Failed to save record store {:?}: {}", self.path, e);
            return Err(e);
        }
        self.inner = next;
        Ok(value)
    }
}

fn write_store(path: &Path, store: &MemoryStore) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(store)?;
    fs::write(path, content)?;
    Ok(())
}

impl DataAccess for JsonFileStore {
    fn list(
        &self,
        entity: Entity,
        filter: &[Filter],
        fields: &[&str],
        order: Option<&Order>,
    ) -> Result<Vec<Record>, DataError> {
        self.inner.list(entity, filter, fields, order)
    }

    fn get(&self, entity: Entity, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>, DataError> {
        self.inner.get(entity, ids, fields)
    }

    fn create(&mut self, entity: Entity, fields: Record) -> Result<RecordId, DataError> {
        self.transact(|store| store.create(entity, fields))
    }

    fn update(&mut self, entity: Entity, ids: &[RecordId], fields: Record) -> Result<(), DataError> {
        self.transact(|store| store.update(entity, ids, fields))
    }

    fn delete(&mut self, entity: Entity, ids: &[RecordId]) -> Result<(), DataError> {
        self.transact(|store| store.delete(entity, ids))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::field_str;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let id = {
            let mut store = JsonFileStore::open(&path).unwrap();
            let fields = json!({"name": "SN-1", "scope_id": 3}).as_object().cloned().unwrap();
            store.create(Entity::Category, fields).unwrap()
        };

        let store = JsonFileStore::open(&path).unwrap();
        let records = store.get(Entity::Category, &[id], &["name"]).unwrap();
        assert_eq!(field_str(&records[0], "name"), Some("SN-1"));
    }

    #[test]
    fn ids_keep_increasing_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = JsonFileStore::open(&path)
            .unwrap()
            .create(Entity::Region, Record::new())
            .unwrap();
        let second = JsonFileStore::open(&path)
            .unwrap()
            .create(Entity::Region, Record::new())
            .unwrap();
        assert!(second > first);
    }

    #[test]
    fn failed_write_leaves_records_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        let kept = store.create(Entity::Category, Record::new()).unwrap();

        // a directory in place of the file makes every write fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(store.create(Entity::Category, Record::new()).is_err());
        assert!(store.delete(Entity::Category, &[kept]).is_err());
        let ids: Vec<_> = store
            .list(Entity::Category, &[], &[], None)
            .unwrap()
            .iter()
            .filter_map(crate::data::record_id)
            .collect();
        assert_eq!(ids, vec![kept]);
    }
}

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DataAccess, DataError, Entity, Filter, Order, Record, RecordId, project};

/// In-memory record store
///
/// Records are kept per entity in id order. Entities listed in `unavailable`
/// behave like tables the host has not provisioned yet.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    tables: BTreeMap<Entity, BTreeMap<RecordId, Record>>,
    next_id: RecordId,
    #[serde(skip)]
    unavailable: BTreeSet<Entity>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            next_id: 1,
            unavailable: BTreeSet::new(),
        }
    }

    /// Make every operation on `entity` fail as if the table did not exist
    #[must_use]
    pub fn without(mut self, entity: Entity) -> Self {
        self.unavailable.insert(entity);
        self
    }

    /// Number of records of an entity
    #[must_use]
    pub fn count(&self, entity: Entity) -> usize {
        self.tables.get(&entity).map_or(0, BTreeMap::len)
    }

    fn check(&self, entity: Entity) -> Result<(), DataError> {
        if self.unavailable.contains(&entity) {
            return Err(DataError::Unavailable(entity));
        }
        Ok(())
    }

    fn table_mut(&mut self, entity: Entity) -> &mut BTreeMap<RecordId, Record> {
        self.tables.entry(entity).or_default()
    }
}

impl DataAccess for MemoryStore {
    fn list(
        &self,
        entity: Entity,
        filter: &[Filter],
        fields: &[&str],
        order: Option<&Order>,
    ) -> Result<Vec<Record>, DataError> {
        self.check(entity)?;
        let Some(table) = self.tables.get(&entity) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<&Record> = table
            .values()
            .filter(|record| filter.iter().all(|f| f.matches(record)))
            .collect();
        if let Some(order) = order {
            records.sort_by(|a, b| order.compare(a, b));
        }

        Ok(records.into_iter().map(|r| project(r, fields)).collect())
    }

    fn get(&self, entity: Entity, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>, DataError> {
        self.check(entity)?;
        let table = self.tables.get(&entity);
        ids.iter()
            .map(|id| {
                table
                    .and_then(|t| t.get(id))
                    .map(|r| project(r, fields))
                    .ok_or(DataError::NotFound { entity, id: *id })
            })
            .collect()
    }

    fn create(&mut self, entity: Entity, mut fields: Record) -> Result<RecordId, DataError> {
        self.check(entity)?;
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        fields.insert("id".to_string(), Value::from(id));
        self.table_mut(entity).insert(id, fields);
        debug!("Created {entity} #{id}");
        Ok(id)
    }

    fn update(&mut self, entity: Entity, ids: &[RecordId], fields: Record) -> Result<(), DataError> {
        self.check(entity)?;
        let table = self.table_mut(entity);
        if let Some(missing) = ids.iter().find(|id| !table.contains_key(id)) {
            return Err(DataError::NotFound { entity, id: *missing });
        }
        for id in ids {
            if let Some(record) = table.get_mut(id) {
                for (key, value) in &fields {
                    if key != "id" {
                        record.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn delete(&mut self, entity: Entity, ids: &[RecordId]) -> Result<(), DataError> {
        self.check(entity)?;
        let table = self.table_mut(entity);
        for id in ids {
            table.remove(id);
        }
        debug!("Deleted {} {entity} record(s)", ids.len());
        Ok(())
    }
}

//! Category catalog ("sign types")
//!
//! An in-memory projection of the categories of one scope, refreshed from the
//! record store after every mutation. Colors are assigned from the palette by
//! list position, so they are stable for a given name ordering.

use std::collections::HashMap;

use log::{info, warn};
use serde_json::Value;

use crate::color::{Color, DEFAULT_PALETTE};
use crate::data::{
    DataAccess, Entity, Filter, Order, Record, RecordId, field_bool, field_f64, field_str, field_u64, record_id,
};
use crate::error::EngineError;

#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
    pub scope_id: Option<RecordId>,
    pub description: Option<String>,
    pub dimensions: Option<String>,
    pub length: f64,
    pub width: f64,
    pub has_window: bool,
    pub material: Option<String>,
    pub mounting: Option<String>,
    pub notes: Option<String>,
    pub quantity: u32,
    pub confirmed: bool,
    pub color: Color,
    pub region_count: usize,
}

impl Category {
    fn from_record(record: &Record, color: Color, region_count: usize) -> Option<Self> {
        let text = |field: &str| field_str(record, field).map(str::to_string);
        Some(Self {
            id: record_id(record)?,
            name: text("name").unwrap_or_default(),
            scope_id: field_u64(record, "scope_id"),
            description: text("description"),
            dimensions: text("dimensions"),
            length: field_f64(record, "length").unwrap_or(0.0),
            width: field_f64(record, "width").unwrap_or(0.0),
            has_window: field_bool(record, "has_window"),
            material: text("material"),
            mounting: text("mounting"),
            notes: text("notes"),
            quantity: field_u64(record, "quantity").map_or(0, |q| q.min(u64::from(u32::MAX)) as u32),
            confirmed: field_bool(record, "confirmed"),
            color,
            region_count,
        })
    }
}

/// User input for creating or editing a category
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
    pub dimensions: Option<String>,
    pub length: f64,
    pub width: f64,
    pub has_window: bool,
    pub material: Option<String>,
    pub mounting: Option<String>,
    pub notes: Option<String>,
    /// Defaults to 1 on create; left untouched on update when `None`
    pub quantity: Option<u32>,
    pub confirmed: bool,
}

impl CategoryDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copy the dimension fields of a matching category
    pub fn apply(&mut self, fill: &AutoFill) {
        if fill.dimensions.is_some() {
            self.dimensions = fill.dimensions.clone();
        }
        self.length = fill.length;
        self.width = fill.width;
        self.has_window = fill.has_window;
    }

    fn validated_name(&self) -> Result<String, EngineError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("category name must not be empty"));
        }
        Ok(name.to_string())
    }

    fn to_record(&self, name: String) -> Record {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map_or(Value::Bool(false), Value::from)
        };
        let mut record = Record::new();
        record.insert("name".into(), Value::from(name));
        record.insert("description".into(), text(&self.description));
        record.insert("dimensions".into(), text(&self.dimensions));
        record.insert("length".into(), Value::from(self.length));
        record.insert("width".into(), Value::from(self.width));
        record.insert("has_window".into(), Value::from(self.has_window));
        record.insert("material".into(), text(&self.material));
        record.insert("mounting".into(), text(&self.mounting));
        record.insert("notes".into(), text(&self.notes));
        record.insert("confirmed".into(), Value::from(self.confirmed));
        if let Some(quantity) = self.quantity {
            record.insert("quantity".into(), Value::from(quantity));
        }
        record
    }
}

/// Dimension attributes borrowed from an existing category with the same name
#[derive(Clone, Debug, PartialEq)]
pub struct AutoFill {
    pub source_id: RecordId,
    pub dimensions: Option<String>,
    pub length: f64,
    pub width: f64,
    pub has_window: bool,
}

#[derive(Debug)]
pub struct CategoryCatalog {
    scope_id: Option<RecordId>,
    categories: Vec<Category>,
    palette: Vec<Color>,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PALETTE.to_vec())
    }
}

impl CategoryCatalog {
    #[must_use]
    pub fn new(palette: Vec<Color>) -> Self {
        Self {
            scope_id: None,
            categories: Vec::new(),
            palette,
        }
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn scope_id(&self) -> Option<RecordId> {
        self.scope_id
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Display color of a category, the default highlight when unknown
    #[must_use]
    pub fn color_of(&self, id: RecordId) -> Color {
        self.get(id).map(|c| c.color).unwrap_or_default()
    }

    /// Load the categories of `scope_id` (all categories when `None`) ordered
    /// by name. Storage failures leave the catalog empty.
    pub fn list(&mut self, data: &dyn DataAccess, scope_id: Option<RecordId>) -> &[Category] {
        self.scope_id = scope_id;
        let filter: Vec<Filter> = scope_id.map(|id| Filter::eq("scope_id", id)).into_iter().collect();

        let records = match data.list(Entity::Category, &filter, &[], Some(&Order::asc("name"))) {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not load categories: {e}");
                self.categories.clear();
                return &self.categories;
            }
        };

        let ids: Vec<RecordId> = records.iter().filter_map(record_id).collect();
        let counts = region_counts(data, &ids);

        self.categories = records
            .iter()
            .filter_map(|record| {
                let id = record_id(record)?;
                Some((record, counts.get(&id).copied().unwrap_or(0)))
            })
            .enumerate()
            .filter_map(|(index, (record, count))| {
                Category::from_record(record, Color::from_palette(&self.palette, index), count)
            })
            .collect();
        &self.categories
    }

    /// Reload the current scope
    pub fn refresh(&mut self, data: &dyn DataAccess) {
        self.list(data, self.scope_id);
    }

    pub fn create(&mut self, data: &mut dyn DataAccess, draft: &CategoryDraft) -> Result<RecordId, EngineError> {
        let name = draft.validated_name()?;
        let mut record = draft.to_record(name.clone());
        record
            .entry("quantity")
            .or_insert_with(|| Value::from(1u32));
        if let Some(scope_id) = self.scope_id {
            record.insert("scope_id".into(), Value::from(scope_id));
        }

        let id = data.create(Entity::Category, record)?;
        info!("Created category #{id} '{name}'");
        self.refresh(data);
        Ok(id)
    }

    pub fn update(&mut self, data: &mut dyn DataAccess, id: RecordId, draft: &CategoryDraft) -> Result<(), EngineError> {
        let name = draft.validated_name()?;
        data.update(Entity::Category, &[id], draft.to_record(name))?;
        info!("Updated category #{id}");
        self.refresh(data);
        Ok(())
    }

    /// Delete a category together with the regions that reference it
    pub fn delete(&mut self, data: &mut dyn DataAccess, id: RecordId) -> Result<usize, EngineError> {
        let regions: Vec<RecordId> = data
            .list(Entity::Region, &[Filter::eq("category_id", id)], &["category_id"], None)?
            .iter()
            .filter_map(record_id)
            .collect();
        if !regions.is_empty() {
            data.delete(Entity::Region, &regions)?;
        }
        data.delete(Entity::Category, &[id])?;
        info!("Deleted category #{id} and {} region(s)", regions.len());
        self.refresh(data);
        Ok(regions.len())
    }

    /// Case-insensitive lookup of a category by trimmed name
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Category> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.categories.iter().find(|c| c.name.to_lowercase() == wanted)
    }

    /// Dimension fields to pre-fill when a typed name matches an existing category
    #[must_use]
    pub fn auto_fill(&self, name: &str) -> Option<AutoFill> {
        self.find_by_name(name).map(|c| AutoFill {
            source_id: c.id,
            dimensions: c.dimensions.clone(),
            length: c.length,
            width: c.width,
            has_window: c.has_window,
        })
    }

    pub fn increment_quantity(&mut self, data: &mut dyn DataAccess, id: RecordId) -> Result<u32, EngineError> {
        let current = self.quantity_of(id)?;
        self.set_quantity(data, id, current.saturating_add(1))
    }

    /// Decrease by one; a quantity of zero stays zero without touching storage
    pub fn decrement_quantity(&mut self, data: &mut dyn DataAccess, id: RecordId) -> Result<u32, EngineError> {
        let current = self.quantity_of(id)?;
        if current == 0 {
            return Ok(0);
        }
        self.set_quantity(data, id, current - 1)
    }

    /// Sum of quantities over the loaded scope
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.categories.iter().map(|c| u64::from(c.quantity)).sum()
    }

    fn quantity_of(&self, id: RecordId) -> Result<u32, EngineError> {
        self.get(id)
            .map(|c| c.quantity)
            .ok_or_else(|| EngineError::validation(format!("unknown category #{id}")))
    }

    fn set_quantity(&mut self, data: &mut dyn DataAccess, id: RecordId, quantity: u32) -> Result<u32, EngineError> {
        let mut record = Record::new();
        record.insert("quantity".into(), Value::from(quantity));
        data.update(Entity::Category, &[id], record)?;
        if let Some(category) = self.categories.iter_mut().find(|c| c.id == id) {
            category.quantity = quantity;
        }
        Ok(quantity)
    }
}

/// Regions per category; failures count as zero
fn region_counts(data: &dyn DataAccess, ids: &[RecordId]) -> HashMap<RecordId, usize> {
    let mut counts = HashMap::new();
    if ids.is_empty() {
        return counts;
    }
    match data.list(
        Entity::Region,
        &[Filter::any_of("category_id", ids.iter().copied())],
        &["category_id"],
        None,
    ) {
        Ok(records) => {
            for id in records.iter().filter_map(|r| field_u64(r, "category_id")) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        Err(e) => warn!("Could not count regions: {e}"),
    }
    counts
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::MemoryStore;

    fn scoped(data: &MemoryStore) -> CategoryCatalog {
        let mut catalog = CategoryCatalog::default();
        catalog.list(data, Some(5));
        catalog
    }

    #[test]
    fn list_orders_by_name_and_assigns_palette() {
        let mut data = MemoryStore::new();
        let mut catalog = scoped(&data);
        for name in ["SN-3", "sn-1", "SN-2"] {
            catalog.create(&mut data, &CategoryDraft::named(name)).unwrap();
        }

        let names: Vec<_> = catalog.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sn-1", "SN-2", "SN-3"]);
        assert_eq!(catalog.categories()[1].color, DEFAULT_PALETTE[1]);
        assert!(catalog.categories().iter().all(|c| c.quantity == 1));
    }

    #[test]
    fn other_scopes_are_hidden() {
        let mut data = MemoryStore::new();
        data.create(Entity::Category, json!({"name": "X", "scope_id": 9}).as_object().cloned().unwrap())
            .unwrap();
        let catalog = scoped(&data);
        assert!(catalog.categories().is_empty());
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut data = MemoryStore::new();
        let mut catalog = scoped(&data);
        let err = catalog.create(&mut data, &CategoryDraft::named("   ")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(data.count(Entity::Category), 0);
    }

    #[test]
    fn region_counts_are_aggregated() {
        let mut data = MemoryStore::new();
        let mut catalog = scoped(&data);
        let id = catalog.create(&mut data, &CategoryDraft::named("SN-1")).unwrap();
        for _ in 0..2 {
            data.create(Entity::Region, json!({"category_id": id}).as_object().cloned().unwrap())
                .unwrap();
        }
        catalog.refresh(&data);
        assert_eq!(catalog.get(id).unwrap().region_count, 2);
    }

    #[test]
    fn delete_cascades_to_regions() {
        let mut data = MemoryStore::new();
        let mut catalog = scoped(&data);
        let id = catalog.create(&mut data, &CategoryDraft::named("SN-1")).unwrap();
        data.create(Entity::Region, json!({"category_id": id}).as_object().cloned().unwrap())
            .unwrap();

        assert_eq!(catalog.delete(&mut data, id).unwrap(), 1);
        assert_eq!(data.count(Entity::Region), 0);
        assert!(catalog.categories().is_empty());
    }

    #[test]
    fn auto_fill_is_case_insensitive() {
        let mut data = MemoryStore::new();
        let mut catalog = scoped(&data);
        let draft = CategoryDraft {
            name: "Room ID".into(),
            length: 8.0,
            width: 6.0,
            has_window: true,
            ..CategoryDraft::default()
        };
        catalog.create(&mut data, &draft).unwrap();

        let fill = catalog.auto_fill("  room id ").unwrap();
        assert_eq!((fill.length, fill.width, fill.has_window), (8.0, 6.0, true));
        assert!(catalog.auto_fill("lobby").is_none());

        let mut typed = CategoryDraft::named("ROOM ID");
        typed.apply(&fill);
        assert!(typed.has_window);
    }

    #[test]
    fn quantity_never_goes_negative() {
        let mut data = MemoryStore::new();
        let mut catalog = scoped(&data);
        let id = catalog.create(&mut data, &CategoryDraft::named("SN-1")).unwrap();

        assert_eq!(catalog.increment_quantity(&mut data, id).unwrap(), 2);
        assert_eq!(catalog.decrement_quantity(&mut data, id).unwrap(), 1);
        assert_eq!(catalog.decrement_quantity(&mut data, id).unwrap(), 0);
        assert_eq!(catalog.decrement_quantity(&mut data, id).unwrap(), 0);
        assert_eq!(catalog.total_quantity(), 0);
    }

    #[test]
    fn total_sums_quantities() {
        let mut data = MemoryStore::new();
        let mut catalog = scoped(&data);
        let a = catalog.create(&mut data, &CategoryDraft::named("A")).unwrap();
        catalog.create(&mut data, &CategoryDraft::named("B")).unwrap();
        catalog.increment_quantity(&mut data, a).unwrap();
        assert_eq!(catalog.total_quantity(), 3);
    }

    #[test]
    fn unavailable_store_lists_nothing() {
        let data = MemoryStore::new().without(Entity::Category);
        let mut catalog = CategoryCatalog::default();
        assert!(catalog.list(&data, None).is_empty());
    }
}

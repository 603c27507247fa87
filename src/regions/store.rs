use std::collections::HashMap;

use chrono::Utc;
use log::{debug, info, warn};

use super::model::{PendingRegion, Region};
use crate::color::Color;
use crate::data::{DataAccess, Entity, Filter, Order, RecordId, field_str, record_id};
use crate::error::EngineError;
use crate::geometry::NormPoint;

/// Radius of the delete glyph hot-zone, normalized
pub const DELETE_HOT_ZONE_RADIUS: f64 = 0.02;
/// Point regions are hit within this distance, normalized
pub const POINT_HIT_RADIUS: f64 = 0.03;

/// Result of a click on the overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    /// The selected region's delete glyph was hit
    Delete(RecordId),
    Select(RecordId),
    /// The already-selected region was hit again
    Deselect(RecordId),
    Miss,
}

/// Regions of the page currently on screen
#[derive(Debug, Default)]
pub struct RegionStore {
    attachment_id: Option<RecordId>,
    page: usize,
    regions: Vec<Region>,
    selected: Option<RecordId>,
}

impl RegionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the regions of one page. Storage failures leave the page empty.
    pub fn load(&mut self, data: &dyn DataAccess, attachment_id: RecordId, page: usize) {
        if self.attachment_id != Some(attachment_id) || self.page != page {
            self.selected = None;
        }
        self.attachment_id = Some(attachment_id);
        self.page = page;

        let filter = [
            Filter::eq("attachment_id", attachment_id),
            Filter::eq("page_number", page as u64),
        ];
        self.regions = match data.list(Entity::Region, &filter, &[], Some(&Order::asc("id"))) {
            Ok(records) => records.iter().filter_map(Region::from_record).collect(),
            Err(e) => {
                warn!("Could not load regions for document {attachment_id} page {page}: {e}");
                Vec::new()
            }
        };
        self.attach_category_names(data);

        if let Some(selected) = self.selected {
            if !self.regions.iter().any(|r| r.id == selected) {
                self.selected = None;
            }
        }
        debug!(
            "Loaded {} region(s) for document {attachment_id} page {page}",
            self.regions.len()
        );
    }

    /// Reload whatever page is currently bound
    pub fn reload(&mut self, data: &dyn DataAccess) {
        if let Some(attachment_id) = self.attachment_id {
            self.load(data, attachment_id, self.page);
        }
    }

    /// Forget the bound page (document closed)
    pub fn unbind(&mut self) {
        self.attachment_id = None;
        self.page = 0;
        self.regions.clear();
        self.selected = None;
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn regions_mut(&mut self) -> &mut [Region] {
        &mut self.regions
    }

    #[must_use]
    pub fn region(&self, id: RecordId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn selected(&self) -> Option<RecordId> {
        self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Persist `pending` under `category_id` and reload the page
    pub fn create(
        &mut self,
        data: &mut dyn DataAccess,
        pending: &PendingRegion,
        category_id: RecordId,
        color: Color,
        note: Option<&str>,
    ) -> Result<RecordId, EngineError> {
        let record = Region::new_record(pending, category_id, color, note, Utc::now());
        let id = data.create(Entity::Region, record)?;
        info!(
            "Created region #{id} on document {} page {}",
            pending.attachment_id, pending.page
        );
        self.reload(data);
        Ok(id)
    }

    /// Classify a click without changing the selection
    #[must_use]
    pub fn hit_test(&self, point: NormPoint) -> Hit {
        if let Some(selected) = self.selected.and_then(|id| self.region(id)) {
            if selected.delete_handle.is_some_and(|h| h.contains(point)) {
                return Hit::Delete(selected.id);
            }
        }

        match self
            .regions
            .iter()
            .find(|r| r.geometry.contains(point, POINT_HIT_RADIUS))
        {
            Some(region) if self.selected == Some(region.id) => Hit::Deselect(region.id),
            Some(region) => Hit::Select(region.id),
            None => Hit::Miss,
        }
    }

    /// Hit test and apply the selection change. A miss clears the selection.
    pub fn click(&mut self, point: NormPoint) -> Hit {
        let hit = self.hit_test(point);
        match hit {
            Hit::Select(id) => self.selected = Some(id),
            Hit::Deselect(_) | Hit::Miss => self.selected = None,
            Hit::Delete(_) => {}
        }
        hit
    }

    /// Delete a region, clearing the selection if it pointed at it
    pub fn delete(&mut self, data: &mut dyn DataAccess, id: RecordId) -> Result<(), EngineError> {
        data.delete(Entity::Region, &[id])?;
        info!("Deleted region #{id}");
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.reload(data);
        Ok(())
    }

    fn attach_category_names(&mut self, data: &dyn DataAccess) {
        let mut ids: Vec<RecordId> = self.regions.iter().filter_map(|r| r.category_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return;
        }

        let names: HashMap<RecordId, String> = match data.list(
            Entity::Category,
            &[Filter::any_of("id", ids)],
            &["name"],
            None,
        ) {
            Ok(records) => records
                .iter()
                .filter_map(|r| Some((record_id(r)?, field_str(r, "name")?.to_string())))
                .collect(),
            Err(e) => {
                debug!("Category names unavailable: {e}");
                return;
            }
        };
        for region in &mut self.regions {
            region.category_name = region.category_id.and_then(|id| names.get(&id).cloned());
        }
    }
}

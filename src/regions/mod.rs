//! Persisted regions, hit-testing and their overlay

mod model;
mod overlay;
mod store;

pub use model::{DeleteHandle, Geometry, PendingRegion, Region};
pub use overlay::{FILL_ALPHA, OverlayReport, OverlayRenderer, POINT_GLYPH_OFFSET, POINT_RADIUS_PX, glyph_center};
pub use store::{DELETE_HOT_ZONE_RADIUS, Hit, POINT_HIT_RADIUS, RegionStore};

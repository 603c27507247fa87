//! Region highlight overlay

use image::Rgba;
use log::trace;

use super::model::{DeleteHandle, Geometry, Region};
use super::store::DELETE_HOT_ZONE_RADIUS;
use crate::color::{Color, DEFAULT_HIGHLIGHT};
use crate::data::RecordId;
use crate::geometry::NormPoint;
use crate::render::Surface;

/// Fill translucency for region highlights
pub const FILL_ALPHA: u8 = 0x66;
/// Radius of a point marker in pixels
pub const POINT_RADIUS_PX: f32 = 20.0;
/// Outline width of the selected region and the capture preview
pub const STROKE_WIDTH: f32 = 3.0;
/// Where the delete glyph sits relative to a point marker
pub const POINT_GLYPH_OFFSET: (f64, f64) = (0.025, -0.025);

const GLYPH_FILL: Rgba<u8> = Rgba([0xDC, 0x26, 0x26, 0xFF]);
const GLYPH_MARK: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);

/// What the last overlay pass drew
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OverlayReport {
    pub drawn: usize,
    /// Center of the delete glyph, if one was drawn
    pub affordance: Option<NormPoint>,
}

#[derive(Clone, Copy, Debug)]
pub struct OverlayRenderer {
    pub fill_alpha: u8,
    pub point_radius_px: f32,
    pub stroke_width: f32,
    pub preview_color: Color,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            fill_alpha: FILL_ALPHA,
            point_radius_px: POINT_RADIUS_PX,
            stroke_width: STROKE_WIDTH,
            preview_color: DEFAULT_HIGHLIGHT,
        }
    }
}

impl OverlayRenderer {
    /// Repaint the overlay: every region, the selected region's delete glyph
    /// and the in-progress capture path. Delete handles of unselected regions
    /// are cleared so stale glyphs can never be hit.
    pub fn render(
        &self,
        overlay: &mut Surface,
        regions: &mut [Region],
        selected: Option<RecordId>,
        preview: Option<&[NormPoint]>,
    ) -> OverlayReport {
        overlay.clear();
        let mut report = OverlayReport::default();

        for region in regions.iter_mut() {
            region.delete_handle = None;
            self.draw_region(overlay, region);
            report.drawn += 1;

            if selected == Some(region.id) {
                self.outline(overlay, region);
                let center = glyph_center(&region.geometry);
                self.draw_glyph(overlay, center);
                region.delete_handle = Some(DeleteHandle {
                    center,
                    radius: DELETE_HOT_ZONE_RADIUS,
                });
                report.affordance = Some(center);
            }
        }

        if let Some(path) = preview.filter(|p| !p.is_empty()) {
            let color = self.preview_color.with_alpha(0xFF);
            overlay.stroke_path(path, false, self.stroke_width, color);
            if path.len() >= 3 {
                overlay.fill_polygon(path, self.preview_color.with_alpha(self.fill_alpha / 2));
            }
        }

        trace!("Overlay repainted: {report:?}");
        report
    }

    fn draw_region(&self, overlay: &mut Surface, region: &Region) {
        let fill = region.color.with_alpha(self.fill_alpha);
        match &region.geometry {
            Geometry::Polygon(vertices) => overlay.fill_polygon(vertices, fill),
            Geometry::Point(p) => {
                let (x, y) = p.to_pixels(overlay.width(), overlay.height());
                overlay.fill_circle(x, y, self.point_radius_px, fill);
            }
        }
    }

    fn outline(&self, overlay: &mut Surface, region: &Region) {
        let stroke = region.color.with_alpha(0xFF);
        if let Geometry::Polygon(vertices) = &region.geometry {
            overlay.stroke_path(vertices, true, self.stroke_width, stroke);
        }
    }

    fn draw_glyph(&self, overlay: &mut Surface, center: NormPoint) {
        let (width, height) = overlay.dimensions();
        let (cx, cy) = center.to_pixels(width, height);
        let radius = (DELETE_HOT_ZONE_RADIUS * f64::from(width.min(height))).max(6.0) as f32;
        overlay.fill_circle(cx, cy, radius, GLYPH_FILL);

        let arm = radius * 0.5;
        overlay.draw_line((cx - arm, cy - arm), (cx + arm, cy + arm), 2.0, GLYPH_MARK);
        overlay.draw_line((cx - arm, cy + arm), (cx + arm, cy - arm), 2.0, GLYPH_MARK);
    }
}

/// Top-right of the bounding box for polygons, a fixed offset for points
#[must_use]
pub fn glyph_center(geometry: &Geometry) -> NormPoint {
    match geometry {
        Geometry::Point(p) => NormPoint::new(p.x + POINT_GLYPH_OFFSET.0, p.y + POINT_GLYPH_OFFSET.1).clamped(),
        Geometry::Polygon(_) => geometry
            .bounds()
            .map(|b| b.top_right())
            .unwrap_or_else(|| geometry.anchor()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: RecordId, geometry: Geometry) -> Region {
        Region {
            id,
            attachment_id: 1,
            page: 1,
            geometry,
            color: Color::rgb(0x3B, 0x82, 0xF6),
            category_id: None,
            category_name: None,
            note: None,
            created_at: None,
            delete_handle: None,
        }
    }

    fn square() -> Geometry {
        Geometry::Polygon(vec![
            NormPoint::new(0.2, 0.2),
            NormPoint::new(0.2, 0.6),
            NormPoint::new(0.6, 0.6),
            NormPoint::new(0.6, 0.2),
        ])
    }

    #[test]
    fn fills_regions_translucently() {
        let mut overlay = Surface::attached(100, 100);
        let mut regions = vec![region(1, square())];
        let report = OverlayRenderer::default().render(&mut overlay, &mut regions, None, None);

        assert_eq!(report.drawn, 1);
        assert_eq!(report.affordance, None);
        let fill = overlay.pixel(40, 40).unwrap();
        assert_eq!(fill[3], FILL_ALPHA);
        assert!(fill.0[..3].iter().zip([0x3B, 0x82, 0xF6]).all(|(a, e)| a.abs_diff(e) <= 2));
        assert_eq!(overlay.pixel(90, 90), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn selected_polygon_gets_glyph_at_top_right() {
        let mut overlay = Surface::attached(100, 100);
        let mut regions = vec![region(1, square())];
        let report = OverlayRenderer::default().render(&mut overlay, &mut regions, Some(1), None);

        assert_eq!(report.affordance, Some(NormPoint::new(0.6, 0.2)));
        assert_eq!(regions[0].delete_handle.map(|h| h.center), Some(NormPoint::new(0.6, 0.2)));
        assert_eq!(overlay.pixel(60, 20).map(|p| p[3]), Some(0xFF));
    }

    #[test]
    fn point_glyph_is_offset() {
        let center = glyph_center(&Geometry::Point(NormPoint::new(0.5, 0.5)));
        assert!((center.x - 0.525).abs() < 1e-9);
        assert!((center.y - 0.475).abs() < 1e-9);
    }

    #[test]
    fn deselecting_clears_stale_handles() {
        let mut overlay = Surface::attached(50, 50);
        let mut regions = vec![region(1, square())];
        let renderer = OverlayRenderer::default();
        renderer.render(&mut overlay, &mut regions, Some(1), None);
        renderer.render(&mut overlay, &mut regions, None, None);
        assert!(regions[0].delete_handle.is_none());
    }
}

//! Normalized page geometry
//!
//! Every region coordinate lives in `[0, 1]²` relative to the page's intrinsic
//! size, so the same numbers stay valid at any zoom or container width.

use serde::{Deserialize, Serialize};

/// A point in normalized page space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    pub x: f64,
    pub y: f64,
}

impl NormPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert a surface pixel position into normalized space.
    ///
    /// Returns `None` when the surface has no area yet.
    #[must_use]
    pub fn from_pixels(px: f32, py: f32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(
            Self::new(
                f64::from(px) / f64::from(width),
                f64::from(py) / f64::from(height),
            )
            .clamped(),
        )
    }

    /// Project back onto a surface of the given pixel size
    #[must_use]
    pub fn to_pixels(self, width: u32, height: u32) -> (f32, f32) {
        (
            (self.x * f64::from(width)) as f32,
            (self.y * f64::from(height)) as f32,
        )
    }

    /// Clamp both axes into the unit square
    #[must_use]
    pub fn clamped(self) -> Self {
        Self::new(self.x.clamp(0.0, 1.0), self.y.clamp(0.0, 1.0))
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounds in normalized space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Top-right corner (y grows downward, as on the page)
    #[must_use]
    pub fn top_right(&self) -> NormPoint {
        NormPoint::new(self.max_x, self.min_y)
    }

    #[must_use]
    pub fn contains(&self, point: NormPoint) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Bounding box of a point set, `None` for an empty set
#[must_use]
pub fn bounding_box(points: &[NormPoint]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut bounds = BoundingBox {
        min_x: first.x,
        min_y: first.y,
        max_x: first.x,
        max_y: first.y,
    };
    for point in points.iter().skip(1) {
        bounds.min_x = bounds.min_x.min(point.x);
        bounds.min_y = bounds.min_y.min(point.y);
        bounds.max_x = bounds.max_x.max(point.x);
        bounds.max_y = bounds.max_y.max(point.y);
    }
    Some(bounds)
}

/// Arithmetic mean of the vertices
#[must_use]
pub fn centroid(points: &[NormPoint]) -> Option<NormPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(NormPoint::new(sx / n, sy / n))
}

/// Even-odd ray casting against the closed polygon described by `vertices`.
///
/// Fewer than three vertices never contain anything.
#[must_use]
pub fn polygon_contains(vertices: &[NormPoint], point: NormPoint) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[j];
        if (a.y > point.y) != (b.y > point.y) {
            let cross_x = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<NormPoint> {
        vec![
            NormPoint::new(0.1, 0.1),
            NormPoint::new(0.1, 0.3),
            NormPoint::new(0.3, 0.3),
            NormPoint::new(0.3, 0.1),
        ]
    }

    #[test]
    fn centroid_of_square() {
        let c = centroid(&square()).unwrap();
        assert!((c.x - 0.2).abs() < 1e-9);
        assert!((c.y - 0.2).abs() < 1e-9);
    }

    #[test]
    fn centroid_of_nothing() {
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn polygon_contains_centroid_not_far_point() {
        let poly = square();
        let c = centroid(&poly).unwrap();
        assert!(polygon_contains(&poly, c));
        assert!(!polygon_contains(&poly, NormPoint::new(0.9, 0.9)));
    }

    #[test]
    fn concave_polygon_notch_is_outside() {
        // U shape opening upward
        let poly = vec![
            NormPoint::new(0.0, 0.0),
            NormPoint::new(0.2, 0.0),
            NormPoint::new(0.2, 0.6),
            NormPoint::new(0.4, 0.6),
            NormPoint::new(0.4, 0.0),
            NormPoint::new(0.6, 0.0),
            NormPoint::new(0.6, 1.0),
            NormPoint::new(0.0, 1.0),
        ];
        assert!(!polygon_contains(&poly, NormPoint::new(0.3, 0.3)));
        assert!(polygon_contains(&poly, NormPoint::new(0.1, 0.3)));
        assert!(polygon_contains(&poly, NormPoint::new(0.3, 0.8)));
    }

    #[test]
    fn collinear_polygon_contains_nothing() {
        let line = vec![
            NormPoint::new(0.1, 0.1),
            NormPoint::new(0.2, 0.2),
            NormPoint::new(0.3, 0.3),
        ];
        assert!(!polygon_contains(&line, NormPoint::new(0.2, 0.2)));
    }

    #[test]
    fn bounding_box_top_right() {
        let bounds = bounding_box(&square()).unwrap();
        assert_eq!(bounds.top_right(), NormPoint::new(0.3, 0.1));
        assert!(bounds.contains(NormPoint::new(0.2, 0.2)));
    }

    #[test]
    fn from_pixels_clamps_and_rejects_empty_surface() {
        assert!(NormPoint::from_pixels(10.0, 10.0, 0, 100).is_none());
        let p = NormPoint::from_pixels(250.0, -5.0, 200, 100).unwrap();
        assert_eq!(p, NormPoint::new(1.0, 0.0));
    }
}

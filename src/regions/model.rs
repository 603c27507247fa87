use chrono::{DateTime, Utc};
use log::warn;
use serde_json::Value;

use crate::color::Color;
use crate::data::{Record, RecordId, field_f64, field_str, field_u64, record_id};
use crate::geometry::{self, BoundingBox, NormPoint};

/// Shape of a region in normalized page space
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// Legacy single-point marker
    Point(NormPoint),
    /// Closed polygon of three or more vertices
    Polygon(Vec<NormPoint>),
}

impl Geometry {
    /// Polygon from a captured path, `None` when it has fewer than 3 points
    #[must_use]
    pub fn polygon(points: Vec<NormPoint>) -> Option<Self> {
        (points.len() >= 3).then_some(Self::Polygon(points))
    }

    /// The point stored alongside the shape: the point itself or the vertex mean
    #[must_use]
    pub fn anchor(&self) -> NormPoint {
        match self {
            Self::Point(p) => *p,
            Self::Polygon(vertices) => geometry::centroid(vertices).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Self::Point(p) => geometry::bounding_box(std::slice::from_ref(p)),
            Self::Polygon(vertices) => geometry::bounding_box(vertices),
        }
    }

    /// Hit test: even-odd for polygons, distance below `point_radius` for points
    #[must_use]
    pub fn contains(&self, point: NormPoint, point_radius: f64) -> bool {
        match self {
            Self::Point(p) => p.distance_to(point) < point_radius,
            Self::Polygon(vertices) => geometry::polygon_contains(vertices, point),
        }
    }

    #[must_use]
    pub fn is_polygon(&self) -> bool {
        matches!(self, Self::Polygon(_))
    }
}

/// A captured region that has not been assigned a category yet. It has no
/// identity until persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRegion {
    pub attachment_id: RecordId,
    pub page: usize,
    pub geometry: Geometry,
}

/// Circle around the delete glyph of the selected region
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeleteHandle {
    pub center: NormPoint,
    pub radius: f64,
}

impl DeleteHandle {
    #[must_use]
    pub fn contains(&self, point: NormPoint) -> bool {
        self.center.distance_to(point) <= self.radius
    }
}

/// A persisted region
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub id: RecordId,
    pub attachment_id: RecordId,
    pub page: usize,
    pub geometry: Geometry,
    pub color: Color,
    pub category_id: Option<RecordId>,
    pub category_name: Option<String>,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the overlay renderer while this region is selected
    pub delete_handle: Option<DeleteHandle>,
}

impl Region {
    /// Build from a stored record. Records without usable geometry are skipped.
    #[must_use]
    pub fn from_record(record: &Record) -> Option<Self> {
        let id = record_id(record)?;
        let geometry = match parse_path(record.get("path_data")) {
            Some(path) => Geometry::Polygon(path),
            None => {
                let x = field_f64(record, "x_position");
                let y = field_f64(record, "y_position");
                match (x, y) {
                    (Some(x), Some(y)) => Geometry::Point(NormPoint::new(x, y)),
                    _ => {
                        warn!("Region #{id} has no usable geometry; skipped");
                        return None;
                    }
                }
            }
        };

        Some(Self {
            id,
            attachment_id: field_u64(record, "attachment_id").unwrap_or_default(),
            page: field_u64(record, "page_number").map_or(1, |p| p.max(1) as usize),
            geometry,
            color: field_str(record, "highlight_color")
                .and_then(Color::parse_hex)
                .unwrap_or_default(),
            category_id: field_u64(record, "category_id"),
            category_name: None,
            note: field_str(record, "note").map(str::to_string),
            created_at: field_str(record, "created_at")
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            delete_handle: None,
        })
    }

    /// Record fields for persisting `pending` under `category_id`
    #[must_use]
    pub fn new_record(
        pending: &PendingRegion,
        category_id: RecordId,
        color: Color,
        note: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Record {
        let anchor = pending.geometry.anchor();
        let mut record = Record::new();
        record.insert("attachment_id".into(), Value::from(pending.attachment_id));
        record.insert("page_number".into(), Value::from(pending.page as u64));
        record.insert("x_position".into(), Value::from(anchor.x));
        record.insert("y_position".into(), Value::from(anchor.y));
        record.insert(
            "path_data".into(),
            match &pending.geometry {
                Geometry::Polygon(vertices) => Value::from(encode_path(vertices)),
                Geometry::Point(_) => Value::Bool(false),
            },
        );
        record.insert("highlight_color".into(), Value::from(color.to_hex()));
        record.insert("category_id".into(), Value::from(category_id));
        record.insert(
            "note".into(),
            note.filter(|n| !n.trim().is_empty())
                .map_or(Value::Bool(false), |n| Value::from(n.trim())),
        );
        record.insert("created_at".into(), Value::from(created_at.to_rfc3339()));
        record
    }
}

/// `path_data` is a JSON text of `[{"x":..,"y":..}, ...]`
fn parse_path(value: Option<&Value>) -> Option<Vec<NormPoint>> {
    let text = value?.as_str()?;
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Vec<NormPoint>>(text) {
        Ok(points) if points.len() >= 3 => Some(points),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring malformed path_data: {e}");
            None
        }
    }
}

fn encode_path(vertices: &[NormPoint]) -> String {
    serde_json::to_string(vertices).unwrap_or_else(|_| "[]".to_string())
}

//! Region capture gestures
//!
//! A small state machine turning pointer input on the page surface into a
//! [`PendingRegion`]. Lasso mode collects a freeform path; point mode drops a
//! single marker on press.

use log::debug;

use crate::data::RecordId;
use crate::events::{PointerEvent, PointerKind};
use crate::geometry::NormPoint;
use crate::regions::{Geometry, PendingRegion};

/// Minimum spacing between accepted move samples
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureMode {
    /// Pointer input selects regions instead of drawing
    #[default]
    Off,
    Point,
    Lasso,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum CaptureState {
    #[default]
    Idle,
    Drawing {
        path: Vec<NormPoint>,
        last_sample_ms: u64,
    },
    PendingAssignment(PendingRegion),
}

/// What a pointer event did to the capture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Not consumed by the capture
    Ignored,
    Started,
    Sampled,
    /// Move arrived inside the sample interval
    Throttled,
    /// Gesture ended with too few points
    Discarded,
    /// A region is waiting for its category
    Pending,
}

impl CaptureEvent {
    /// True when the overlay preview changed
    #[must_use]
    pub fn needs_redraw(self) -> bool {
        !matches!(self, Self::Ignored | Self::Throttled)
    }
}

#[derive(Debug)]
pub struct RegionCapture {
    mode: CaptureMode,
    state: CaptureState,
    attachment_id: Option<RecordId>,
    page: usize,
    dimensions: (u32, u32),
    sample_interval_ms: u64,
}

impl Default for RegionCapture {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL_MS)
    }
}

impl RegionCapture {
    #[must_use]
    pub fn new(sample_interval_ms: u64) -> Self {
        Self {
            mode: CaptureMode::Off,
            state: CaptureState::Idle,
            attachment_id: None,
            page: 1,
            dimensions: (0, 0),
            sample_interval_ms,
        }
    }

    #[must_use]
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    #[must_use]
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, CaptureState::Idle)
    }

    /// Switching mode abandons an unfinished drawing, never a pending region
    pub fn set_mode(&mut self, mode: CaptureMode) {
        if self.mode != mode && matches!(self.state, CaptureState::Drawing { .. }) {
            self.state = CaptureState::Idle;
        }
        self.mode = mode;
    }

    /// Point the capture at a document page. Moving to another page abandons
    /// any gesture in progress.
    pub fn bind(&mut self, attachment_id: RecordId, page: usize) {
        if self.attachment_id != Some(attachment_id) || self.page != page {
            self.cancel();
        }
        self.attachment_id = Some(attachment_id);
        self.page = page;
    }

    pub fn unbind(&mut self) {
        self.cancel();
        self.attachment_id = None;
    }

    /// Track the size of the surface pointer coordinates refer to
    pub fn sync_dimensions(&mut self, width: u32, height: u32) {
        self.dimensions = (width, height);
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn handle(&mut self, event: PointerEvent) -> CaptureEvent {
        match event.kind {
            PointerKind::Down => self.pointer_down(event),
            PointerKind::Move => self.pointer_move(event),
            PointerKind::Up => self.pointer_up(),
            PointerKind::DoubleActivate => self.finish(),
        }
    }

    pub fn pointer_down(&mut self, event: PointerEvent) -> CaptureEvent {
        if self.mode == CaptureMode::Off || !self.is_idle() {
            return CaptureEvent::Ignored;
        }
        let Some(attachment_id) = self.attachment_id else {
            return CaptureEvent::Ignored;
        };
        let Some(point) = self.normalize(event) else {
            return CaptureEvent::Ignored;
        };

        match self.mode {
            CaptureMode::Point => {
                self.state = CaptureState::PendingAssignment(PendingRegion {
                    attachment_id,
                    page: self.page,
                    geometry: Geometry::Point(point),
                });
                debug!("Point region pending on page {}", self.page);
                CaptureEvent::Pending
            }
            CaptureMode::Lasso => {
                self.state = CaptureState::Drawing {
                    path: vec![point],
                    last_sample_ms: event.timestamp_ms,
                };
                CaptureEvent::Started
            }
            CaptureMode::Off => CaptureEvent::Ignored,
        }
    }

    pub fn pointer_move(&mut self, event: PointerEvent) -> CaptureEvent {
        let Some(point) = self.normalize(event) else {
            return CaptureEvent::Ignored;
        };
        let interval = self.sample_interval_ms;
        let CaptureState::Drawing {
            path,
            last_sample_ms,
        } = &mut self.state
        else {
            return CaptureEvent::Ignored;
        };

        if event.timestamp_ms.saturating_sub(*last_sample_ms) < interval {
            return CaptureEvent::Throttled;
        }
        path.push(point);
        *last_sample_ms = event.timestamp_ms;
        CaptureEvent::Sampled
    }

    /// Release ends the gesture; the release position is not sampled
    pub fn pointer_up(&mut self) -> CaptureEvent {
        self.complete()
    }

    /// Explicit finish (double activation)
    pub fn finish(&mut self) -> CaptureEvent {
        self.complete()
    }

    /// Back to idle from any state. Returns whether anything was abandoned.
    pub fn cancel(&mut self) -> bool {
        let was_active = !self.is_idle();
        if was_active {
            debug!("Capture cancelled");
        }
        self.state = CaptureState::Idle;
        was_active
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingRegion> {
        match &self.state {
            CaptureState::PendingAssignment(pending) => Some(pending),
            _ => None,
        }
    }

    /// Hand the pending region to the caller, returning to idle
    pub fn take_pending(&mut self) -> Option<PendingRegion> {
        match std::mem::take(&mut self.state) {
            CaptureState::PendingAssignment(pending) => Some(pending),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Put a region back after its assignment failed
    pub fn restore_pending(&mut self, pending: PendingRegion) {
        if self.is_idle() {
            self.state = CaptureState::PendingAssignment(pending);
        }
    }

    /// Path to preview on the overlay
    #[must_use]
    pub fn preview(&self) -> Option<&[NormPoint]> {
        match &self.state {
            CaptureState::Drawing { path, .. } => Some(path),
            CaptureState::PendingAssignment(PendingRegion {
                geometry: Geometry::Polygon(vertices),
                ..
            }) => Some(vertices),
            _ => None,
        }
    }

    fn complete(&mut self) -> CaptureEvent {
        let CaptureState::Drawing { path, .. } = &mut self.state else {
            return CaptureEvent::Ignored;
        };
        let path = std::mem::take(path);
        let points = path.len();

        match (self.attachment_id, Geometry::polygon(path)) {
            (Some(attachment_id), Some(geometry)) => {
                self.state = CaptureState::PendingAssignment(PendingRegion {
                    attachment_id,
                    page: self.page,
                    geometry,
                });
                debug!("Lasso of {points} points pending on page {}", self.page);
                CaptureEvent::Pending
            }
            _ => {
                debug!("Lasso with {points} point(s) discarded");
                self.state = CaptureState::Idle;
                CaptureEvent::Discarded
            }
        }
    }

    fn normalize(&self, event: PointerEvent) -> Option<NormPoint> {
        let (width, height) = self.dimensions;
        NormPoint::from_pixels(event.x, event.y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::GestureBuilder;

    fn lasso() -> RegionCapture {
        let mut capture = RegionCapture::default();
        capture.set_mode(CaptureMode::Lasso);
        capture.bind(7, 2);
        capture.sync_dimensions(100, 100);
        capture
    }

    fn feed(capture: &mut RegionCapture, events: Vec<PointerEvent>) -> Vec<CaptureEvent> {
        events.into_iter().map(|e| capture.handle(e)).collect()
    }

    #[test]
    fn two_points_are_discarded() {
        let mut capture = lasso();
        let out = feed(&mut capture, GestureBuilder::new().lasso(&[(10.0, 10.0), (50.0, 50.0)]).build());
        assert_eq!(out.last(), Some(&CaptureEvent::Discarded));
        assert!(capture.is_idle());
        assert!(capture.preview().is_none());
    }

    #[test]
    fn three_collinear_points_become_pending() {
        let mut capture = lasso();
        feed(
            &mut capture,
            GestureBuilder::new()
                .lasso(&[(10.0, 10.0), (20.0, 20.0), (30.0, 30.0)])
                .build(),
        );
        let pending = capture.pending().unwrap();
        assert_eq!(pending.attachment_id, 7);
        assert_eq!(pending.page, 2);
        assert!(matches!(&pending.geometry, Geometry::Polygon(v) if v.len() == 3));
    }

    #[test]
    fn moves_inside_interval_are_throttled() {
        let mut capture = lasso();
        let events = GestureBuilder::new()
            .step_ms(4)
            .down(10.0, 10.0)
            .move_to(11.0, 11.0)
            .move_to(12.0, 12.0)
            .move_to(13.0, 13.0)
            .build();
        let out = feed(&mut capture, events);
        assert_eq!(
            out,
            vec![
                CaptureEvent::Started,
                CaptureEvent::Throttled,
                CaptureEvent::Throttled,
                CaptureEvent::Sampled
            ]
        );
        assert_eq!(capture.preview().map(<[NormPoint]>::len), Some(2));
    }

    #[test]
    fn pointer_up_position_is_not_sampled() {
        let mut capture = lasso();
        capture.handle(PointerEvent::down(10.0, 10.0, 0));
        capture.handle(PointerEvent::moved(20.0, 10.0, 20));
        assert_eq!(capture.handle(PointerEvent::up(90.0, 90.0, 40)), CaptureEvent::Discarded);
    }

    #[test]
    fn double_activation_finishes() {
        let mut capture = lasso();
        let events = GestureBuilder::new()
            .down(10.0, 10.0)
            .move_to(40.0, 10.0)
            .move_to(40.0, 40.0)
            .double(40.0, 40.0)
            .build();
        assert_eq!(feed(&mut capture, events).last(), Some(&CaptureEvent::Pending));
    }

    #[test]
    fn point_mode_pends_on_press() {
        let mut capture = lasso();
        capture.set_mode(CaptureMode::Point);
        assert_eq!(capture.handle(PointerEvent::down(50.0, 25.0, 0)), CaptureEvent::Pending);
        assert_eq!(
            capture.pending().map(|p| p.geometry.clone()),
            Some(Geometry::Point(NormPoint::new(0.5, 0.25)))
        );
    }

    #[test]
    fn cancel_from_any_state() {
        let mut capture = lasso();
        assert!(!capture.cancel());

        capture.handle(PointerEvent::down(10.0, 10.0, 0));
        assert!(capture.cancel());
        assert!(capture.is_idle());

        feed(&mut capture, GestureBuilder::new().lasso(&[(1.0, 1.0), (9.0, 1.0), (9.0, 9.0)]).build());
        assert!(capture.cancel());
        assert!(capture.pending().is_none());
    }

    #[test]
    fn pending_blocks_new_gestures_until_taken() {
        let mut capture = lasso();
        feed(&mut capture, GestureBuilder::new().lasso(&[(1.0, 1.0), (9.0, 1.0), (9.0, 9.0)]).build());
        assert_eq!(capture.handle(PointerEvent::down(50.0, 50.0, 5000)), CaptureEvent::Ignored);

        let pending = capture.take_pending().unwrap();
        assert!(capture.is_idle());
        capture.restore_pending(pending);
        assert!(capture.pending().is_some());
    }

    #[test]
    fn off_mode_ignores_input() {
        let mut capture = lasso();
        capture.set_mode(CaptureMode::Off);
        assert_eq!(capture.handle(PointerEvent::down(10.0, 10.0, 0)), CaptureEvent::Ignored);
    }

    #[test]
    fn changing_page_abandons_drawing() {
        let mut capture = lasso();
        capture.handle(PointerEvent::down(10.0, 10.0, 0));
        capture.bind(7, 3);
        assert!(capture.is_idle());
    }
}

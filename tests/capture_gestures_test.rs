use planmark::capture::{CaptureEvent, CaptureMode, CaptureState, RegionCapture};
use planmark::events::PointerEvent;
use planmark::geometry::NormPoint;
use planmark::regions::Geometry;
use planmark::test_utils::test_helpers::GestureBuilder;

fn capture(mode: CaptureMode) -> RegionCapture {
    let mut capture = RegionCapture::default();
    capture.sync_dimensions(200, 100);
    capture.bind(7, 2);
    capture.set_mode(mode);
    capture
}

fn feed(capture: &mut RegionCapture, events: Vec<PointerEvent>) -> Vec<CaptureEvent> {
    events.into_iter().map(|e| capture.handle(e)).collect()
}

#[test]
fn test_lasso_produces_pending_polygon() {
    let mut capture = capture(CaptureMode::Lasso);
    let events = GestureBuilder::new()
        .lasso(&[(20.0, 10.0), (20.0, 30.0), (60.0, 30.0), (60.0, 10.0)])
        .build();

    let results = feed(&mut capture, events);
    assert_eq!(results.last(), Some(&CaptureEvent::Pending));

    let pending = capture.take_pending().unwrap();
    assert_eq!((pending.attachment_id, pending.page), (7, 2));
    let Geometry::Polygon(vertices) = pending.geometry else {
        panic!("expected a polygon");
    };
    assert_eq!(vertices.len(), 4);
    assert_eq!(vertices[0], NormPoint::new(0.1, 0.1));
    assert!(capture.is_idle());
}

#[test]
fn test_double_activation_finishes_drawing() {
    let mut capture = capture(CaptureMode::Lasso);
    let events = GestureBuilder::new()
        .down(10.0, 10.0)
        .move_to(50.0, 10.0)
        .move_to(50.0, 50.0)
        .double(50.0, 50.0)
        .build();

    let results = feed(&mut capture, events);
    assert_eq!(results.last(), Some(&CaptureEvent::Pending));
    assert!(capture.pending().is_some());
}

#[test]
fn test_moves_inside_sample_interval_are_dropped() {
    let mut capture = capture(CaptureMode::Lasso);
    let events = GestureBuilder::new()
        .step_ms(3)
        .down(10.0, 10.0)
        .move_to(20.0, 10.0)
        .move_to(30.0, 10.0)
        .move_to(40.0, 10.0)
        .up()
        .build();

    // t = 1000, 1003, 1006, 1009: every move is throttled
    let results = feed(&mut capture, events);
    assert_eq!(
        results,
        vec![
            CaptureEvent::Started,
            CaptureEvent::Throttled,
            CaptureEvent::Throttled,
            CaptureEvent::Throttled,
            CaptureEvent::Discarded,
        ]
    );
    assert!(capture.is_idle());
}

#[test]
fn test_point_mode_pends_on_press() {
    let mut capture = capture(CaptureMode::Point);
    assert_eq!(capture.handle(PointerEvent::down(100.0, 50.0, 0)), CaptureEvent::Pending);
    assert_eq!(
        capture.pending().map(|p| p.geometry.clone()),
        Some(Geometry::Point(NormPoint::new(0.5, 0.5)))
    );
}

#[test]
fn test_cancel_from_any_state_returns_to_idle() {
    let mut capture = capture(CaptureMode::Lasso);
    assert!(!capture.cancel());

    capture.handle(PointerEvent::down(10.0, 10.0, 0));
    assert!(matches!(capture.state(), CaptureState::Drawing { .. }));
    assert!(capture.cancel());
    assert!(capture.preview().is_none());

    feed(
        &mut capture,
        GestureBuilder::new()
            .lasso(&[(10.0, 10.0), (50.0, 10.0), (50.0, 50.0)])
            .build(),
    );
    assert!(capture.pending().is_some());
    assert!(capture.cancel());
    assert_eq!(capture.state(), &CaptureState::Idle);
}

#[test]
fn test_capture_off_ignores_pointer() {
    let mut capture = capture(CaptureMode::Off);
    assert_eq!(capture.handle(PointerEvent::down(10.0, 10.0, 0)), CaptureEvent::Ignored);
    assert!(capture.is_idle());
}

#[test]
fn test_changing_page_abandons_gesture() {
    let mut capture = capture(CaptureMode::Lasso);
    capture.handle(PointerEvent::down(10.0, 10.0, 0));
    capture.bind(7, 3);
    assert!(capture.is_idle());
}

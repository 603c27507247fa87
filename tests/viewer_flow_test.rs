use std::sync::Arc;
use std::time::{Duration, Instant};

use planmark::capture::{CaptureEvent, CaptureMode};
use planmark::catalog::CategoryDraft;
use planmark::data::{DataAccess, Entity, MemoryStore, Record};
use planmark::events::SimulatedEventSource;
use planmark::geometry::NormPoint;
use planmark::host::MemorySource;
use planmark::notification::RetryAction;
use planmark::render::{RenderOutcome, SharedRasterizer};
use planmark::test_utils::test_helpers::{FakeRasterizer, FlakyStore, GestureBuilder};
use planmark::{AnnotationViewer, EngineError, PointerOutcome, RasterizerFactory, ViewerConfig};
use planmark::events::PointerEvent;
use serde_json::json;

const SETTLE: Duration = Duration::from_secs(5);

// Lasso around (0.1, 0.1)-(0.3, 0.3) on a 900x1125 surface
const SQUARE: [(f32, f32); 4] = [(90.0, 112.5), (90.0, 337.5), (270.0, 337.5), (270.0, 112.5)];

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn factory(pages: usize) -> RasterizerFactory {
    let rasterizer = FakeRasterizer::new(pages);
    Arc::new(move || Ok(Arc::new(rasterizer.clone()) as SharedRasterizer))
}

fn store_with_document() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .create(Entity::Document, record(json!({"name": "Level 1.pdf", "scope_id": 1})))
        .unwrap();
    store
}

fn open_viewer(data: Box<dyn DataAccess>, pages: usize) -> AnnotationViewer {
    let document_id = 1;
    let mut viewer = AnnotationViewer::new(data, factory(pages), ViewerConfig::default())
        .with_source(Box::new(MemorySource::new().with(document_id, b"%PDF-fake".to_vec())));
    viewer.load_scope(Some(1));
    viewer
}

fn draw(viewer: &mut AnnotationViewer, points: &[(f32, f32)]) {
    let mut events = SimulatedEventSource::new(GestureBuilder::new().lasso(points).into_input());
    viewer.dispatch_events(&mut events, Instant::now()).unwrap();
}

#[test]
fn test_mark_select_and_delete_region() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 2);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);
    assert_eq!(viewer.surface().dimensions(), (900, 1125));

    let category = viewer.create_category(CategoryDraft::named("SN-1")).unwrap();

    viewer.set_capture_mode(CaptureMode::Lasso);
    draw(&mut viewer, &SQUARE);
    assert!(viewer.capture().pending().is_some());

    let region = viewer.assign_category(category, Some("lobby")).unwrap();
    assert!(viewer.capture().is_idle());
    assert_eq!(viewer.regions().regions().len(), 1);
    assert_eq!(viewer.catalog().get(category).unwrap().region_count, 1);

    let stored = viewer.regions().region(region).unwrap();
    let anchor = stored.geometry.anchor();
    assert!((anchor.x - 0.2).abs() < 1e-9 && (anchor.y - 0.2).abs() < 1e-9);
    assert_eq!(stored.note.as_deref(), Some("lobby"));
    assert_eq!(stored.category_name.as_deref(), Some("SN-1"));

    viewer.set_capture_mode(CaptureMode::Off);
    let outcome = viewer.handle_pointer(PointerEvent::down(180.0, 225.0, 5000));
    assert_eq!(outcome, PointerOutcome::Selected(region));
    assert_eq!(viewer.last_overlay().affordance, Some(NormPoint::new(0.3, 0.1)));

    let outcome = viewer.handle_pointer(PointerEvent::down(270.0, 112.5, 5100));
    assert_eq!(outcome, PointerOutcome::DeleteRequested(region));

    viewer.delete_region(region).unwrap();
    assert_eq!(viewer.regions().selected(), None);
    assert!(viewer.regions().regions().is_empty());
    assert_eq!(viewer.last_overlay().affordance, None);
    assert_eq!(viewer.last_overlay().drawn, 0);
}

#[test]
fn test_clicking_selected_region_deselects_it() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 1);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);
    let category = viewer.create_category(CategoryDraft::named("SN-1")).unwrap();
    viewer.set_capture_mode(CaptureMode::Lasso);
    draw(&mut viewer, &SQUARE);
    let region = viewer.assign_category(category, None).unwrap();
    viewer.set_capture_mode(CaptureMode::Off);

    assert_eq!(
        viewer.handle_pointer(PointerEvent::down(180.0, 225.0, 0)),
        PointerOutcome::Selected(region)
    );
    assert_eq!(
        viewer.handle_pointer(PointerEvent::down(180.0, 225.0, 10)),
        PointerOutcome::Deselected(region)
    );
    assert_eq!(viewer.last_overlay().affordance, None);
    assert_eq!(
        viewer.handle_pointer(PointerEvent::down(800.0, 1000.0, 20)),
        PointerOutcome::Missed
    );
}

#[test]
fn test_two_point_gesture_is_discarded() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 1);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);
    viewer.set_capture_mode(CaptureMode::Lasso);

    draw(&mut viewer, &SQUARE[..2]);
    assert!(viewer.capture().is_idle());
    assert!(matches!(viewer.assign_category(1, None), Err(EngineError::NoPendingRegion)));

    // collinear still makes a polygon
    draw(&mut viewer, &[(90.0, 100.0), (180.0, 100.0), (270.0, 100.0)]);
    assert!(viewer.capture().pending().is_some());
}

#[test]
fn test_regions_are_per_page() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 3);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);
    let category = viewer.create_category(CategoryDraft::named("SN-1")).unwrap();
    viewer.set_capture_mode(CaptureMode::Lasso);
    draw(&mut viewer, &SQUARE);
    viewer.assign_category(category, None).unwrap();

    viewer.next_page(Instant::now());
    viewer.settle(SETTLE);
    assert_eq!(viewer.session().unwrap().current_page, 2);
    assert!(viewer.regions().regions().is_empty());

    viewer.prev_page(Instant::now());
    viewer.settle(SETTLE);
    assert_eq!(viewer.regions().regions().len(), 1);
}

#[test]
fn test_small_resizes_never_rerender() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 1);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);

    assert!(!viewer.on_container_resize(930.0, Instant::now()));
    assert!(viewer.session().is_some_and(|s| s.zoom_percent == "113%"));

    assert!(viewer.on_container_resize(1000.0, Instant::now()));
    viewer.settle(SETTLE);
    assert_eq!(viewer.session().unwrap().zoom_percent, "125%");
    assert_eq!(viewer.surface().width(), 1000);

    assert!(!viewer.on_container_resize(1040.0, Instant::now()));
    assert!(!viewer.on_container_resize(80.0, Instant::now()));
}

#[test]
fn test_resize_under_explicit_zoom_rerenders_at_same_scale() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 1);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);

    // 1.125 + 0.25
    viewer.zoom_in(Instant::now());
    viewer.settle(SETTLE);
    assert_eq!(viewer.surface().width(), 1100);

    assert!(viewer.on_container_resize(1400.0, Instant::now()));
    let outcomes = viewer.settle(SETTLE);
    assert!(outcomes.iter().any(|o| matches!(o, RenderOutcome::Rendered { page: 1, .. })));
    assert_eq!(viewer.surface().width(), 1100);
    assert_eq!(viewer.container_width(), 1400.0);
}

#[test]
fn test_zoom_steps_from_rendered_scale() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 1);
    let _mounted = viewer.mount();
    viewer.on_container_resize(800.0, Instant::now());
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);
    assert_eq!(viewer.session().unwrap().zoom_percent, "100%");

    for _ in 0..3 {
        viewer.zoom_in(Instant::now());
        viewer.settle(SETTLE);
    }
    assert_eq!(viewer.session().unwrap().zoom_percent, "175%");
    assert_eq!(viewer.surface().width(), 1400);

    viewer.reset_zoom(Instant::now());
    viewer.settle(SETTLE);
    assert_eq!(viewer.session().unwrap().zoom_percent, "100%");
}

#[test]
fn test_failed_assignment_keeps_pending_region() {
    let mut flaky = FlakyStore::new();
    flaky
        .inner
        .create(Entity::Document, record(json!({"name": "Level 1.pdf", "scope_id": 1})))
        .unwrap();
    let category = flaky
        .inner
        .create(Entity::Category, record(json!({"name": "SN-1", "scope_id": 1})))
        .unwrap();
    flaky.fail_creates = true;

    let mut viewer = open_viewer(Box::new(flaky), 1);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);
    viewer.set_capture_mode(CaptureMode::Lasso);
    draw(&mut viewer, &SQUARE);

    assert!(viewer.assign_category(category, None).is_err());
    assert!(viewer.capture().pending().is_some());
    assert!(viewer.regions().regions().is_empty());
    assert_eq!(
        viewer.notifications().current().and_then(|n| n.retry.clone()),
        Some(RetryAction::AssignCategory(category))
    );
}

#[test]
fn test_escape_while_pending_clears_preview() {
    let mut viewer = open_viewer(Box::new(store_with_document()), 1);
    let _mounted = viewer.mount();
    viewer.open_default(None, Instant::now()).unwrap();
    viewer.settle(SETTLE);
    viewer.set_capture_mode(CaptureMode::Lasso);
    draw(&mut viewer, &SQUARE);
    assert!(viewer.capture().preview().is_some());

    // new gestures are ignored until the pending region is resolved
    let outcome = viewer.handle_pointer(PointerEvent::down(10.0, 10.0, 9000));
    assert_eq!(outcome, PointerOutcome::Capture(CaptureEvent::Ignored));

    assert!(viewer.cancel_pending());
    assert!(viewer.capture().preview().is_none());
    assert!(viewer.capture().is_idle());
}

//! Annotation viewer
//!
//! Ties one document session to its page surface, the region overlay, the
//! capture state machine and the category catalog. All work happens on the
//! caller's thread except rasterization; the host drives the viewer by calling
//! [`AnnotationViewer::pump`] (or [`AnnotationViewer::settle`] in batch code).

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use log::{debug, error, info, warn};

use crate::capture::{CaptureEvent, CaptureMode, RegionCapture};
use crate::catalog::{CategoryCatalog, CategoryDraft};
use crate::color::Color;
use crate::data::{DataAccess, RecordId};
use crate::error::{EngineError, RasterFault, Severity};
use crate::events::{EventSource, InputEvent, Key, ListenerScope, PointerEvent, PointerKind, Subscription};
use crate::geometry::NormPoint;
use crate::host::{DocumentRef, DocumentSource, StoredDocuments, list_documents};
use crate::notification::{NotificationManager, RetryAction};
use crate::regions::{Hit, OverlayReport, OverlayRenderer, RegionStore};
use crate::render::{PipelineConfig, RenderOutcome, RenderTicket, SharedRasterizer, Surface, WidthTracker};
use crate::session::{Command, DocumentSession, Effect, SessionState};
use crate::settings::Settings;

/// Produces the rasterizer; called again on re-initialization
pub type RasterizerFactory = Arc<dyn Fn() -> Result<SharedRasterizer, RasterFault> + Send + Sync>;

/// Tunables of a viewer
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub pipeline: PipelineConfig,
    pub width: WidthTracker,
    pub sample_interval_ms: u64,
    pub palette: Vec<Color>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ViewerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            pipeline: settings.pipeline_config(),
            width: settings.width_tracker(),
            sample_interval_ms: settings.capture.sample_interval_ms,
            palette: settings.palette(),
        }
    }
}

enum Backend {
    Ready(SharedRasterizer),
    /// Initialization failed; nothing is attempted until re-initialized
    Failed(String),
}

/// What a pointer event did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerOutcome {
    Ignored,
    Capture(CaptureEvent),
    Selected(RecordId),
    Deselected(RecordId),
    /// The delete glyph of the selected region was hit; the host confirms
    /// and calls [`AnnotationViewer::delete_region`]
    DeleteRequested(RecordId),
    Missed,
}

pub struct AnnotationViewer {
    factory: RasterizerFactory,
    backend: Backend,
    config: ViewerConfig,
    data: Box<dyn DataAccess>,
    source: Option<Box<dyn DocumentSource>>,
    listeners: ListenerScope,
    width: WidthTracker,
    session: Option<DocumentSession>,
    surface: Surface,
    overlay: Surface,
    overlay_renderer: OverlayRenderer,
    last_overlay: OverlayReport,
    capture: RegionCapture,
    regions: RegionStore,
    catalog: CategoryCatalog,
    documents: Vec<DocumentRef>,
    notifications: NotificationManager,
}

impl AnnotationViewer {
    /// Create a viewer over `data`. A failing `factory` leaves the viewer in
    /// its persistent error state.
    pub fn new(data: Box<dyn DataAccess>, factory: RasterizerFactory, config: ViewerConfig) -> Self {
        let mut notifications = NotificationManager::new();
        let backend = match factory() {
            Ok(rasterizer) => {
                info!("Document viewer ready ({})", rasterizer.name());
                Backend::Ready(rasterizer)
            }
            Err(e) => {
                error!("Document viewer failed to initialize: {e}");
                notifications.error_with_retry(format!("Document viewer unavailable: {e}"), RetryAction::Reinitialize);
                Backend::Failed(e.to_string())
            }
        };

        Self {
            factory,
            backend,
            width: config.width.clone(),
            capture: RegionCapture::new(config.sample_interval_ms),
            catalog: CategoryCatalog::new(config.palette.clone()),
            config,
            data,
            source: None,
            listeners: ListenerScope::new(),
            session: None,
            surface: Surface::new(),
            overlay: Surface::new(),
            overlay_renderer: OverlayRenderer::default(),
            last_overlay: OverlayReport::default(),
            regions: RegionStore::new(),
            documents: Vec::new(),
            notifications,
        }
    }

    /// Fetch document bytes from `source` instead of the record store
    #[must_use]
    pub fn with_source(mut self, source: Box<dyn DocumentSource>) -> Self {
        self.source = Some(source);
        self
    }

    // Lifecycle

    /// Attach the page and overlay surfaces. Input is accepted while the
    /// returned subscription lives.
    pub fn mount(&mut self) -> Subscription {
        self.surface.attach();
        self.overlay.attach();
        self.listeners.subscribe()
    }

    /// Detach the surfaces; renders issued now are retried until remounted
    pub fn unmount(&mut self) {
        self.surface.detach();
        self.overlay.detach();
        self.width.reset();
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.listeners.is_active() && self.surface.is_attached()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    /// Error message of a failed initialization
    #[must_use]
    pub fn backend_error(&self) -> Option<&str> {
        match &self.backend {
            Backend::Failed(msg) => Some(msg),
            Backend::Ready(_) => None,
        }
    }

    /// Run the rasterizer factory again
    pub fn reinitialize(&mut self) -> Result<(), EngineError> {
        match (self.factory)() {
            Ok(rasterizer) => {
                info!("Document viewer re-initialized ({})", rasterizer.name());
                self.backend = Backend::Ready(rasterizer);
                Ok(())
            }
            Err(e) => {
                error!("Document viewer failed to re-initialize: {e}");
                self.backend = Backend::Failed(e.to_string());
                self.notifications
                    .error_with_retry(format!("Document viewer unavailable: {e}"), RetryAction::Reinitialize);
                Err(EngineError::BackendUnavailable(e.to_string()))
            }
        }
    }

    /// Release the session and clear both surfaces
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            info!("Closing '{}'", session.document.name);
            session.close();
        }
        self.regions.unbind();
        self.capture.unbind();
        self.surface.reset();
        self.overlay.reset();
        self.last_overlay = OverlayReport::default();
    }

    // Accessors

    #[must_use]
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref().map(DocumentSession::state)
    }

    #[must_use]
    pub fn document(&self) -> Option<&DocumentRef> {
        self.session.as_ref().map(|s| &s.document)
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[must_use]
    pub fn overlay(&self) -> &Surface {
        &self.overlay
    }

    #[must_use]
    pub fn last_overlay(&self) -> OverlayReport {
        self.last_overlay
    }

    #[must_use]
    pub fn regions(&self) -> &RegionStore {
        &self.regions
    }

    #[must_use]
    pub fn capture(&self) -> &RegionCapture {
        &self.capture
    }

    #[must_use]
    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn documents(&self) -> &[DocumentRef] {
        &self.documents
    }

    #[must_use]
    pub fn data(&self) -> &dyn DataAccess {
        self.data.as_ref()
    }

    #[must_use]
    pub fn container_width(&self) -> f32 {
        self.width.width()
    }

    pub fn notifications(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    /// Page surface with the overlay blended on top
    #[must_use]
    pub fn composite(&self) -> RgbaImage {
        self.surface.composite(&self.overlay)
    }

    // Documents

    /// Load the categories and documents of a scope
    pub fn load_scope(&mut self, scope_id: Option<RecordId>) -> &[DocumentRef] {
        self.catalog.list(self.data.as_ref(), scope_id);
        self.documents = list_documents(self.data.as_ref(), scope_id, None);
        debug!(
            "Scope {scope_id:?}: {} document(s), {} categories",
            self.documents.len(),
            self.catalog.categories().len()
        );
        &self.documents
    }

    /// Documents of the loaded scope whose name contains `fragment`
    #[must_use]
    pub fn filter_documents(&self, fragment: &str) -> Vec<DocumentRef> {
        list_documents(self.data.as_ref(), self.catalog.scope_id(), Some(fragment))
    }

    /// Open `requested`, or the first document of the scope
    pub fn open_default(&mut self, requested: Option<RecordId>, now: Instant) -> Result<(), EngineError> {
        let document = match requested {
            Some(id) => self.documents.iter().find(|d| d.attachment_id == id),
            None => self.documents.first(),
        }
        .cloned()
        .ok_or(EngineError::NoDocument)?;
        self.open_document(document, now)
    }

    /// Fetch and open a document, replacing the current one
    pub fn open_document(&mut self, document: DocumentRef, now: Instant) -> Result<(), EngineError> {
        self.require_backend()?;
        let fetched = match &self.source {
            Some(source) => source.fetch(document.attachment_id),
            None => StoredDocuments::new(self.data.as_ref()).fetch(document.attachment_id),
        };
        match fetched {
            Ok(bytes) => self.open_bytes(document, bytes, now),
            Err(e) => {
                warn!("Could not fetch '{}': {e}", document.name);
                self.notifications.error_with_retry(
                    format!("Could not load '{}': {e}", document.name),
                    RetryAction::ReopenDocument(document),
                );
                Err(e.into())
            }
        }
    }

    /// Open already fetched document content
    pub fn open_bytes(&mut self, document: DocumentRef, bytes: Vec<u8>, now: Instant) -> Result<(), EngineError> {
        let rasterizer = self.require_backend()?;
        self.close();

        match DocumentSession::open(rasterizer, document.clone(), Arc::from(bytes), self.config.pipeline) {
            Ok(session) => {
                self.session = Some(session);
                self.run_effects(vec![Effect::ReloadRegions, Effect::RenderCurrentPage], now);
                Ok(())
            }
            Err(fault) => {
                warn!("Could not open '{}': {fault}", document.name);
                if fault.severity() == Severity::Fatal {
                    self.backend = Backend::Failed(fault.to_string());
                    self.notifications
                        .error_with_retry(format!("Document viewer unavailable: {fault}"), RetryAction::Reinitialize);
                } else {
                    self.notifications.error_with_retry(
                        format!("Could not open '{}': {fault}", document.name),
                        RetryAction::ReopenDocument(document),
                    );
                }
                Err(EngineError::Document(fault))
            }
        }
    }

    // Rendering

    /// Drive retries and collect finished renders
    pub fn pump(&mut self, now: Instant) -> Vec<RenderOutcome> {
        if !self.listeners.is_active() && self.surface.is_attached() {
            debug!("Listeners released; detaching surfaces");
            self.unmount();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if let Some(RenderTicket::Abandoned) = session.pipeline_mut().tick(&self.surface, now) {
            debug!("Render abandoned: surface never attached");
        }
        let outcomes = session.pipeline_mut().poll(&mut self.surface, now);
        for outcome in &outcomes {
            self.handle_outcome(outcome, now);
        }
        outcomes
    }

    /// Block until queued renders have finished or `timeout` elapses
    pub fn settle(&mut self, timeout: Duration) -> Vec<RenderOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.pipeline_mut().tick(&self.surface, Instant::now());
        let outcomes = session.pipeline_mut().settle(&mut self.surface, timeout);
        for outcome in &outcomes {
            self.handle_outcome(outcome, Instant::now());
        }
        outcomes
    }

    /// Apply a navigation or zoom command
    pub fn apply(&mut self, cmd: Command, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let effects = session.apply(cmd);
        self.run_effects(effects, now);
    }

    pub fn next_page(&mut self, now: Instant) {
        self.apply(Command::NextPage, now);
    }

    pub fn prev_page(&mut self, now: Instant) {
        self.apply(Command::PrevPage, now);
    }

    pub fn go_to_page(&mut self, page: usize, now: Instant) {
        self.apply(Command::GoToPage(page), now);
    }

    pub fn zoom_in(&mut self, now: Instant) {
        self.apply(Command::ZoomIn, now);
    }

    pub fn zoom_out(&mut self, now: Instant) {
        self.apply(Command::ZoomOut, now);
    }

    pub fn reset_zoom(&mut self, now: Instant) {
        self.apply(Command::ResetZoom, now);
    }

    pub fn fit_width(&mut self, now: Instant) {
        self.apply(Command::FitWidth, now);
    }

    /// Feed a container width measurement. Returns true when it was accepted.
    pub fn on_container_resize(&mut self, width: f32, now: Instant) -> bool {
        if !self.width.observe(width) {
            return false;
        }
        self.apply(Command::ContainerResized, now);
        true
    }

    // Input

    pub fn set_capture_mode(&mut self, mode: CaptureMode) {
        self.capture.set_mode(mode);
        if mode != CaptureMode::Off {
            self.regions.clear_selection();
        }
        self.redraw_overlay();
    }

    /// Route a pointer event to the capture (drawing modes) or to selection
    pub fn handle_pointer(&mut self, event: PointerEvent) -> PointerOutcome {
        if self.session.is_none() {
            return PointerOutcome::Ignored;
        }

        if self.capture.mode() != CaptureMode::Off {
            let result = self.capture.handle(event);
            if result.needs_redraw() {
                self.redraw_overlay();
            }
            return PointerOutcome::Capture(result);
        }

        if event.kind != PointerKind::Down {
            return PointerOutcome::Ignored;
        }
        let (width, height) = self.overlay.dimensions();
        let Some(point) = NormPoint::from_pixels(event.x, event.y, width, height) else {
            return PointerOutcome::Ignored;
        };
        let outcome = match self.regions.click(point) {
            Hit::Delete(id) => return PointerOutcome::DeleteRequested(id),
            Hit::Select(id) => PointerOutcome::Selected(id),
            Hit::Deselect(id) => PointerOutcome::Deselected(id),
            Hit::Miss => PointerOutcome::Missed,
        };
        self.redraw_overlay();
        outcome
    }

    /// Escape abandons the gesture or pending region, else the selection
    pub fn handle_key(&mut self, key: Key) -> bool {
        match key {
            Key::Escape => {
                if self.cancel_pending() {
                    return true;
                }
                if self.regions.selected().is_some() {
                    self.regions.clear_selection();
                    self.redraw_overlay();
                    return true;
                }
                false
            }
        }
    }

    /// Drain `source` while mounted. Returns the number of events handled.
    pub fn dispatch_events(&mut self, source: &mut dyn EventSource, now: Instant) -> anyhow::Result<usize> {
        let mut handled = 0;
        while self.listeners.is_active() && source.poll(Duration::ZERO)? {
            match source.read()? {
                InputEvent::Pointer(event) => {
                    self.handle_pointer(event);
                }
                InputEvent::Key(key) => {
                    self.handle_key(key);
                }
                InputEvent::Resize { width } => {
                    self.on_container_resize(width, now);
                }
            }
            handled += 1;
        }
        Ok(handled)
    }

    // Regions

    /// Persist the pending region under `category_id`. On failure the region
    /// stays pending so the assignment can be retried.
    pub fn assign_category(&mut self, category_id: RecordId, note: Option<&str>) -> Result<RecordId, EngineError> {
        let pending = self.capture.take_pending().ok_or(EngineError::NoPendingRegion)?;
        let color = self.catalog.color_of(category_id);

        match self.regions.create(self.data.as_mut(), &pending, category_id, color, note) {
            Ok(id) => {
                self.catalog.refresh(self.data.as_ref());
                self.redraw_overlay();
                Ok(id)
            }
            Err(e) => {
                warn!("Could not save region: {e}");
                self.capture.restore_pending(pending);
                self.notifications
                    .error_with_retry(format!("Could not save region: {e}"), RetryAction::AssignCategory(category_id));
                self.redraw_overlay();
                Err(e)
            }
        }
    }

    /// Drop the drawing or pending region. Returns whether anything was dropped.
    pub fn cancel_pending(&mut self) -> bool {
        let cancelled = self.capture.cancel();
        if cancelled {
            self.redraw_overlay();
        }
        cancelled
    }

    pub fn delete_region(&mut self, id: RecordId) -> Result<(), EngineError> {
        match self.regions.delete(self.data.as_mut(), id) {
            Ok(()) => {
                self.catalog.refresh(self.data.as_ref());
                self.redraw_overlay();
                Ok(())
            }
            Err(e) => {
                warn!("Could not delete region #{id}: {e}");
                self.notifications
                    .error_with_retry(format!("Could not delete region: {e}"), RetryAction::DeleteRegion(id));
                Err(e)
            }
        }
    }

    // Categories

    pub fn create_category(&mut self, draft: CategoryDraft) -> Result<RecordId, EngineError> {
        let result = self.catalog.create(self.data.as_mut(), &draft);
        if let Err(e) = &result {
            self.report_category_error(e, None, draft);
        }
        result
    }

    pub fn update_category(&mut self, id: RecordId, draft: CategoryDraft) -> Result<(), EngineError> {
        let result = self.catalog.update(self.data.as_mut(), id, &draft);
        match &result {
            Ok(()) => {
                self.regions.reload(self.data.as_ref());
                self.redraw_overlay();
            }
            Err(e) => self.report_category_error(e, Some(id), draft),
        }
        result
    }

    /// Delete a category and its regions. Returns the number of regions removed.
    pub fn delete_category(&mut self, id: RecordId) -> Result<usize, EngineError> {
        match self.catalog.delete(self.data.as_mut(), id) {
            Ok(removed) => {
                self.regions.reload(self.data.as_ref());
                self.redraw_overlay();
                Ok(removed)
            }
            Err(e) => {
                warn!("Could not delete category #{id}: {e}");
                self.notifications.error(format!("Could not delete category: {e}"));
                Err(e)
            }
        }
    }

    fn report_category_error(&mut self, error: &EngineError, id: Option<RecordId>, draft: CategoryDraft) {
        warn!("Could not save category: {error}");
        if matches!(error, EngineError::Validation(_)) {
            self.notifications.warn(error.to_string());
        } else {
            self.notifications.error_with_retry(
                format!("Could not save category: {error}"),
                RetryAction::SaveCategory { id, draft },
            );
        }
    }

    // Retry

    pub fn perform_retry(&mut self, action: RetryAction, now: Instant) -> Result<(), EngineError> {
        debug!("Retrying {action:?}");
        match action {
            RetryAction::ReopenDocument(document) => self.open_document(document, now),
            RetryAction::RerenderPage => {
                if self.session.is_none() {
                    return Err(EngineError::NoDocument);
                }
                self.run_effects(vec![Effect::RenderCurrentPage], now);
                Ok(())
            }
            RetryAction::DeleteRegion(id) => self.delete_region(id),
            RetryAction::AssignCategory(category_id) => self.assign_category(category_id, None).map(|_| ()),
            RetryAction::SaveCategory { id: Some(id), draft } => self.update_category(id, draft),
            RetryAction::SaveCategory { id: None, draft } => self.create_category(draft).map(|_| ()),
            RetryAction::Reinitialize => self.reinitialize(),
        }
    }

    /// Dismiss the current notification, running its retry action if any
    pub fn retry_current(&mut self, now: Instant) -> Option<Result<(), EngineError>> {
        let action = self.notifications.dismiss_current()?.retry?;
        Some(self.perform_retry(action, now))
    }

    // Internals

    fn require_backend(&self) -> Result<SharedRasterizer, EngineError> {
        match &self.backend {
            Backend::Ready(rasterizer) => Ok(rasterizer.clone()),
            Backend::Failed(msg) => Err(EngineError::BackendUnavailable(msg.clone())),
        }
    }

    fn handle_outcome(&mut self, outcome: &RenderOutcome, now: Instant) {
        match outcome {
            RenderOutcome::Rendered { scale, .. } => {
                self.apply(Command::RenderCommitted { scale: *scale }, now);
            }
            RenderOutcome::Failed { page, error, .. } => {
                self.apply(Command::RenderFailed(error.to_string()), now);
                self.notifications.error_with_retry(
                    format!("Could not render page {page}: {error}"),
                    RetryAction::RerenderPage,
                );
            }
            RenderOutcome::Cancelled { .. } | RenderOutcome::Deferred { .. } => {}
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::RenderCurrentPage => {
                    let width = self.width.width();
                    if let Some(session) = self.session.as_mut() {
                        session.render_current(&self.surface, width, now);
                    }
                }
                Effect::ReloadRegions => {
                    if let Some(session) = &self.session {
                        let (attachment_id, page) = (session.attachment_id(), session.current_page());
                        self.capture.bind(attachment_id, page);
                        self.regions.load(self.data.as_ref(), attachment_id, page);
                    }
                    self.redraw_overlay();
                }
                Effect::RedrawOverlay => {
                    let (width, height) = self.surface.dimensions();
                    self.overlay.resize(width, height);
                    self.redraw_overlay();
                }
                Effect::SyncCapture => {
                    let (width, height) = self.surface.dimensions();
                    self.capture.sync_dimensions(width, height);
                }
            }
        }
    }

    fn redraw_overlay(&mut self) {
        let selected = self.regions.selected();
        self.last_overlay = self.overlay_renderer.render(
            &mut self.overlay,
            self.regions.regions_mut(),
            selected,
            self.capture.preview(),
        );
    }
}

impl Drop for AnnotationViewer {
    fn drop(&mut self) {
        self.close();
    }
}

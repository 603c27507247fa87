//! Side-by-side comparison panels
//!
//! Each panel is an isolated document session with its own surface, page
//! cursor and scale. Panels share nothing but the rasterizer and the source
//! documents are fetched from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::data::RecordId;
use crate::error::EngineError;
use crate::host::{DocumentRef, DocumentSource};
use crate::render::{PipelineConfig, RenderOutcome, RenderParams, RenderTicket, ScaleSpec, SharedRasterizer, Surface};
use crate::session::{Command, DocumentSession, Effect};

/// Panel zoom factors
pub const ZOOM_IN_FACTOR: f32 = 1.25;
pub const ZOOM_OUT_FACTOR: f32 = 0.8;
/// Bounds of a panel's target render width in pixels
pub const MIN_TARGET_WIDTH: u32 = 100;
pub const MAX_TARGET_WIDTH: u32 = 8000;
/// Container width a panel fits page 1 into
pub const DEFAULT_PANEL_WIDTH: f32 = 600.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PanelSlot {
    Left,
    Right,
}

pub struct Panel {
    slot: PanelSlot,
    session: Option<DocumentSession>,
    surface: Surface,
    scale: ScaleSpec,
    container_width: f32,
}

impl Panel {
    #[must_use]
    pub fn new(slot: PanelSlot, container_width: f32) -> Self {
        Self {
            slot,
            session: None,
            surface: Surface::new(),
            scale: ScaleSpec::auto_fit(container_width),
            container_width,
        }
    }

    #[must_use]
    pub fn slot(&self) -> PanelSlot {
        self.slot
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    #[must_use]
    pub fn document(&self) -> Option<&DocumentRef> {
        self.session.as_ref().map(|s| &s.document)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.session.is_none()
    }

    /// 1-based; 1 while empty
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.session.as_ref().map_or(1, DocumentSession::current_page)
    }

    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.session.as_ref().map_or(0, DocumentSession::total_pages)
    }

    #[must_use]
    pub fn scale(&self) -> ScaleSpec {
        self.scale
    }

    /// Open a document in this panel, replacing the previous one, and render
    /// page 1 fitted to the panel
    pub fn assign(
        &mut self,
        rasterizer: SharedRasterizer,
        document: DocumentRef,
        bytes: Vec<u8>,
        config: PipelineConfig,
        now: Instant,
    ) -> Result<RenderTicket, EngineError> {
        self.clear();
        let session =
            DocumentSession::open(rasterizer, document, Arc::from(bytes), config).map_err(EngineError::Document)?;
        info!("{:?} panel shows '{}'", self.slot, session.document.name);
        self.session = Some(session);
        self.scale = ScaleSpec::auto_fit(self.container_width);
        self.render(now)
    }

    /// Scale relative to the current pixel width
    pub fn zoom(&mut self, factor: f32, now: Instant) -> Result<RenderTicket, EngineError> {
        if self.session.is_none() {
            return Err(EngineError::NoDocument);
        }
        let base = match self.surface.width() {
            0 => self.container_width,
            width => width as f32,
        };
        let target = (base * factor).round().clamp(MIN_TARGET_WIDTH as f32, MAX_TARGET_WIDTH as f32) as u32;
        debug!("{:?} panel zoom x{factor}: {base} -> {target}px", self.slot);
        self.scale = ScaleSpec::TargetWidth(target);
        self.render(now)
    }

    pub fn zoom_in(&mut self, now: Instant) -> Result<RenderTicket, EngineError> {
        self.zoom(ZOOM_IN_FACTOR, now)
    }

    pub fn zoom_out(&mut self, now: Instant) -> Result<RenderTicket, EngineError> {
        self.zoom(ZOOM_OUT_FACTOR, now)
    }

    pub fn next_page(&mut self, now: Instant) -> Option<RenderTicket> {
        self.navigate(Command::NextPage, now)
    }

    pub fn prev_page(&mut self, now: Instant) -> Option<RenderTicket> {
        self.navigate(Command::PrevPage, now)
    }

    pub fn go_to_page(&mut self, page: usize, now: Instant) -> Option<RenderTicket> {
        self.navigate(Command::GoToPage(page), now)
    }

    /// Release the document handle and reset the page cursor
    pub fn clear(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!("Clearing {:?} panel", self.slot);
            session.close();
        }
        self.surface.reset();
        self.scale = ScaleSpec::auto_fit(self.container_width);
    }

    pub fn pump(&mut self, now: Instant) -> Vec<RenderOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.pipeline_mut().tick(&self.surface, now);
        let outcomes = session.pipeline_mut().poll(&mut self.surface, now);
        Self::commit_outcomes(session, &outcomes);
        outcomes
    }

    pub fn settle(&mut self, timeout: Duration) -> Vec<RenderOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.pipeline_mut().tick(&self.surface, Instant::now());
        let outcomes = session.pipeline_mut().settle(&mut self.surface, timeout);
        Self::commit_outcomes(session, &outcomes);
        outcomes
    }

    fn navigate(&mut self, cmd: Command, now: Instant) -> Option<RenderTicket> {
        let effects = self.session.as_mut()?.apply(cmd);
        if effects.contains(&Effect::RenderCurrentPage) {
            self.render(now).ok()
        } else {
            None
        }
    }

    fn render(&mut self, now: Instant) -> Result<RenderTicket, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NoDocument)?;
        let page = session.current_page();
        Ok(session
            .pipeline_mut()
            .render_page(page, RenderParams::new(self.scale), &self.surface, now))
    }

    fn commit_outcomes(session: &mut DocumentSession, outcomes: &[RenderOutcome]) {
        for outcome in outcomes {
            match outcome {
                RenderOutcome::Rendered { scale, .. } => {
                    let _ = session.apply(Command::RenderCommitted { scale: *scale });
                }
                RenderOutcome::Failed { error, .. } => {
                    let _ = session.apply(Command::RenderFailed(error.to_string()));
                }
                RenderOutcome::Cancelled { .. } | RenderOutcome::Deferred { .. } => {}
            }
        }
    }
}

/// Two comparison panels fed by dropped documents
pub struct MultiPanel {
    rasterizer: SharedRasterizer,
    source: Box<dyn DocumentSource>,
    config: PipelineConfig,
    left: Panel,
    right: Panel,
    visible: bool,
}

impl MultiPanel {
    pub fn new(rasterizer: SharedRasterizer, source: Box<dyn DocumentSource>, config: PipelineConfig) -> Self {
        Self {
            rasterizer,
            source,
            config,
            left: Panel::new(PanelSlot::Left, DEFAULT_PANEL_WIDTH),
            right: Panel::new(PanelSlot::Right, DEFAULT_PANEL_WIDTH),
            visible: false,
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Showing attaches both panel surfaces; hiding clears both panels
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        for panel in [&mut self.left, &mut self.right] {
            if visible {
                panel.surface.attach();
            } else {
                panel.clear();
                panel.surface.detach();
            }
        }
    }

    #[must_use]
    pub fn panel(&self, slot: PanelSlot) -> &Panel {
        match slot {
            PanelSlot::Left => &self.left,
            PanelSlot::Right => &self.right,
        }
    }

    pub fn panel_mut(&mut self, slot: PanelSlot) -> &mut Panel {
        match slot {
            PanelSlot::Left => &mut self.left,
            PanelSlot::Right => &mut self.right,
        }
    }

    /// Open a dropped document in `slot`
    pub fn drop_document(&mut self, slot: PanelSlot, document: DocumentRef, now: Instant) -> Result<RenderTicket, EngineError> {
        let bytes = self.source.fetch(document.attachment_id).map_err(|e| {
            warn!("Dropped document #{} could not be fetched: {e}", document.attachment_id);
            EngineError::from(e)
        })?;
        let rasterizer = self.rasterizer.clone();
        let config = self.config;
        self.panel_mut(slot).assign(rasterizer, document, bytes, config, now)
    }

    /// Which slot shows `attachment_id`, if any
    #[must_use]
    pub fn slot_of(&self, attachment_id: RecordId) -> Option<PanelSlot> {
        [&self.left, &self.right]
            .into_iter()
            .find(|p| p.document().is_some_and(|d| d.attachment_id == attachment_id))
            .map(Panel::slot)
    }

    pub fn pump(&mut self, now: Instant) -> Vec<(PanelSlot, RenderOutcome)> {
        let left = self.left.pump(now).into_iter().map(|o| (PanelSlot::Left, o));
        let right = self.right.pump(now).into_iter().map(|o| (PanelSlot::Right, o));
        left.chain(right).collect()
    }

    pub fn settle(&mut self, timeout: Duration) {
        self.left.settle(timeout);
        self.right.settle(timeout);
    }
}

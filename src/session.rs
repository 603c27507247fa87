//! Document session state
//!
//! The session owns the render pipeline, whose worker holds the only handle
//! on the document. Navigation and zoom go through [`SessionState::apply`],
//! which returns the effects the owner has to carry out.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::data::RecordId;
use crate::error::RasterFault;
use crate::host::DocumentRef;
use crate::render::{
    PipelineConfig, RenderParams, RenderPipeline, RenderTicket, ScaleSpec, SharedRasterizer,
    Surface, Zoom, zoom_percent,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Ready,
    Error(String),
}

/// Page cursor, zoom and status of an open document
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    /// 1-based
    pub current_page: usize,
    pub total_pages: usize,
    pub zoom: Zoom,
    /// Scale of the last committed render
    pub scale: f32,
    pub zoom_percent: String,
    pub status: SessionStatus,
}

impl SessionState {
    #[must_use]
    pub fn new(total_pages: usize) -> Self {
        Self {
            current_page: 1,
            total_pages,
            zoom: Zoom::default(),
            scale: 1.0,
            zoom_percent: zoom_percent(1.0),
            status: SessionStatus::Loading,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::GoToPage(page) => {
                if page == 0 || page > self.total_pages || page == self.current_page {
                    return vec![];
                }
                self.current_page = page;
                vec![Effect::ReloadRegions, Effect::RenderCurrentPage]
            }

            Command::NextPage => self.apply(Command::GoToPage(self.current_page + 1)),

            Command::PrevPage => match self.current_page.checked_sub(1) {
                Some(page) => self.apply(Command::GoToPage(page)),
                None => vec![],
            },

            Command::ZoomIn => {
                self.zoom.step_in(self.scale);
                vec![Effect::RenderCurrentPage]
            }

            Command::ZoomOut => {
                self.zoom.step_out(self.scale);
                vec![Effect::RenderCurrentPage]
            }

            Command::ResetZoom => {
                self.zoom.reset();
                vec![Effect::RenderCurrentPage]
            }

            Command::SetZoom(scale) => {
                self.zoom = Zoom::explicit(scale);
                vec![Effect::RenderCurrentPage]
            }

            Command::FitWidth => {
                self.zoom.fit();
                vec![Effect::RenderCurrentPage]
            }

            // Explicit zoom keeps its scale but the page is laid out again
            Command::ContainerResized => vec![Effect::RenderCurrentPage],

            Command::RenderCommitted { scale } => {
                self.scale = scale;
                self.zoom_percent = zoom_percent(scale);
                self.status = SessionStatus::Ready;
                vec![Effect::RedrawOverlay, Effect::SyncCapture]
            }

            Command::RenderFailed(reason) => {
                self.status = SessionStatus::Error(reason);
                vec![]
            }
        }
    }
}

/// Commands that modify session state
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    GoToPage(usize),
    NextPage,
    PrevPage,
    ZoomIn,
    ZoomOut,
    /// Back to 100%
    ResetZoom,
    /// Explicit scale, clamped into the zoom range
    SetZoom(f32),
    FitWidth,
    /// The container width accepted a new measurement
    ContainerResized,
    RenderCommitted { scale: f32 },
    RenderFailed(String),
}

/// Effects produced by state changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    RenderCurrentPage,
    ReloadRegions,
    RedrawOverlay,
    SyncCapture,
}

/// An open document: pipeline and state
pub struct DocumentSession {
    pub document: DocumentRef,
    pipeline: RenderPipeline,
    state: SessionState,
}

impl DocumentSession {
    /// Open `bytes` with `rasterizer`. Documents without pages are rejected.
    pub fn open(
        rasterizer: SharedRasterizer,
        document: DocumentRef,
        bytes: Arc<[u8]>,
        config: PipelineConfig,
    ) -> Result<Self, RasterFault> {
        let backend = rasterizer.name();
        let pipeline = RenderPipeline::open(rasterizer, bytes, config)?;
        let total_pages = pipeline.page_count();
        if total_pages == 0 {
            return Err(RasterFault::Unsupported("document has no pages".to_string()));
        }
        info!(
            "Opened '{}' (#{}) with {} page(s) via {backend}",
            document.name, document.attachment_id, total_pages
        );

        Ok(Self {
            document,
            pipeline,
            state: SessionState::new(total_pages),
        })
    }

    #[must_use]
    pub fn attachment_id(&self) -> RecordId {
        self.document.attachment_id
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.state.current_page
    }

    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.state.total_pages
    }

    pub fn pipeline_mut(&mut self) -> &mut RenderPipeline {
        &mut self.pipeline
    }

    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        self.state.apply(cmd)
    }

    /// Render parameters for the current zoom intent
    #[must_use]
    pub fn render_params(&self, container_width: f32) -> RenderParams {
        RenderParams::new(ScaleSpec::Intent {
            zoom: self.state.zoom,
            container_width,
        })
    }

    /// Queue a render of the current page
    pub fn render_current(&mut self, surface: &Surface, container_width: f32, now: Instant) -> RenderTicket {
        let params = self.render_params(container_width);
        let page = self.state.current_page;
        debug!("Rendering page {page} of #{}", self.document.attachment_id);
        self.pipeline.render_page(page, params, surface, now)
    }

    /// Stop rendering and release the document handle. Idempotent.
    pub fn close(&mut self) {
        self.pipeline.shutdown();
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.close();
    }
}

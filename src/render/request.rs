//! Render request and response types

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use super::backend::PageSize;
use super::zoom::{Zoom, ZoomIntent};
use crate::error::RasterFault;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Cooperative cancellation shared between the pipeline and its worker.
///
/// Holds the id of the newest request for the surface; any request with a
/// different id is superseded.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    latest: Arc<AtomicU64>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as the newest request, superseding everything before it
    pub fn supersede_with(&self, id: RequestId) {
        self.latest.store(id.0, Ordering::SeqCst);
    }

    /// Supersede every outstanding request
    pub fn cancel_all(&self) {
        self.latest.store(0, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_current(&self, id: RequestId) -> bool {
        self.latest.load(Ordering::SeqCst) == id.0
    }

    #[must_use]
    pub fn is_cancelled(&self, id: RequestId) -> bool {
        !self.is_current(id)
    }
}

/// How the worker derives the render scale once the page size is known
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleSpec {
    /// Viewer zoom intent against a container width
    Intent { zoom: Zoom, container_width: f32 },
    /// Fixed output width in pixels (panel zoom)
    TargetWidth(u32),
}

impl ScaleSpec {
    #[must_use]
    pub fn auto_fit(container_width: f32) -> Self {
        Self::Intent {
            zoom: Zoom {
                intent: ZoomIntent::AutoFit,
            },
            container_width,
        }
    }

    /// Concrete scale for a page of the given intrinsic size
    #[must_use]
    pub fn resolve(&self, intrinsic: PageSize) -> f32 {
        match *self {
            Self::Intent {
                zoom,
                container_width,
            } => zoom.effective_scale(container_width, intrinsic.width),
            Self::TargetWidth(width) => {
                if intrinsic.width > 0.0 {
                    width as f32 / intrinsic.width
                } else {
                    1.0
                }
            }
        }
    }
}

/// Parameters for rendering a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    pub scale: ScaleSpec,
}

impl RenderParams {
    #[must_use]
    pub fn new(scale: ScaleSpec) -> Self {
        Self { scale }
    }
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Render a 1-based page
    Page {
        id: RequestId,
        page: usize,
        params: RenderParams,
        token: CancelToken,
    },

    /// Release the document and stop the worker
    Shutdown,
}

/// A rasterized page ready to be committed to a surface
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub raster: RgbaImage,
    pub page: usize,
    pub scale: f32,
    pub intrinsic: PageSize,
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    Page {
        id: RequestId,
        page: usize,
        data: Arc<RenderedPage>,
        /// Served from the worker's page cache
        cached: bool,
    },

    /// Request was superseded before it finished
    Cancelled(RequestId),

    Error { id: RequestId, error: RasterFault },
}

impl RenderResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Page { id, .. } | Self::Cancelled(id) | Self::Error { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_request_supersedes_older() {
        let token = CancelToken::new();
        token.supersede_with(RequestId::new(1));
        assert!(token.is_current(RequestId::new(1)));

        token.supersede_with(RequestId::new(2));
        assert!(token.is_cancelled(RequestId::new(1)));
        assert!(token.is_current(RequestId::new(2)));

        token.cancel_all();
        assert!(token.is_cancelled(RequestId::new(2)));
    }

    #[test]
    fn target_width_scale() {
        let target = ScaleSpec::TargetWidth(1200);
        assert_eq!(target.resolve(PageSize::new(600.0, 800.0)), 2.0);
        assert_eq!(target.resolve(PageSize::new(0.0, 800.0)), 1.0);
    }

    #[test]
    fn auto_fit_scale_from_intent() {
        let target = ScaleSpec::auto_fit(1000.0);
        assert_eq!(target.resolve(PageSize::new(800.0, 1000.0)), 1.25);
    }
}

//! Page rendering infrastructure

mod backend;
mod cache;
mod image_backend;
#[cfg(feature = "pdf")]
mod mupdf_backend;
mod pipeline;
mod request;
mod surface;
mod worker;
mod zoom;

use std::sync::Arc;

pub use backend::{DocumentHandle, PageHandle, PageSize, Rasterizer, SharedRasterizer, check_page};
pub use image_backend::ImageRasterizer;
#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfRasterizer;
pub use pipeline::{
    DEFAULT_CACHE_SIZE, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT, PipelineConfig, RenderOutcome,
    RenderPipeline, RenderTicket,
};
pub use request::{CancelToken, RenderParams, RenderRequest, RenderResponse, RenderedPage, RequestId, ScaleSpec};
pub use surface::Surface;
pub use zoom::*;

use crate::error::RasterFault;

/// True when `bytes` start like a PDF file
#[must_use]
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Pick a rasterizer for the content in `bytes`
pub fn backend_for(bytes: &[u8]) -> Result<SharedRasterizer, RasterFault> {
    if is_pdf(bytes) {
        #[cfg(feature = "pdf")]
        {
            return Ok(Arc::new(MupdfRasterizer));
        }
        #[cfg(not(feature = "pdf"))]
        {
            return Err(RasterFault::Unsupported("PDF support was not compiled in".to_string()));
        }
    }
    Ok(Arc::new(ImageRasterizer))
}

/// Chooses the backend from the document content on every open
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentRasterizer;

impl Rasterizer for ContentRasterizer {
    fn name(&self) -> &'static str {
        "content"
    }

    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RasterFault> {
        backend_for(bytes)?.open(bytes)
    }
}

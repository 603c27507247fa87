//! Rasterization collaborator
//!
//! The engine treats the page rasterizer as an opaque capability. Handles are
//! not required to be `Send`: a document is opened on the render worker thread
//! that renders it, and that worker destroys it.

use std::sync::Arc;

use image::RgbaImage;

use crate::error::RasterFault;

/// Page size at scale 1.0
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions at `scale`, never smaller than 1x1
    #[must_use]
    pub fn scaled(self, scale: f32) -> (u32, u32) {
        (
            ((self.width * scale).round() as u32).max(1),
            ((self.height * scale).round() as u32).max(1),
        )
    }
}

/// Entry point of a rasterization library
pub trait Rasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Load a document from raw bytes
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RasterFault>;
}

/// An open document
pub trait DocumentHandle {
    fn page_count(&self) -> usize;

    /// Resolve a 1-based page number
    fn page(&self, number: usize) -> Result<Box<dyn PageHandle + '_>, RasterFault>;

    /// Release the underlying document. Calling it twice is a no-op.
    fn destroy(&mut self);
}

/// A resolved page
pub trait PageHandle {
    fn intrinsic_size(&self) -> PageSize;

    fn render(&self, scale: f32) -> Result<RgbaImage, RasterFault>;
}

/// Shared rasterizer reference handed to sessions, panels and workers
pub type SharedRasterizer = Arc<dyn Rasterizer>;

/// Page bounds check shared by the backends
pub fn check_page(number: usize, count: usize) -> Result<(), RasterFault> {
    if number == 0 || number > count {
        return Err(RasterFault::PageOutOfRange { page: number, count });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_size_rounds_and_never_collapses() {
        assert_eq!(PageSize::new(800.0, 600.0).scaled(1.25), (1000, 750));
        assert_eq!(PageSize::new(1.0, 1.0).scaled(0.1), (1, 1));
    }

    #[test]
    fn page_numbers_are_one_based() {
        assert!(check_page(1, 3).is_ok());
        assert!(check_page(3, 3).is_ok());
        assert_eq!(
            check_page(0, 3),
            Err(RasterFault::PageOutOfRange { page: 0, count: 3 })
        );
        assert!(check_page(4, 3).is_err());
    }
}

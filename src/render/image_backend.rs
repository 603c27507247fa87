//! Raster images as single-page documents

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use log::debug;

use super::backend::{DocumentHandle, PageHandle, PageSize, Rasterizer, check_page};
use crate::error::RasterFault;

/// Rasterizer for PNG, JPEG, GIF and WebP content
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageRasterizer;

impl Rasterizer for ImageRasterizer {
    fn name(&self) -> &'static str {
        "image"
    }

    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RasterFault> {
        let format = image::guess_format(bytes).map_err(|e| RasterFault::Unsupported(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| RasterFault::engine(e.to_string()))?;
        debug!(
            "Opened {format:?} image {}x{}",
            decoded.width(),
            decoded.height()
        );
        Ok(Box::new(ImageDocument {
            image: Some(decoded),
        }))
    }
}

struct ImageDocument {
    image: Option<DynamicImage>,
}

impl DocumentHandle for ImageDocument {
    fn page_count(&self) -> usize {
        usize::from(self.image.is_some())
    }

    fn page(&self, number: usize) -> Result<Box<dyn PageHandle + '_>, RasterFault> {
        let image = self.image.as_ref().ok_or(RasterFault::Destroyed)?;
        check_page(number, 1)?;
        Ok(Box::new(ImagePage { image }))
    }

    fn destroy(&mut self) {
        self.image = None;
    }
}

struct ImagePage<'a> {
    image: &'a DynamicImage,
}

impl PageHandle for ImagePage<'_> {
    fn intrinsic_size(&self) -> PageSize {
        PageSize::new(self.image.width() as f32, self.image.height() as f32)
    }

    fn render(&self, scale: f32) -> Result<RgbaImage, RasterFault> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RasterFault::engine(format!("invalid scale {scale}")));
        }
        let (width, height) = self.intrinsic_size().scaled(scale);
        let rgba = self.image.to_rgba8();
        if (width, height) == rgba.dimensions() {
            return Ok(rgba);
        }
        Ok(imageops::resize(&rgba, width, height, FilterType::Triangle))
    }
}

//! PDF documents through MuPDF

use image::RgbaImage;
use log::debug;
use mupdf::{Colorspace, Document, Matrix, Page, Pixmap};

use super::backend::{DocumentHandle, PageHandle, PageSize, Rasterizer, check_page};
use crate::error::RasterFault;

#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfRasterizer;

impl Rasterizer for MupdfRasterizer {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, RasterFault> {
        let doc = Document::from_bytes(bytes, "application/pdf").map_err(engine)?;
        let page_count = doc.page_count().map_err(engine)?;
        let page_count = usize::try_from(page_count).unwrap_or(0);
        debug!("Opened PDF with {page_count} pages");
        Ok(Box::new(PdfDocument {
            doc: Some(doc),
            page_count,
        }))
    }
}

fn engine(err: mupdf::error::Error) -> RasterFault {
    RasterFault::engine(err.to_string())
}

struct PdfDocument {
    doc: Option<Document>,
    page_count: usize,
}

impl DocumentHandle for PdfDocument {
    fn page_count(&self) -> usize {
        if self.doc.is_some() { self.page_count } else { 0 }
    }

    fn page(&self, number: usize) -> Result<Box<dyn PageHandle + '_>, RasterFault> {
        let doc = self.doc.as_ref().ok_or(RasterFault::Destroyed)?;
        check_page(number, self.page_count)?;
        let page = doc.load_page((number - 1) as i32).map_err(engine)?;
        let bounds = page.bounds().map_err(engine)?;
        Ok(Box::new(PdfPage {
            page,
            size: PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0),
        }))
    }

    fn destroy(&mut self) {
        self.doc = None;
    }
}

struct PdfPage {
    page: Page,
    size: PageSize,
}

impl PageHandle for PdfPage {
    fn intrinsic_size(&self) -> PageSize {
        self.size
    }

    fn render(&self, scale: f32) -> Result<RgbaImage, RasterFault> {
        let matrix = Matrix::new_scale(scale, scale);
        let pixmap = self
            .page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)
            .map_err(engine)?;
        pixmap_to_rgba(&pixmap)
    }
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<RgbaImage, RasterFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RasterFault::engine(format!("unsupported pixmap format: {n} channels")));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(RasterFault::engine("pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        for px in row.chunks_exact(n) {
            out.extend_from_slice(&px[..3]);
            out.push(if n > 3 { px[3] } else { u8::MAX });
        }
    }

    RgbaImage::from_raw(pixmap.width(), pixmap.height(), out)
        .ok_or_else(|| RasterFault::engine("pixmap conversion failed"))
}

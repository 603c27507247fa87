//! Raster drawing surface
//!
//! Stands in for a canvas element: it has pixel dimensions, can be attached to
//! or detached from the visible tree, and supports the handful of primitives
//! the overlay needs. Pixels live in a premultiplied `tiny_skia::Pixmap`;
//! `RgbaImage` only appears at the edges (committing a rendered page, reading
//! pixels back, compositing).

use image::{Rgba, RgbaImage};
use tiny_skia::{
    Color, ColorU8, FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::geometry::NormPoint;

#[derive(Clone, Debug, Default)]
pub struct Surface {
    /// `None` while the surface has no area
    pixmap: Option<Pixmap>,
    attached: bool,
}

impl Surface {
    /// Empty, detached surface
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attached surface of the given size
    #[must_use]
    pub fn attached(width: u32, height: u32) -> Self {
        Self {
            pixmap: Pixmap::new(width, height),
            attached: true,
        }
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, Pixmap::width)
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, Pixmap::height)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Straight-alpha color of one pixel
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        let px = self.pixmap.as_ref()?.pixel(x, y)?.demultiply();
        Some(Rgba([px.red(), px.green(), px.blue(), px.alpha()]))
    }

    /// Resize to `width` x `height`. Contents are discarded when the size changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.dimensions() != (width, height) {
            self.pixmap = Pixmap::new(width, height);
        }
    }

    /// Reset every pixel to transparent
    pub fn clear(&mut self) {
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill(Color::TRANSPARENT);
        }
    }

    /// Replace contents with `raster`, adopting its size
    pub fn commit(&mut self, raster: &RgbaImage) {
        self.resize(raster.width(), raster.height());
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(raster.pixels()) {
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }
    }

    /// Drop contents and size
    pub fn reset(&mut self) {
        self.pixmap = None;
    }

    /// Fill a polygon given in normalized coordinates (even-odd rule)
    pub fn fill_polygon(&mut self, vertices: &[NormPoint], color: Rgba<u8>) {
        let (width, height) = self.dimensions();
        let Some(path) = pixel_path(vertices, width, height, true) else {
            return;
        };
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill_path(&path, &paint(color), FillRule::EvenOdd, Transform::identity(), None);
        }
    }

    /// Filled disc in pixel coordinates
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        let Some(path) = PathBuilder::from_circle(cx, cy, radius) else {
            return;
        };
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill_path(&path, &paint(color), FillRule::Winding, Transform::identity(), None);
        }
    }

    /// Straight line of the given thickness in pixel coordinates
    pub fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: Rgba<u8>) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.0, from.1);
        pb.line_to(to.0, to.1);
        let Some(path) = pb.finish() else {
            return;
        };
        self.stroke(&path, thickness, color);
    }

    /// Draw a closed or open path of normalized points
    pub fn stroke_path(&mut self, points: &[NormPoint], closed: bool, thickness: f32, color: Rgba<u8>) {
        let (width, height) = self.dimensions();
        if let Some(path) = pixel_path(points, width, height, closed) {
            self.stroke(&path, thickness, color);
        }
    }

    /// `self` with `overlay` drawn on top
    #[must_use]
    pub fn composite(&self, overlay: &Surface) -> RgbaImage {
        let Some(base) = self.pixmap.as_ref() else {
            return RgbaImage::new(0, 0);
        };
        let mut out = base.clone();
        if let Some(top) = overlay.pixmap.as_ref() {
            out.draw_pixmap(0, 0, top.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        }
        to_rgba_image(&out)
    }

    fn stroke(&mut self, path: &Path, thickness: f32, color: Rgba<u8>) {
        let stroke = Stroke {
            width: thickness,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.stroke_path(path, &paint(color), &stroke, Transform::identity(), None);
        }
    }
}

fn paint(color: Rgba<u8>) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;
    paint
}

/// Path through normalized points scaled to a `width` x `height` pixmap
fn pixel_path(points: &[NormPoint], width: u32, height: u32, closed: bool) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    let (x, y) = first.to_pixels(width, height);
    pb.move_to(x, y);
    for point in rest {
        let (x, y) = point.to_pixels(width, height);
        pb.line_to(x, y);
    }
    if closed {
        pb.close();
    }
    pb.finish()
}

fn to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let px = src.demultiply();
        *dst = Rgba([px.red(), px.green(), px.blue(), px.alpha()]);
    }
    image
}

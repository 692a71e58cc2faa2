//! Annotated PNG target (imageproc).
//!
//! Draws in raster pixels, y down, directly onto a copy of the page
//! background. One output image per page.

use super::{metrics, RenderTarget};
use crate::error::WeldMapError;
use crate::geometry::FrameKind;
use crate::model::{Page, Point, Rgb, Size};
use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut,
};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

fn rgba(c: Rgb) -> Rgba<u8> {
    Rgba([c.0, c.1, c.2, 255])
}

fn px(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Load a TrueType/OpenType font for raster labels.
///
/// Returns `None` (with a warning) when the file is missing or unreadable;
/// labels then keep their backdrop but no glyphs are drawn.
pub fn load_font(path: &Path) -> Option<Arc<FontVec>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!("Label font {} unavailable: {e}", path.display());
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(Arc::new(font)),
        Err(e) => {
            warn!("Label font {} is not a usable font: {e}", path.display());
            None
        }
    }
}

/// Renders each page into its own RGBA image.
pub struct RasterTarget {
    font: Option<Arc<FontVec>>,
    current: Option<RgbaImage>,
    finished: Vec<RgbaImage>,
}

impl RasterTarget {
    pub fn new(font: Option<Arc<FontVec>>) -> Self {
        Self {
            font,
            current: None,
            finished: Vec::new(),
        }
    }

    fn canvas(&mut self) -> Result<&mut RgbaImage, WeldMapError> {
        self.current
            .as_mut()
            .ok_or_else(|| WeldMapError::Internal("raster drawing outside of a page".into()))
    }
}

/// Stroke one segment `width` pixels wide as a fan of parallel hairlines.
fn thick_segment(img: &mut RgbaImage, a: Point, b: Point, color: Rgba<u8>, width: f64) {
    let len = a.distance_to(b);
    if len <= f64::EPSILON || width <= 1.0 {
        draw_line_segment_mut(img, px(a), px(b), color);
        return;
    }
    let (nx, ny) = (-(b.y - a.y) / len, (b.x - a.x) / len);
    let steps = (width * 2.0).ceil() as usize;
    for i in 0..=steps {
        let o = -width / 2.0 + width * i as f64 / steps as f64;
        let (p, q) = (a.translated(nx * o, ny * o), b.translated(nx * o, ny * o));
        draw_line_segment_mut(img, px(p), px(q), color);
    }
}

/// Integer polygon with consecutive duplicates and the closing repeat removed.
fn polygon_points(path: &[Point]) -> Vec<imageproc::point::Point<i32>> {
    let mut pts: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(path.len());
    for p in path {
        let q = imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32);
        if pts.last() != Some(&q) {
            pts.push(q);
        }
    }
    while pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

impl RenderTarget for RasterTarget {
    type Output = Vec<RgbaImage>;

    fn frame_kind(&self) -> FrameKind {
        FrameKind::PageRaster
    }

    fn units_per_pixel(&self) -> f64 {
        1.0
    }

    fn flip_y(&self) -> bool {
        false
    }

    fn begin_page(
        &mut self,
        _page: &Page,
        background: DynamicImage,
        _size: Size,
    ) -> Result<(), WeldMapError> {
        self.current = Some(background.to_rgba8());
        Ok(())
    }

    fn stroke_path(
        &mut self,
        path: &[Point],
        closed: bool,
        color: Rgb,
        width: f64,
    ) -> Result<(), WeldMapError> {
        let img = self.canvas()?;
        let color = rgba(color);
        let mut segments: Vec<(Point, Point)> = path.windows(2).map(|w| (w[0], w[1])).collect();
        if closed && path.len() > 2 {
            if let (Some(first), Some(last)) = (path.first(), path.last()) {
                segments.push((*last, *first));
            }
        }
        for (a, b) in segments {
            thick_segment(img, a, b, color, width);
        }
        // Round joins.
        if width > 2.0 {
            let r = (width / 2.0).round() as i32;
            for p in path {
                draw_filled_circle_mut(img, (p.x.round() as i32, p.y.round() as i32), r, color);
            }
        }
        Ok(())
    }

    fn fill_path(&mut self, path: &[Point], color: Rgb) -> Result<(), WeldMapError> {
        let pts = polygon_points(path);
        if pts.len() < 3 {
            return Ok(());
        }
        let img = self.canvas()?;
        draw_polygon_mut(img, &pts, rgba(color));
        Ok(())
    }

    fn measure_text(&self, text: &str, size: f64) -> Size {
        match &self.font {
            Some(font) => {
                let scale = PxScale::from(size as f32);
                let (w, h) = imageproc::drawing::text_size(scale, font.as_ref(), text);
                Size::new(f64::from(w), f64::from(h).max(size))
            }
            None => metrics::text_size(text, size),
        }
    }

    fn draw_text(
        &mut self,
        text: &str,
        min: Point,
        _max: Point,
        size: f64,
        color: Rgb,
    ) -> Result<(), WeldMapError> {
        let Some(font) = self.font.clone() else {
            return Ok(());
        };
        let img = self.canvas()?;
        draw_text_mut(
            img,
            rgba(color),
            min.x.round() as i32,
            min.y.round() as i32,
            PxScale::from(size as f32),
            font.as_ref(),
            text,
        );
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), WeldMapError> {
        if let Some(img) = self.current.take() {
            self.finished.push(img);
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<RgbaImage>, WeldMapError> {
        Ok(self.finished)
    }
}

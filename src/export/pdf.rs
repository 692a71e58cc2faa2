//! PDF output target (printpdf).
//!
//! Units are PDF points, origin bottom-left. A page is the background raster
//! scaled by 0.75 (96 dpi pixels → 72 dpi points), and the background is
//! placed at 96 dpi so it covers the page exactly.

use super::{metrics, RenderTarget};
use crate::error::WeldMapError;
use crate::geometry::FrameKind;
use crate::model::{Page, Point, Rgb, Size};
use image::DynamicImage;
use printpdf::{
    image_crate, BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};
use std::io::BufWriter;
use tracing::debug;

/// Points per raster pixel.
pub const PX_TO_PT: f64 = 0.75;
/// Resolution at which a background of `w` pixels spans `w · PX_TO_PT` points.
const BACKGROUND_DPI: f64 = 72.0 / PX_TO_PT;
const MM_PER_PT: f64 = 25.4 / 72.0;

fn mm(pt: f64) -> Mm {
    Mm(pt * MM_PER_PT)
}

fn pdf_point(p: Point) -> printpdf::Point {
    printpdf::Point::new(mm(p.x), mm(p.y))
}

fn pdf_color(c: Rgb) -> Color {
    let (r, g, b) = c.to_unit();
    Color::Rgb(printpdf::Rgb::new(r, g, b, None))
}

fn export_failed(e: impl std::fmt::Debug) -> WeldMapError {
    WeldMapError::ExportFailed {
        detail: format!("{e:?}"),
    }
}

/// Assembles a multi-page PDF in memory.
pub struct PdfTarget {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    layer: Option<PdfLayerReference>,
    pages: usize,
}

impl PdfTarget {
    pub fn new(title: &str) -> Result<Self, WeldMapError> {
        let doc = PdfDocument::empty(title);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(export_failed)?;
        Ok(Self {
            doc,
            font,
            layer: None,
            pages: 0,
        })
    }

    fn layer(&self) -> Result<&PdfLayerReference, WeldMapError> {
        self.layer
            .as_ref()
            .ok_or_else(|| WeldMapError::Internal("PDF drawing outside of a page".into()))
    }
}

impl RenderTarget for PdfTarget {
    type Output = Vec<u8>;

    fn frame_kind(&self) -> FrameKind {
        FrameKind::OutputDocument
    }

    fn units_per_pixel(&self) -> f64 {
        PX_TO_PT
    }

    fn flip_y(&self) -> bool {
        true
    }

    fn begin_page(
        &mut self,
        page: &Page,
        background: DynamicImage,
        size: Size,
    ) -> Result<(), WeldMapError> {
        let title = format!("Page {}", page.index + 1);
        let (page_idx, layer_idx) = self.doc.add_page(mm(size.width), mm(size.height), title);
        let layer = self.doc.get_page(page_idx).get_layer(layer_idx);

        // printpdf carries its own `image` version; hand it raw RGB samples.
        let rgb = background.to_rgb8();
        let (w, h) = rgb.dimensions();
        let raw = image_crate::RgbImage::from_raw(w, h, rgb.into_raw());
        let buffer = raw.ok_or_else(|| WeldMapError::DecodeFailure {
            page: page.index + 1,
            detail: "background sample buffer has wrong length".into(),
        })?;
        let converted = image_crate::DynamicImage::ImageRgb8(buffer);
        let image = Image::from_dynamic_image(&converted);
        image.add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(0.0)),
                dpi: Some(BACKGROUND_DPI),
                ..Default::default()
            },
        );
        debug!(
            "PDF page {}: {:.1}x{:.1} pt",
            page.index + 1,
            size.width,
            size.height
        );

        self.layer = Some(layer);
        self.pages += 1;
        Ok(())
    }

    fn stroke_path(
        &mut self,
        path: &[Point],
        closed: bool,
        color: Rgb,
        width: f64,
    ) -> Result<(), WeldMapError> {
        if path.len() < 2 {
            return Ok(());
        }
        let layer = self.layer()?;
        layer.set_outline_color(pdf_color(color));
        layer.set_outline_thickness(width);
        layer.add_shape(Line {
            points: path.iter().map(|p| (pdf_point(*p), false)).collect(),
            is_closed: closed,
            has_fill: false,
            has_stroke: true,
            is_clipping_path: false,
        });
        Ok(())
    }

    fn fill_path(&mut self, path: &[Point], color: Rgb) -> Result<(), WeldMapError> {
        if path.len() < 3 {
            return Ok(());
        }
        let layer = self.layer()?;
        layer.set_fill_color(pdf_color(color));
        layer.add_shape(Line {
            points: path.iter().map(|p| (pdf_point(*p), false)).collect(),
            is_closed: true,
            has_fill: true,
            has_stroke: false,
            is_clipping_path: false,
        });
        Ok(())
    }

    fn measure_text(&self, text: &str, size: f64) -> Size {
        metrics::text_size(text, size)
    }

    fn draw_text(
        &mut self,
        text: &str,
        min: Point,
        _max: Point,
        size: f64,
        color: Rgb,
    ) -> Result<(), WeldMapError> {
        let font = self.font.clone();
        let layer = self.layer()?;
        layer.set_fill_color(pdf_color(color));
        // `min` is the bottom-left of the line box; text sits on the baseline.
        let baseline = min.y + metrics::descent(size);
        layer.use_text(text, size, mm(min.x), mm(baseline), &font);
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), WeldMapError> {
        self.layer = None;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, WeldMapError> {
        if self.pages == 0 {
            return Err(WeldMapError::ExportFailed {
                detail: "document has no pages".into(),
            });
        }
        let mut buf = Vec::new();
        {
            let mut writer = BufWriter::new(&mut buf);
            self.doc.save(&mut writer).map_err(export_failed)?;
            writer.into_inner().map_err(export_failed)?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::png;
    use super::super::{export_pdf, DisplaySpace, ExportPipeline};
    use super::*;
    use crate::config::SymbolStyle;
    use crate::model::{Annotation, AnnotationType, CanvasInfo};

    #[test]
    fn background_dpi_matches_page_size() {
        // 800 px at 96 dpi = 600 pt.
        assert!((800.0 * 72.0 / BACKGROUND_DPI - 800.0 * PX_TO_PT).abs() < 1e-9);
    }

    #[test]
    fn writes_pdf_bytes() {
        let mut page = Page::from_encoded(0, png(80, 60)).unwrap();
        let anchor = Point::new(20.0, 20.0);
        let weld = Annotation::new("FW-1", AnnotationType::FieldWeld, anchor, 0)
            .with_target(Point::new(60.0, 40.0))
            .with_label("FW");
        page.annotations.push(weld);
        let canvas = CanvasInfo::new(80.0, 60.0);
        let (bytes, report) = export_pdf(&[page], canvas, SymbolStyle::default(), "test").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(report.pages, 1);
        assert_eq!(report.labels, 1);
        assert_eq!(report.connectors, 1);
    }

    #[test]
    fn no_pages_is_an_error() {
        let target = PdfTarget::new("empty").unwrap();
        let style = SymbolStyle::default();
        let r = ExportPipeline::new(&[], DisplaySpace::PageRaster, style, target).run();
        assert!(matches!(r, Err(WeldMapError::ExportFailed { .. })));
    }
}

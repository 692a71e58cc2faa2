//! Export pipeline: page backgrounds plus every annotation, into one output.
//!
//! ## State machine
//!
//! ```text
//! Init ──▶ DrawBackground(0) ──▶ DrawAnnotations(0) ──▶ DrawBackground(1) ──▶ …
//!                                                                  └──▶ Finalize
//! ```
//!
//! `Init` validates the display space and fixes the stroke width for the
//! whole export. Each page then gets its own [`CoordinateFrame`] (display
//! size → that page's output size), which never changes while the page is
//! drawn. `Finalize` hands the assembled output back from the target.
//!
//! ## Targets
//!
//! The same pipeline produces the PDF export ([`pdf::PdfTarget`]) and the
//! annotated PNGs of the upload flow ([`raster::RasterTarget`]). Targets only
//! stroke, fill and print text in their own units; all geometry comes from
//! [`crate::geometry`].

pub mod metrics;
pub mod pdf;
pub mod raster;

use crate::config::SymbolStyle;
use crate::error::WeldMapError;
use crate::geometry::{connector, ConnectorStyle, CoordinateFrame, FrameKind, ShapeRenderer};
use crate::model::{Annotation, CanvasInfo, Page, Point, Rgb, Shape, Size};
use image::DynamicImage;
use tracing::{debug, info};

/// A drawing surface the pipeline renders into.
///
/// Coordinates passed to the drawing methods are already in target units.
pub trait RenderTarget {
    type Output;

    /// Which frame this target's coordinates live in.
    fn frame_kind(&self) -> FrameKind;

    /// Target units per raster pixel of the page background.
    fn units_per_pixel(&self) -> f64;

    /// Whether the target's Y axis points up.
    fn flip_y(&self) -> bool;

    /// Output page size for `page`.
    fn page_size(&self, page: &Page) -> Size {
        let k = self.units_per_pixel();
        Size::new(f64::from(page.width) * k, f64::from(page.height) * k)
    }

    /// Start a page of `size` with `background` stretched over all of it.
    fn begin_page(
        &mut self,
        page: &Page,
        background: DynamicImage,
        size: Size,
    ) -> Result<(), WeldMapError>;

    fn stroke_path(
        &mut self,
        path: &[Point],
        closed: bool,
        color: Rgb,
        width: f64,
    ) -> Result<(), WeldMapError>;

    fn fill_path(&mut self, path: &[Point], color: Rgb) -> Result<(), WeldMapError>;

    /// Extent of `text` at `size` target units.
    fn measure_text(&self, text: &str, size: f64) -> Size;

    /// Print `text` inside the box `min..max` (normalised, target units).
    fn draw_text(
        &mut self,
        text: &str,
        min: Point,
        max: Point,
        size: f64,
        color: Rgb,
    ) -> Result<(), WeldMapError>;

    fn end_page(&mut self) -> Result<(), WeldMapError>;

    fn finish(self) -> Result<Self::Output, WeldMapError>;
}

/// The space annotation coordinates are expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplaySpace {
    /// Client canvas; same display size for every page.
    Canvas(CanvasInfo),
    /// Each page's own raster pixels (automatic mode).
    PageRaster,
}

/// Counts gathered while exporting, for logs and callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub pages: usize,
    pub symbols: usize,
    pub connectors: usize,
    pub labels: usize,
}

/// Per-page constants, all in target units.
#[derive(Debug, Clone, Copy)]
struct PageContext {
    frame: CoordinateFrame,
    shapes: ShapeRenderer,
    connector: ConnectorStyle,
    font_size: f64,
    label_margin: f64,
    label_padding: f64,
}

enum Stage {
    Init,
    DrawBackground(usize),
    DrawAnnotations(usize, PageContext),
    Finalize,
}

/// Drives one export over `pages` into `target`.
pub struct ExportPipeline<'a, T: RenderTarget> {
    pages: &'a [Page],
    display: DisplaySpace,
    style: SymbolStyle,
    target: T,
    stroke_width: f64,
    report: ExportReport,
}

impl<'a, T: RenderTarget> ExportPipeline<'a, T> {
    pub fn new(pages: &'a [Page], display: DisplaySpace, style: SymbolStyle, target: T) -> Self {
        Self {
            pages,
            display,
            style,
            target,
            stroke_width: style.stroke_width,
            report: ExportReport::default(),
        }
    }

    /// Run to completion. Any page failure aborts the whole export.
    pub fn run(mut self) -> Result<(T::Output, ExportReport), WeldMapError> {
        let pages = self.pages;
        let mut stage = Stage::Init;
        loop {
            stage = match stage {
                Stage::Init => {
                    self.init()?;
                    if pages.is_empty() {
                        Stage::Finalize
                    } else {
                        Stage::DrawBackground(0)
                    }
                }
                Stage::DrawBackground(i) => {
                    let ctx = self.draw_background(&pages[i])?;
                    Stage::DrawAnnotations(i, ctx)
                }
                Stage::DrawAnnotations(i, ctx) => {
                    let page = &pages[i];
                    let index = page.index;
                    for a in page.annotations.iter().filter(|a| a.page_index == index) {
                        self.draw_annotation(&ctx, a)?;
                    }
                    self.target.end_page()?;
                    self.report.pages += 1;
                    if i + 1 < pages.len() {
                        Stage::DrawBackground(i + 1)
                    } else {
                        Stage::Finalize
                    }
                }
                Stage::Finalize => {
                    info!(
                        "Export finished: {} pages, {} symbols, {} connectors, {} labels",
                        self.report.pages,
                        self.report.symbols,
                        self.report.connectors,
                        self.report.labels
                    );
                    let report = self.report;
                    return Ok((self.target.finish()?, report));
                }
            };
        }
    }

    // ── Init ─────────────────────────────────────────────────────────────

    fn init(&mut self) -> Result<(), WeldMapError> {
        if let DisplaySpace::Canvas(canvas) = self.display {
            let d = canvas.display_size();
            if !(d.width.is_finite() && d.height.is_finite() && d.width > 0.0 && d.height > 0.0) {
                return Err(WeldMapError::TransformConfig {
                    detail: format!(
                        "canvas {}x{} (dpr {}, zoom {}) has no usable display size",
                        canvas.width,
                        canvas.height,
                        canvas.device_pixel_ratio,
                        canvas.zoom
                    ),
                });
            }
        }
        self.stroke_width = self.style.stroke_width * self.target.units_per_pixel();
        debug!(
            "Export init: {} pages, {:?}, stroke {:.3}",
            self.pages.len(), self.display, self.stroke_width
        );
        Ok(())
    }

    // ── DrawBackground ───────────────────────────────────────────────────

    fn draw_background(&mut self, page: &Page) -> Result<PageContext, WeldMapError> {
        let background = page.decode()?;
        let output = self.target.page_size(page);
        let display = match self.display {
            DisplaySpace::Canvas(canvas) => canvas.display_size(),
            DisplaySpace::PageRaster => page.raster_size(),
        };
        let kind = self.target.frame_kind();
        let flip = self.target.flip_y();
        let frame = CoordinateFrame::from_dimensions(kind, display, output, flip)?;
        self.target.begin_page(page, background, output)?;

        let s = &self.style;
        let ctx = PageContext {
            frame,
            shapes: ShapeRenderer::new(frame.scale_length(s.unit_size)),
            connector: ConnectorStyle {
                tip_gap: frame.scale_length(s.tip_gap),
                head_size: if s.arrowhead {
                    frame.scale_length(s.arrowhead_size)
                } else {
                    0.0
                },
            },
            font_size: frame.scale_length(s.label_font_size),
            label_margin: frame.scale_length(s.label_margin),
            label_padding: frame.scale_length(s.label_padding),
        };
        debug!(
            "Page {}: output {:.1}x{:.1}, scale {:.4}x{:.4}, unit {:.2}",
            page.index + 1,
            output.width,
            output.height,
            frame.scale_x,
            frame.scale_y,
            ctx.shapes.unit_size()
        );
        Ok(ctx)
    }

    // ── DrawAnnotations ──────────────────────────────────────────────────

    fn draw_annotation(&mut self, ctx: &PageContext, a: &Annotation) -> Result<(), WeldMapError> {
        let color = a.kind.color();
        let anchor = ctx.frame.apply(a.anchor);

        // Connector first so the shape outline stays on top.
        if let Some(target) = a.connector_target() {
            let target = ctx.frame.apply(target);
            if let Some(c) = connector(anchor, target, ctx.connector) {
                self.target
                    .stroke_path(&[c.start, c.end], false, color, self.stroke_width)?;
                if let Some(head) = c.head {
                    self.target.fill_path(&head, color)?;
                }
                self.report.connectors += 1;
            }
        }

        let geometry = ctx.shapes.render(a.shape, anchor, color);
        for primitive in &geometry.primitives {
            self.target.stroke_path(
                &primitive.to_path(),
                primitive.is_closed(),
                geometry.color,
                self.stroke_width,
            )?;
        }
        self.report.symbols += 1;

        if let Some(label) = a.label.as_deref() {
            self.draw_label(ctx, a.shape, anchor, label, color)?;
            self.report.labels += 1;
        }
        debug!(
            "Drew {} {:?} at ({:.2}, {:.2})",
            a.id, a.shape, anchor.x, anchor.y
        );
        Ok(())
    }

    fn draw_label(
        &mut self,
        ctx: &PageContext,
        shape: Shape,
        anchor: Point,
        label: &str,
        color: Rgb,
    ) -> Result<(), WeldMapError> {
        let text = self.target.measure_text(label, ctx.font_size);
        let pad = ctx.label_padding;
        let down = ctx.frame.down();

        let near = anchor.y + down * (ctx.shapes.half_height(shape) + ctx.label_margin);
        let far = near + down * (text.height + 2.0 * pad);
        let (y0, y1) = (near.min(far), near.max(far));
        let half = text.width / 2.0 + pad;
        let (x0, x1) = (anchor.x - half, anchor.x + half);

        let backdrop = [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ];
        self.target.fill_path(&backdrop, Rgb::WHITE)?;
        self.target
            .stroke_path(&backdrop, true, color, self.stroke_width / 2.0)?;
        self.target.draw_text(
            label,
            Point::new(x0 + pad, y0 + pad),
            Point::new(x1 - pad, y1 - pad),
            ctx.font_size,
            color,
        )
    }
}

/// Export `pages` as a PDF whose coordinates match `canvas`.
pub fn export_pdf(
    pages: &[Page],
    canvas: CanvasInfo,
    style: SymbolStyle,
    title: &str,
) -> Result<(Vec<u8>, ExportReport), WeldMapError> {
    let target = pdf::PdfTarget::new(title)?;
    ExportPipeline::new(pages, DisplaySpace::Canvas(canvas), style, target).run()
}

#[cfg(test)]
pub(crate) mod testing {
    //! A target that records calls instead of drawing.

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Op {
        Begin { page: usize, size: Size },
        Stroke {
            path: Vec<Point>,
            closed: bool,
            color: Rgb,
            width: f64,
        },
        Fill { path: Vec<Point>, color: Rgb },
        Text {
            text: String,
            min: Point,
            max: Point,
        },
        End,
    }

    pub struct RecordingTarget {
        pub units_per_pixel: f64,
        pub flip_y: bool,
        pub ops: Vec<Op>,
    }

    impl RecordingTarget {
        pub fn pdf_like() -> Self {
            Self {
                units_per_pixel: 0.75,
                flip_y: true,
                ops: Vec::new(),
            }
        }
    }

    impl RenderTarget for RecordingTarget {
        type Output = Vec<Op>;

        fn frame_kind(&self) -> FrameKind {
            FrameKind::OutputDocument
        }

        fn units_per_pixel(&self) -> f64 {
            self.units_per_pixel
        }

        fn flip_y(&self) -> bool {
            self.flip_y
        }

        fn begin_page(
            &mut self,
            page: &Page,
            _bg: DynamicImage,
            size: Size,
        ) -> Result<(), WeldMapError> {
            self.ops.push(Op::Begin {
                page: page.index,
                size,
            });
            Ok(())
        }

        fn stroke_path(
            &mut self,
            path: &[Point],
            closed: bool,
            color: Rgb,
            width: f64,
        ) -> Result<(), WeldMapError> {
            self.ops.push(Op::Stroke {
                path: path.to_vec(),
                closed,
                color,
                width,
            });
            Ok(())
        }

        fn fill_path(&mut self, path: &[Point], color: Rgb) -> Result<(), WeldMapError> {
            self.ops.push(Op::Fill {
                path: path.to_vec(),
                color,
            });
            Ok(())
        }

        fn measure_text(&self, text: &str, size: f64) -> Size {
            Size::new(text.len() as f64 * size * 0.5, size)
        }

        fn draw_text(
            &mut self,
            text: &str,
            min: Point,
            max: Point,
            _size: f64,
            _color: Rgb,
        ) -> Result<(), WeldMapError> {
            self.ops.push(Op::Text {
                text: text.to_string(),
                min,
                max,
            });
            Ok(())
        }

        fn end_page(&mut self) -> Result<(), WeldMapError> {
            self.ops.push(Op::End);
            Ok(())
        }

        fn finish(self) -> Result<Self::Output, WeldMapError> {
            Ok(self.ops)
        }
    }

    pub fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([250, 250, 250]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }
}

//! PDF rasterisation: every page to a PNG via pdfium.
//!
//! [`PageRasterizer`] is the seam: production uses [`PdfiumRasterizer`],
//! tests plug in a stub returning canned pages.
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state. Implementations are synchronous and callers move them onto
//! `tokio::task::spawn_blocking`.
//!
//! Pages render at `render_scale` (2x by default) and the longest edge is
//! capped at `max_rendered_pixels` regardless of physical sheet size.

use crate::config::WeldMapConfig;
use crate::error::WeldMapError;
use crate::pipeline::encode::encode_png;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    /// 0-based page index.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Converts a PDF on disk into page images, in page order.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<RasterPage>, WeldMapError>;
}

/// pdfium-backed rasteriser.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    scale: f32,
    max_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(config: &WeldMapConfig) -> Self {
        Self {
            scale: config.render_scale,
            max_pixels: config.max_rendered_pixels,
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
        }
    }

    /// Use an explicit pdfium library instead of `PDFIUM_LIB_PATH` / system lookup.
    pub fn with_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    fn bind(&self) -> Result<Pdfium, WeldMapError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        };
        bindings
            .map(Pdfium::new)
            .map_err(|e| WeldMapError::PdfiumBindingFailed(format!("{e:?}")))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<RasterPage>, WeldMapError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| WeldMapError::CorruptPdf {
                detail: format!("{e:?}"),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);
        if total_pages == 0 {
            return Err(WeldMapError::CorruptPdf {
                detail: "document has no pages".into(),
            });
        }

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.scale)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut results = Vec::with_capacity(total_pages);
        for idx in 0..total_pages {
            let page = pages
                .get(idx as u16)
                .map_err(|e| WeldMapError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| WeldMapError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

            let image = bitmap.as_image();
            let (width, height) = (image.width(), image.height());
            let png = encode_png(&image).map_err(|e| WeldMapError::RasterisationFailed {
                page: idx + 1,
                detail: e.to_string(),
            })?;
            debug!(
                "Rendered page {} → {}x{} px ({} bytes)",
                idx + 1, width, height, png.len()
            );

            results.push(RasterPage {
                index: idx,
                width,
                height,
                png,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterizer_takes_scale_from_config() {
        let config = WeldMapConfig::builder()
            .render_scale(3.0)
            .max_rendered_pixels(1500)
            .build()
            .unwrap();
        let lib = Path::new("/opt/pdfium/libpdfium.so");
        let r = PdfiumRasterizer::new(&config).with_library(lib);
        assert_eq!(r.scale, 3.0);
        assert_eq!(r.max_pixels, 1500);
        assert_eq!(r.library_path.as_deref(), Some(lib));
    }

    #[test]
    fn missing_library_is_binding_error() {
        let config = WeldMapConfig::default();
        let r = PdfiumRasterizer::new(&config).with_library("/nonexistent/libpdfium.so");
        assert!(matches!(
            r.rasterize(Path::new("/nonexistent.pdf")),
            Err(WeldMapError::PdfiumBindingFailed(_))
        ));
    }
}

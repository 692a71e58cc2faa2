//! Upload flow: PDF bytes → page images → detected components → weld map.
//!
//! ```text
//! check_pdf ─▶ scratch file ─▶ rasterize ─▶ detect (per page) ─▶ place ─▶ draw
//!                 (tempfile)    (blocking)    (no retry)          (bands)  (raster target)
//! ```
//!
//! Pages are handled strictly in order. A detector failure never aborts the
//! upload: the page keeps its background, gets zero annotations, and the
//! reason is reported in its [`PageAnalysis`].

use crate::config::WeldMapConfig;
use crate::error::WeldMapError;
use crate::export::raster::{load_font, RasterTarget};
use crate::export::{DisplaySpace, ExportPipeline};
use crate::geometry::SymbolPlacementSolver;
use crate::ingest::{DetectedComponent, SchemaVersion};
use crate::model::{Annotation, AnnotationType, Page, Size};
use crate::pipeline::detect::ComponentDetector;
use crate::pipeline::encode::encode_png;
use crate::pipeline::render::{PageRasterizer, RasterPage};
use ab_glyph::FontVec;
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Outcome of the detector for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageAnalysis {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaVersion>,
    pub components: Vec<DetectedComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One processed page of an upload.
#[derive(Debug, Clone)]
pub struct AnnotatedPage {
    /// 0-based page index.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub original_png: Vec<u8>,
    pub annotated_png: Vec<u8>,
    pub analysis: PageAnalysis,
    pub annotations: Vec<Annotation>,
}

/// Everything produced for one uploaded PDF.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub mode: &'static str,
    pub pages: Vec<AnnotatedPage>,
}

impl UploadResult {
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }
}

/// Reject anything that is not named `.pdf` or lacks the `%PDF` header.
pub fn check_pdf(filename: &str, bytes: &[u8]) -> Result<(), WeldMapError> {
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(WeldMapError::invalid(format!("'{filename}' is not a PDF file")));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(WeldMapError::NotAPdf { magic });
    }
    Ok(())
}

/// Write `bytes` to a private scratch file and rasterise it off the async runtime.
///
/// The scratch file is removed when this returns, whatever the outcome.
pub async fn rasterize_upload(
    bytes: Vec<u8>,
    rasterizer: Arc<dyn PageRasterizer>,
) -> Result<Vec<RasterPage>, WeldMapError> {
    tokio::task::spawn_blocking(move || {
        let mut scratch = tempfile::Builder::new()
            .prefix("weldmap-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| WeldMapError::Internal(format!("scratch file: {e}")))?;
        scratch
            .write_all(&bytes)
            .and_then(|_| scratch.flush())
            .map_err(|e| WeldMapError::Internal(format!("scratch file: {e}")))?;
        let path = scratch.path();
        debug!("Scratch PDF at {} ({} bytes)", path.display(), bytes.len());
        rasterizer.rasterize(path)
    })
    .await
    .map_err(|e| WeldMapError::Internal(format!("rasteriser task failed: {e}")))?
}

/// Per-type counters that produce `FW-1`, `FW-2`, `SW-1`, …
#[derive(Debug, Default)]
struct IdSequence(HashMap<AnnotationType, usize>);

impl IdSequence {
    fn next(&mut self, kind: AnnotationType) -> String {
        let n = self.0.entry(kind).or_insert(0);
        *n += 1;
        format!("{}-{}", kind.code(), n)
    }
}

/// Turn detected components into placed annotations for one page.
fn place_components(
    page_index: usize,
    page: Size,
    components: &[DetectedComponent],
    config: &WeldMapConfig,
    ids: &mut IdSequence,
) -> Vec<Annotation> {
    let mut solver = SymbolPlacementSolver::new(page, config.placement);
    let annotations = components
        .iter()
        .map(|c| {
            let placement = solver.place(c.position);
            let mut a = Annotation::new(ids.next(c.kind), c.kind, placement.anchor, page_index);
            if placement.show_connector {
                a = a.with_target(placement.target);
            }
            match (c.kind, &c.label) {
                (AnnotationType::PipeSupport, Some(tag)) => a.with_label(tag.clone()),
                (kind, _) if config.auto_labels => a.with_label(kind.code()),
                _ => a,
            }
        })
        .collect();
    let bands = solver.band_counts();
    debug!("Page {}: band usage {:?}", page_index + 1, bands);
    annotations
}

/// Draw `annotations` over the page background, in raster pixels.
fn draw_page(
    raster: &RasterPage,
    annotations: Vec<Annotation>,
    config: &WeldMapConfig,
    font: Option<Arc<FontVec>>,
) -> Result<Vec<u8>, WeldMapError> {
    let page = Page {
        index: raster.index,
        image: raster.png.clone(),
        width: raster.width,
        height: raster.height,
        annotations,
    };
    let pages = [page];
    let target = RasterTarget::new(font);
    let pipeline = ExportPipeline::new(&pages, DisplaySpace::PageRaster, config.style, target);
    let (images, report) = pipeline.run()?;
    debug!("Page {}: drew {:?}", raster.index + 1, report);

    let image = images
        .into_iter()
        .next()
        .ok_or_else(|| WeldMapError::Internal("raster target produced no image".into()))?;
    encode_png(&DynamicImage::ImageRgba8(image)).map_err(|e| WeldMapError::ExportFailed {
        detail: format!("page {}: {e}", raster.index + 1),
    })
}

/// Run the whole upload flow for one PDF.
pub async fn process_upload(
    filename: &str,
    bytes: Vec<u8>,
    rasterizer: Arc<dyn PageRasterizer>,
    detector: &dyn ComponentDetector,
    config: Arc<WeldMapConfig>,
) -> Result<UploadResult, WeldMapError> {
    check_pdf(filename, &bytes)?;
    let rasters = rasterize_upload(bytes, rasterizer).await?;
    info!(
        "'{}': {} page(s) rendered, detector = {}",
        filename, rasters.len(), detector.name()
    );

    let font = config.label_font.as_deref().and_then(load_font);
    let mut ids = IdSequence::default();
    let mut pages = Vec::with_capacity(rasters.len());

    for raster in rasters {
        let size = Size::new(f64::from(raster.width), f64::from(raster.height));
        let analysis = match detector.detect(&raster).await {
            Ok(a) => PageAnalysis {
                success: true,
                schema: Some(a.schema),
                components: a.components,
                error: None,
            },
            Err(e) => {
                warn!(
                    "Page {}: continuing without components: {}",
                    raster.index + 1, e
                );
                PageAnalysis {
                    success: false,
                    schema: None,
                    components: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };

        let annotations =
            place_components(raster.index, size, &analysis.components, &config, &mut ids);
        let drawn = annotations.clone();
        let job_config = Arc::clone(&config);
        let job_font = font.clone();
        let (raster, annotated_png) = tokio::task::spawn_blocking(move || {
            draw_page(&raster, drawn, &job_config, job_font).map(|png| (raster, png))
        })
        .await
        .map_err(|e| WeldMapError::Internal(format!("drawing task failed: {e}")))??;

        info!(
            "Page {}: {} component(s), {} annotation(s)",
            raster.index + 1,
            analysis.components.len(),
            annotations.len()
        );
        pages.push(AnnotatedPage {
            index: raster.index,
            width: raster.width,
            height: raster.height,
            original_png: raster.png,
            annotated_png,
            analysis,
            annotations,
        });
    }

    Ok(UploadResult {
        mode: detector.name(),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::export::testing::png;
    use crate::ingest::Analysis;
    use crate::model::Point;
    use crate::pipeline::detect::DemoDetector;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    struct StubRasterizer {
        pages: usize,
        seen: Mutex<Option<PathBuf>>,
    }

    impl StubRasterizer {
        fn new(pages: usize) -> Arc<Self> {
            Arc::new(Self {
                pages,
                seen: Mutex::new(None),
            })
        }
    }

    impl PageRasterizer for StubRasterizer {
        fn rasterize(&self, pdf_path: &Path) -> Result<Vec<RasterPage>, WeldMapError> {
            assert!(std::fs::read(pdf_path).unwrap().starts_with(b"%PDF"));
            *self.seen.lock().unwrap() = Some(pdf_path.to_path_buf());
            Ok((0..self.pages)
                .map(|index| RasterPage {
                    index,
                    width: 800,
                    height: 600,
                    png: png(800, 600),
                })
                .collect())
        }
    }

    struct FailingRasterizer {
        seen: Mutex<Option<PathBuf>>,
    }

    impl PageRasterizer for FailingRasterizer {
        fn rasterize(&self, pdf_path: &Path) -> Result<Vec<RasterPage>, WeldMapError> {
            assert!(pdf_path.exists());
            *self.seen.lock().unwrap() = Some(pdf_path.to_path_buf());
            Err(WeldMapError::CorruptPdf {
                detail: "boom".into(),
            })
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl ComponentDetector for FailingDetector {
        fn name(&self) -> &'static str {
            "ai"
        }

        async fn detect(&self, page: &RasterPage) -> Result<Analysis, AnalysisError> {
            Err(AnalysisError::Timeout {
                page: page.index + 1,
                secs: 90,
            })
        }
    }

    const PDF: &[u8] = b"%PDF-1.7\n%stub\n";

    fn config() -> Arc<WeldMapConfig> {
        Arc::new(WeldMapConfig::default())
    }

    #[test]
    fn check_pdf_rules() {
        assert!(check_pdf("iso.PDF", PDF).is_ok());
        assert!(matches!(
            check_pdf("iso.png", PDF),
            Err(WeldMapError::InvalidInput { .. })
        ));
        assert!(matches!(
            check_pdf("iso.pdf", b"\x89PNG...."),
            Err(WeldMapError::NotAPdf { magic }) if &magic == b"\x89PNG"
        ));
        assert!(matches!(
            check_pdf("iso.pdf", b"%P"),
            Err(WeldMapError::NotAPdf { .. })
        ));
    }

    #[test]
    fn ids_count_per_type() {
        let mut ids = IdSequence::default();
        assert_eq!(ids.next(AnnotationType::FieldWeld), "FW-1");
        assert_eq!(ids.next(AnnotationType::ShopWeld), "SW-1");
        assert_eq!(ids.next(AnnotationType::FieldWeld), "FW-2");
    }

    #[test]
    fn placement_labels_and_connectors() {
        let components = vec![
            DetectedComponent {
                kind: AnnotationType::PipeSupport,
                position: Point::new(300.0, 350.0),
                label: Some("PS-1".into()),
                source_id: None,
            },
            DetectedComponent {
                kind: AnnotationType::FieldWeld,
                position: Point::new(50.0, 300.0),
                label: None,
                source_id: None,
            },
        ];
        let config = WeldMapConfig::default();
        let page = Size::new(800.0, 600.0);
        let mut ids = IdSequence::default();
        let a = place_components(0, page, &components, &config, &mut ids);
        assert_eq!(a[0].label.as_deref(), Some("PS-1"));
        assert_eq!(a[1].label.as_deref(), Some("FW"));
        assert_eq!(a[1].id, "FW-1");
        assert!(a[1].anchor.x > 800.0 * 2.0 / 3.0);
        assert_eq!(a[1].target, Some(Point::new(50.0, 300.0)));
    }

    #[test]
    fn auto_labels_off_keeps_support_tags() {
        let config = WeldMapConfig::builder().auto_labels(false).build().unwrap();
        let kinds = [AnnotationType::ShopWeld, AnnotationType::PipeSupport];
        let components = kinds.map(|kind| DetectedComponent {
            kind,
            position: Point::new(400.0, 100.0),
            label: (kind == AnnotationType::PipeSupport).then(|| "S-2".to_string()),
            source_id: None,
        });
        let mut ids = IdSequence::default();
        let a = place_components(0, Size::new(800.0, 600.0), &components, &config, &mut ids);
        assert_eq!(a[0].label, None);
        assert_eq!(a[1].label.as_deref(), Some("S-2"));
    }

    #[tokio::test]
    async fn demo_upload_annotates_every_page() {
        let rasterizer = StubRasterizer::new(2);
        let stub = rasterizer.clone();
        let result = process_upload("demo.pdf", PDF.to_vec(), stub, &DemoDetector, config())
            .await
            .unwrap();

        assert_eq!(result.mode, "demo");
        assert_eq!(result.total_pages(), 2);
        for page in &result.pages {
            assert!(page.analysis.success);
            assert_eq!(page.analysis.components.len(), page.annotations.len());
            assert_ne!(page.annotated_png, page.original_png);
            let decoded = image::load_from_memory(&page.annotated_png).unwrap();
            assert_eq!(decoded.width(), 800);
        }
        let all: Vec<&Annotation> = result.pages.iter().flat_map(|p| &p.annotations).collect();
        let ids: HashSet<&str> = all.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), all.len());

        let scratch = rasterizer.seen.lock().unwrap().clone().unwrap();
        assert!(!scratch.exists(), "scratch file left behind");
    }

    #[tokio::test]
    async fn detector_failure_falls_back_to_background() {
        let stub = StubRasterizer::new(1);
        let result = process_upload("iso.pdf", PDF.to_vec(), stub, &FailingDetector, config())
            .await
            .unwrap();
        let page = &result.pages[0];
        assert!(!page.analysis.success);
        let error = page.analysis.error.as_deref().unwrap();
        assert!(error.contains("timed out"));
        assert!(page.annotations.is_empty());
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_before_rasterising() {
        let rasterizer = StubRasterizer::new(1);
        let stub = rasterizer.clone();
        let err = process_upload("iso.pdf", b"GIF89a".to_vec(), stub, &DemoDetector, config())
            .await
            .unwrap_err();
        assert!(matches!(err, WeldMapError::NotAPdf { .. }));
        assert!(rasterizer.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn scratch_file_removed_when_rasteriser_fails() {
        let rasterizer = Arc::new(FailingRasterizer {
            seen: Mutex::new(None),
        });
        let err = rasterize_upload(PDF.to_vec(), rasterizer.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, WeldMapError::CorruptPdf { .. }));
        let scratch = rasterizer.seen.lock().unwrap().clone().unwrap();
        assert!(!scratch.exists(), "scratch file left behind");
    }
}

//! # weldmap
//!
//! Weld maps for piping isometrics: rasterise a PDF drawing, detect welds,
//! supports and flanges with a vision LLM, place symbols in the page margins
//! and export an annotated PDF whose coordinates match the editing canvas.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PDF)
//!  │
//!  ├─ 1. Render   rasterise every page via pdfium (spawn_blocking)
//!  ├─ 2. Detect   one vision call per page, no retries
//!  ├─ 3. Ingest   any supported reply schema → detected components
//!  ├─ 4. Place    margin-band solver: anchor + connector target per component
//!  └─ 5. Draw     annotated PNG per page (raster target)
//!
//! export (page images + symbols + canvas)
//!  └─ ExportPipeline: background, then connector/shape/label per symbol (PDF target)
//! ```
//!
//! Both outputs run the same [`export::ExportPipeline`] over the same
//! [`geometry`] functions; only the render target differs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use weldmap::{export_pdf, model::{assemble_pages, CanvasInfo}, SymbolStyle};
//!
//! fn main() -> Result<(), weldmap::WeldMapError> {
//!     let png = std::fs::read("page1.png").expect("page image");
//!     let pages = assemble_pages(vec![png], Vec::new())?;
//!     let canvas = CanvasInfo::new(800.0, 600.0);
//!     let (pdf, report) = export_pdf(&pages, canvas, SymbolStyle::default(), "weld map")?;
//!     std::fs::write("weld_map.pdf", pdf).expect("write");
//!     eprintln!("{} page(s), {} symbol(s)", report.pages, report.symbols);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP surface and the `weldmap-server` binary |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod annotate;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use annotate::{process_upload, AnnotatedPage, PageAnalysis, UploadResult};
pub use config::{PlacementConfig, SymbolStyle, WeldMapConfig, WeldMapConfigBuilder};
pub use error::{AnalysisError, WeldMapError};
pub use export::{export_pdf, ExportReport};
pub use model::{
    Annotation, AnnotationRecord, AnnotationType, CanvasInfo, Page, Point, Shape, Size,
};

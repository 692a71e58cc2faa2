//! Error types for the weldmap library.
//!
//! * [`WeldMapError`] is **fatal**: the request cannot proceed at all (not a
//!   PDF, corrupt page image, zero-sized canvas, out-of-range page index). It
//!   is surfaced to the client as a single error with no partial output.
//!
//! * [`AnalysisError`] is **non-fatal**: the vision model for one page failed
//!   or timed out. It is stored inside [`crate::annotate::PageAnalysis`] next
//!   to an empty component list, and the background-only page still renders.

use thiserror::Error;

/// All fatal errors returned by the weldmap library.
#[derive(Debug, Error)]
pub enum WeldMapError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Request payload is malformed or incomplete.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A required request field (e.g. the multipart `file`) is absent.
    #[error("Missing required field '{field}'")]
    MissingField { field: String },

    /// The uploaded bytes are not a PDF.
    #[error("File is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// An annotation refers to a page that does not exist.
    #[error("Annotation '{id}' references page {page}, but only {total} page(s) were supplied")]
    PageOutOfRange {
        id: String,
        page: usize,
        total: usize,
    },

    /// Two annotations in the same request share an id.
    #[error("Duplicate annotation id '{id}'")]
    DuplicateAnnotationId { id: String },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// A page's background image (or the PDF itself) could not be decoded.
    #[error("Failed to decode page {page}: {detail}")]
    DecodeFailure { page: usize, detail: String },

    /// The PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Geometry errors ───────────────────────────────────────────────────
    /// Display or output dimensions are zero, negative or not finite.
    #[error("Invalid coordinate frame: {detail}")]
    TransformConfig { detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output document could not be assembled or serialised.
    #[error("Export failed: {detail}")]
    ExportFailed { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WeldMapError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// A non-fatal analysis failure for a single page.
///
/// The page still renders; it simply carries no detected components.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum AnalysisError {
    /// No vision provider is available for this request.
    #[error("Vision analysis unavailable: {reason}")]
    Unavailable { reason: String },

    /// The provider returned an error.
    #[error("Page {page}: LLM call failed: {detail}")]
    LlmFailed { page: usize, detail: String },

    /// The provider did not answer within the configured timeout.
    #[error("Page {page}: LLM call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The reply contained no parseable JSON object.
    #[error("Page {page}: could not parse model reply: {detail}")]
    UnparseableResponse { page: usize, detail: String },

    /// The reply was JSON but matched no known analysis schema.
    #[error("Page {page}: reply matches no known analysis schema")]
    UnknownSchema { page: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_out_of_range_display() {
        let e = WeldMapError::PageOutOfRange {
            id: "FW-1".into(),
            page: 3,
            total: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("FW-1"), "got: {msg}");
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("2 page"), "got: {msg}");
    }

    #[test]
    fn not_a_pdf_shows_magic() {
        let e = WeldMapError::NotAPdf {
            magic: *b"\x89PNG",
        };
        assert!(e.to_string().contains("137"));
    }

    #[test]
    fn timeout_display() {
        let e = AnalysisError::Timeout { page: 2, secs: 90 };
        assert!(e.to_string().contains("90s"));
        assert!(e.to_string().contains("Page 2"));
    }

    #[test]
    fn analysis_error_serialises() {
        let e = AnalysisError::UnknownSchema { page: 1 };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("UnknownSchema"));
    }
}

//! Request handlers under `/api`.

use super::error::{AppError, AppResult};
use super::state::AppState;
use crate::annotate::{check_pdf, process_upload, rasterize_upload, PageAnalysis, UploadResult};
use crate::error::{AnalysisError, WeldMapError};
use crate::export::export_pdf;
use crate::model::{assemble_pages, resolve_records, AnnotationRecord, CanvasInfo};
use crate::pipeline::detect::ComponentDetector;
use crate::pipeline::encode::{decode_base64_image, to_base64};
use crate::pipeline::llm::ping;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/test-ai", get(test_ai))
        .route("/upload-pdf", post(upload_pdf))
        .route("/demo-upload", post(demo_upload))
        .route("/upload-pdf-only", post(upload_pdf_only))
        .route("/export-pdf", post(export_pdf_handler))
        .route("/export-annotations", post(export_annotations))
}

// ── Health / connectivity ────────────────────────────────────────────────

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "weldmap",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/test-ai
///
/// Always 200; the outcome is in `success`.
async fn test_ai(State(state): State<AppState>) -> Json<Value> {
    let Some(provider) = state.provider.as_ref() else {
        let unavailable = AnalysisError::Unavailable {
            reason: "no vision provider configured".into(),
        };
        return Json(json!({
            "success": false,
            "error": unavailable.to_string(),
        }));
    };
    match ping(provider, &state.config).await {
        Ok(reply) => Json(json!({
            "success": true,
            "message": "Vision provider connection successful",
            "response": reply,
        })),
        Err(e) => Json(json!({
            "success": false,
            "error": e.to_string(),
        })),
    }
}

// ── Uploads ──────────────────────────────────────────────────────────────

/// Pull the `file` part out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> AppResult<(String, Vec<u8>)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Rejected {
        status: e.status(),
        detail: e.body_text(),
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| AppError::Rejected {
            status: e.status(),
            detail: e.body_text(),
        })?;
        return Ok((filename, data.to_vec()));
    }
    let missing = WeldMapError::MissingField {
        field: "file".into(),
    };
    Err(missing.into())
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    file_id: String,
    filename: String,
    total_pages: usize,
    mode: &'static str,
    results: Vec<PageResult>,
}

#[derive(Debug, Serialize)]
struct PageResult {
    page: usize,
    width: u32,
    height: u32,
    image_base64: String,
    original_image: String,
    analysis: PageAnalysis,
    weld_annotations: Vec<AnnotationRecord>,
    processed: bool,
}

impl UploadResponse {
    fn new(filename: String, result: UploadResult) -> Self {
        let total_pages = result.total_pages();
        let results = result
            .pages
            .into_iter()
            .map(|p| PageResult {
                page: p.index + 1,
                width: p.width,
                height: p.height,
                image_base64: to_base64(&p.annotated_png),
                original_image: to_base64(&p.original_png),
                processed: p.analysis.success,
                analysis: p.analysis,
                weld_annotations: p.annotations.iter().map(AnnotationRecord::from).collect(),
            })
            .collect();
        Self {
            success: true,
            file_id: Uuid::new_v4().to_string(),
            filename,
            total_pages,
            mode: result.mode,
            results,
        }
    }
}

async fn run_upload(
    state: AppState,
    mut multipart: Multipart,
    detector: Arc<dyn ComponentDetector>,
) -> AppResult<Json<UploadResponse>> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;
    let result = process_upload(
        &filename,
        bytes,
        Arc::clone(&state.rasterizer),
        detector.as_ref(),
        Arc::clone(&state.config),
    )
    .await?;
    Ok(Json(UploadResponse::new(filename, result)))
}

const NO_PROVIDER_HINT: &str =
    "Set OPENAI_API_KEY (or another provider key) and restart, or use /api/demo-upload.";

/// POST /api/upload-pdf
async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let detector = state.detector.clone();
    let detector = detector.ok_or_else(|| WeldMapError::ProviderNotConfigured {
        provider: "vision".into(),
        hint: NO_PROVIDER_HINT.into(),
    })?;
    run_upload(state, multipart, detector).await
}

/// POST /api/demo-upload
async fn demo_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let detector = Arc::clone(&state.demo);
    run_upload(state, multipart, detector).await
}

/// POST /api/upload-pdf-only
///
/// Rasterise without analysis; the client places symbols by hand.
async fn upload_pdf_only(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;
    check_pdf(&filename, &bytes)?;
    let pages = rasterize_upload(bytes, Arc::clone(&state.rasterizer)).await?;
    info!(
        "'{}': {} page(s) rendered for manual annotation",
        filename, pages.len()
    );

    let images: Vec<Value> = pages
        .iter()
        .map(|p| {
            json!({
                "page": p.index + 1,
                "width": p.width,
                "height": p.height,
                "image_base64": to_base64(&p.png),
            })
        })
        .collect();
    Ok(Json(json!({
        "success": true,
        "file_id": Uuid::new_v4().to_string(),
        "filename": filename,
        "total_pages": images.len(),
        "images": images,
        "message": "PDF converted to images. Place symbols manually.",
    })))
}

// ── Export ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub filename: String,
    pub images: Vec<String>,
    #[serde(default)]
    pub symbols: Vec<AnnotationRecord>,
    pub canvas: CanvasInfo,
}

fn bad_json(rejection: JsonRejection) -> AppError {
    WeldMapError::invalid(rejection.body_text()).into()
}

/// Restrict to `[A-Za-z0-9._-]`, drop any directory part, force a single `.pdf`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().map(safe_char).collect();
    let mut stem = cleaned.trim_end_matches('.');
    while let Some(rest) = strip_pdf_suffix(stem) {
        stem = rest.trim_end_matches('.');
    }
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        "weld_map.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}

fn safe_char(c: char) -> char {
    if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
        c
    } else {
        '_'
    }
}

/// `name` without a trailing `.pdf` in any case, if it has one.
fn strip_pdf_suffix(name: &str) -> Option<&str> {
    let cut = name.len().checked_sub(4)?;
    let suffix = name.get(cut..)?;
    suffix.eq_ignore_ascii_case(".pdf").then_some(&name[..cut])
}

/// POST /api/export-pdf
async fn export_pdf_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload.map_err(bad_json)?;
    let filename = sanitize_filename(&req.filename);

    let images = req
        .images
        .iter()
        .enumerate()
        .map(|(i, s)| decode_base64_image(i, s))
        .collect::<Result<Vec<_>, _>>()?;
    let pages = assemble_pages(images, req.symbols)?;
    info!(
        "Export '{}': {} page(s), {} symbol(s), canvas {}x{}",
        filename,
        pages.len(),
        pages.iter().map(|p| p.annotations.len()).sum::<usize>(),
        req.canvas.width,
        req.canvas.height
    );

    let style = state.config.style;
    let canvas = req.canvas;
    let title = filename.trim_end_matches(".pdf").to_string();
    let job = move || export_pdf(&pages, canvas, style, &title);
    let (bytes, report) = tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| AppError::InternalError(format!("export task failed: {e}")))??;
    let size = bytes.len();
    info!("Export '{}' done: {:?}, {} bytes", filename, report, size);

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct AnnotationsRequest {
    symbols: Vec<AnnotationRecord>,
    #[serde(default)]
    total_pages: Option<usize>,
}

/// POST /api/export-annotations
///
/// Validates the symbol list; nothing is stored.
async fn export_annotations(
    payload: Result<Json<AnnotationsRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = payload.map_err(bad_json)?;
    let count = req.symbols.len();
    resolve_records(req.symbols, req.total_pages.unwrap_or(usize::MAX))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{count} annotation(s) accepted"),
        "symbols_count": count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_sanitised() {
        let spaced = sanitize_filename("ISO-1001 rev A.pdf");
        assert_eq!(spaced, "ISO-1001_rev_A.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd.pdf");
        assert_eq!(sanitize_filename("map.PDF"), "map.pdf");
        assert_eq!(sanitize_filename(""), "weld_map.pdf");
        assert_eq!(sanitize_filename("..."), "weld_map.pdf");
        assert_eq!(sanitize_filename("schéma"), "sch_ma.pdf");
    }

    #[test]
    fn repeated_pdf_suffixes_collapse_to_one() {
        assert_eq!(sanitize_filename("a.pdf.pdf"), "a.pdf");
        assert_eq!(sanitize_filename("a.PDF.pdf"), "a.pdf");
        assert_eq!(sanitize_filename("a.pdf..pdf."), "a.pdf");
        assert_eq!(sanitize_filename(".pdf.pdf"), "weld_map.pdf");
        assert_eq!(sanitize_filename("pdf.pdf"), "pdf.pdf");
    }
}

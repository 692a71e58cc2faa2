use crate::error::WeldMapError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`WeldMapError`] for domain errors and adds the request-shape
/// failures axum reports before a handler body runs. Every variant renders
/// as `{"detail": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] WeldMapError),

    /// Request body rejected by an extractor, with the status it chose.
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// HTTP status for a domain error.
pub fn status_for(err: &WeldMapError) -> StatusCode {
    match err {
        WeldMapError::InvalidInput { .. }
        | WeldMapError::NotAPdf { .. }
        | WeldMapError::PageOutOfRange { .. }
        | WeldMapError::DuplicateAnnotationId { .. }
        | WeldMapError::TransformConfig { .. } => StatusCode::BAD_REQUEST,
        WeldMapError::DecodeFailure { .. }
        | WeldMapError::CorruptPdf { .. }
        | WeldMapError::MissingField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WeldMapError::ProviderNotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Core(core) => {
                let status = status_for(core);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %core, "Request failed");
                    (status, INTERNAL_MESSAGE.to_string())
                } else {
                    tracing::warn!(error = %core, status = %status, "Request rejected");
                    (status, core.to_string())
                }
            }
            AppError::Rejected { status, detail } => (*status, detail.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, INTERNAL_MESSAGE.to_string())
            }
        };

        (status, axum::Json(json!({ "detail": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let invalid = WeldMapError::invalid("no images");
        assert_eq!(status_for(&invalid), StatusCode::BAD_REQUEST);
        let missing = WeldMapError::MissingField {
            field: "file".into(),
        };
        assert_eq!(status_for(&missing), StatusCode::UNPROCESSABLE_ENTITY);
        let corrupt = WeldMapError::CorruptPdf {
            detail: "xref".into(),
        };
        assert_eq!(status_for(&corrupt), StatusCode::UNPROCESSABLE_ENTITY);
        let unconfigured = WeldMapError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: String::new(),
        };
        assert_eq!(status_for(&unconfigured), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&WeldMapError::PdfiumBindingFailed("dlopen".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_are_sanitised() {
        let core = WeldMapError::Internal("secret path /srv/x".into());
        let resp = AppError::Core(core).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

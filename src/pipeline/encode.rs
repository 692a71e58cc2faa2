//! PNG / base64 conversions at the system boundary.
//!
//! Pages travel as PNG bytes inside the service and as base64 strings on the
//! wire. PNG keeps thin linework and small weld dots intact for the model.

use crate::error::WeldMapError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode one base64 page image from an export request.
///
/// Accepts bare base64 as well as `data:image/png;base64,` URIs.
pub fn decode_base64_image(page: usize, input: &str) -> Result<Vec<u8>, WeldMapError> {
    let payload = match input.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => input,
    };
    let cleaned: String = payload.split_ascii_whitespace().collect();
    STANDARD.decode(cleaned).map_err(|e| WeldMapError::DecodeFailure {
        page: page + 1,
        detail: format!("invalid base64: {e}"),
    })
}

/// Wrap PNG bytes for a vision request.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// looking at a single 512 px overview, which loses weld symbols entirely.
pub fn vision_image(png: &[u8]) -> ImageData {
    let b64 = to_base64(png);
    debug!("Encoded page → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

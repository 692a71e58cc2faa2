//! Upload-side stages: PDF on disk to analysed page images.
//!
//! ```text
//! render ──▶ encode ──▶ llm ──▶ extract ──▶ detect
//! (pdfium)   (base64)   (VLM)   (JSON)      (ingest)
//! ```
//!
//! 1. [`render`]  rasterise every page; blocking, callers use `spawn_blocking`
//! 2. [`encode`]  PNG / base64 helpers and the `ImageData` the VLM receives
//! 3. [`llm`]     provider resolution and the single timed vision call
//! 4. [`extract`] pull the JSON object out of a free-form reply
//! 5. [`detect`]  the `ComponentDetector` seam tying the above to [`crate::ingest`]

pub mod detect;
pub mod encode;
pub mod extract;
pub mod llm;
pub mod render;

//! Prompts for vision analysis of isometric piping drawings.
//!
//! Centralising the prompts keeps the request-building code in
//! [`crate::pipeline::llm`] free of prose and lets unit tests inspect them
//! directly. Callers can override the system prompt via
//! [`crate::config::WeldMapConfig::system_prompt`].
//!
//! The reply schema requested here is the `pipes / fittings / supports /
//! weld_points` layout. Replies in the `green_pipes / weld_joints` layout are
//! still accepted by [`crate::ingest`].

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an expert in analyzing isometric engineering drawings. \
    You specialize in identifying pipe components, fittings, supports, and generating \
    accurate weld maps with coordinate information.";

const ANALYSIS_TEMPLATE: &str = r#"Analyze this isometric engineering drawing. The image is {width} x {height} pixels; every coordinate you report must be an [x, y] pixel position in that image, origin top-left.

1. COMPONENT IDENTIFICATION
   - Identify all straight pipe sections with their start and end coordinates
   - Locate pipe fittings (elbows, tees, flanges, reducers) with positions
   - Find pipe supports (labels starting with PS- or S-) with coordinates

2. WELD POINT DETECTION
   - Identify every pipe joint where welding is required
   - Look for existing weld symbols or joint indicators
   - Classify each joint as field_joint or shop_joint

3. COMPONENT DETAILS
   - Extract visible pipe schedules, diameters or materials

Respond with JSON only, in exactly this format:
{
  "pipes": [
    {"id": "pipe_1", "start_coords": [x1, y1], "end_coords": [x2, y2], "diameter": "if visible", "material": "if visible"}
  ],
  "fittings": [
    {"id": "fitting_1", "type": "elbow|tee|flange|reducer", "coords": [x, y], "connections": ["pipe_1"]}
  ],
  "supports": [
    {"id": "support_1", "label": "PS-1", "coords": [x, y], "type": "pipe_support"}
  ],
  "weld_points": [
    {"id": "weld_1", "coords": [x, y], "type": "field_joint|shop_joint", "connected_components": ["pipe_1"]}
  ],
  "drawing_info": {"scale": "if visible", "title": "if visible", "dimensions": "if visible"}
}"#;

/// User-turn instruction for one page of `width × height` pixels.
pub fn analysis_prompt(width: u32, height: u32) -> String {
    ANALYSIS_TEMPLATE
        .replace("{width}", &width.to_string())
        .replace("{height}", &height.to_string())
}

/// Short round-trip used by the connectivity check endpoint.
pub const PING_PROMPT: &str = "Reply with the single word: ready";

//! JSON extraction from free-form vision-model replies.
//!
//! Even when told to "respond with JSON only", models wrap the object in
//! ```` ```json ```` fences, prepend a sentence of commentary, or append a
//! closing remark. Two cheap deterministic rules recover the object:
//!
//! 1. If a fenced ` ```json ` block exists, take its body.
//! 2. Otherwise take the span from the first `{` to the last `}`.
//!
//! Anything left that does not parse is reported as unparseable; the caller
//! decides whether that is fatal (it never is for page analysis).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)\s*\n?(.*?)```").unwrap());

/// Locate the JSON text inside `reply`.
pub fn json_candidate(reply: &str) -> &str {
    if let Some(caps) = RE_JSON_FENCE.captures(reply) {
        if let Some(body) = caps.get(1) {
            return body.as_str().trim();
        }
    }
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => reply.trim(),
    }
}

/// Parse the JSON object embedded in `reply`.
pub fn extract_json(reply: &str) -> Result<Value, serde_json::Error> {
    let candidate = json_candidate(reply);
    serde_json::from_str(candidate)
}

//! Analysis-schema adapter: any supported AI reply layout → detected components.
//!
//! The reply contract has changed across prompt revisions:
//!
//! | Version | Sections |
//! |---------|----------|
//! | [`SchemaVersion::LegacyV1`] | `pipes`, `fittings`, `supports`, `weld_points` |
//! | [`SchemaVersion::WeldJointsV2`] | `green_pipes`, `weld_joints`, optional `supports` |
//!
//! Both are normalised into one [`DetectedComponent`] list. Individual
//! entries are read leniently (coordinates as `[x, y]` or `{x, y}`, missing
//! optional keys); a reply that matches neither version is rejected as
//! unknown.

use crate::model::{AnnotationType, Point, Size};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Two components of the same type closer than this are the same component.
const DEDUPE_DISTANCE: f64 = 1.0;

/// Which reply layout was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    LegacyV1,
    WeldJointsV2,
}

/// One component the vision model reported, in page pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedComponent {
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    pub position: Point,
    /// Tag read off the drawing (support labels), if any.
    pub label: Option<String>,
    /// Id the model gave the source entry.
    pub source_id: Option<String>,
}

/// Normalised analysis of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub schema: SchemaVersion,
    pub components: Vec<DetectedComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawing_info: Option<Value>,
}

/// Recognise the schema of `reply`, or `None` if it matches neither version.
pub fn detect_schema(reply: &Value) -> Option<SchemaVersion> {
    let obj = reply.as_object()?;
    if obj.contains_key("green_pipes") || obj.contains_key("weld_joints") {
        Some(SchemaVersion::WeldJointsV2)
    } else if ["pipes", "fittings", "supports", "weld_points"]
        .iter()
        .any(|k| obj.contains_key(*k))
    {
        Some(SchemaVersion::LegacyV1)
    } else {
        None
    }
}

/// Normalise `reply` for a page of `page` pixels.
///
/// Coordinates are clamped into the page; entries without usable
/// coordinates are skipped; same-type duplicates within 1 px are dropped.
pub fn normalize(reply: &Value, page: Size) -> Option<Analysis> {
    let schema = detect_schema(reply)?;
    let obj = reply.as_object()?;

    let mut builder = ComponentList::new(page);
    match schema {
        SchemaVersion::LegacyV1 => ingest_legacy(obj, &mut builder),
        SchemaVersion::WeldJointsV2 => ingest_weld_joints(obj, &mut builder),
    }
    debug!(
        "Normalised {:?} reply: {} components ({} duplicates dropped)",
        schema, builder.items.len(), builder.duplicates
    );
    Some(Analysis {
        schema,
        components: builder.items,
        drawing_info: obj.get("drawing_info").cloned(),
    })
}

// ── Schema versions ──────────────────────────────────────────────────────

fn ingest_legacy(obj: &Map<String, Value>, out: &mut ComponentList) {
    for pipe in entries(obj, "pipes") {
        let id = entry_id(pipe);
        let start = pipe.get("start_coords").and_then(coord);
        let end = pipe.get("end_coords").and_then(coord);
        for p in [start, end].into_iter().flatten() {
            out.push(AnnotationType::FieldWeld, p, None, id.clone());
        }
        if let (Some(a), Some(b)) = (start, end) {
            out.push(AnnotationType::PipeSection, midpoint(a, b), None, id);
        }
    }

    for weld in entries(obj, "weld_points") {
        if let Some(p) = weld.get("coords").and_then(coord) {
            out.push(joint_kind(weld), p, None, entry_id(weld));
        }
    }

    ingest_supports(obj, out);

    for fitting in entries(obj, "fittings") {
        let kind = text(fitting, "type").unwrap_or_default();
        if !kind.to_ascii_lowercase().contains("flange") {
            continue;
        }
        if let Some(p) = fitting.get("coords").and_then(coord) {
            out.push(AnnotationType::FlangeJoint, p, None, entry_id(fitting));
        }
    }
}

fn ingest_weld_joints(obj: &Map<String, Value>, out: &mut ComponentList) {
    for pipe in entries(obj, "green_pipes") {
        let path = pipe_path(pipe);
        if let Some(mid) = path_midpoint(&path) {
            out.push(AnnotationType::PipeSection, mid, None, entry_id(pipe));
        }
    }

    for joint in entries(obj, "weld_joints") {
        let p = ["coords", "position", "location"]
            .iter()
            .find_map(|k| joint.get(*k).and_then(coord))
            .or_else(|| coord(joint));
        if let Some(p) = p {
            out.push(joint_kind(joint), p, None, entry_id(joint));
        }
    }

    ingest_supports(obj, out);
}

fn ingest_supports(obj: &Map<String, Value>, out: &mut ComponentList) {
    for support in entries(obj, "supports") {
        if let Some(p) = support.get("coords").and_then(coord) {
            let label = text(support, "label")
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or("PS")
                .to_string();
            let id = entry_id(support);
            out.push(AnnotationType::PipeSupport, p, Some(label), id);
        }
    }
}

// ── Entry helpers ────────────────────────────────────────────────────────

fn entries<'a>(obj: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|v| v.is_object())
}

fn text<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn entry_id(v: &Value) -> Option<String> {
    match v.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Field/shop/flange from a joint's `type`; field weld for any other or
/// missing type.
fn joint_kind(v: &Value) -> AnnotationType {
    let t = text(v, "type").unwrap_or_default().to_ascii_lowercase();
    if t.contains("shop") {
        AnnotationType::ShopWeld
    } else if t.contains("flange") {
        AnnotationType::FlangeJoint
    } else {
        AnnotationType::FieldWeld
    }
}

/// `[x, y]` or `{x, y}`.
fn coord(v: &Value) -> Option<Point> {
    let (x, y) = match v {
        Value::Array(a) if a.len() >= 2 => (a[0].as_f64()?, a[1].as_f64()?),
        Value::Object(o) => (o.get("x")?.as_f64()?, o.get("y")?.as_f64()?),
        _ => return None,
    };
    let p = Point::new(x, y);
    p.is_finite().then_some(p)
}

fn pipe_path(pipe: &Value) -> Vec<Point> {
    for key in ["points", "coords", "path"] {
        if let Some(Value::Array(items)) = pipe.get(key) {
            let pts: Vec<Point> = items.iter().filter_map(coord).collect();
            if !pts.is_empty() {
                return pts;
            }
        }
    }
    [pipe.get("start_coords"), pipe.get("end_coords")]
        .into_iter()
        .flatten()
        .filter_map(coord)
        .collect()
}

fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Point halfway along a polyline by arc length.
fn path_midpoint(path: &[Point]) -> Option<Point> {
    let first = *path.first()?;
    let total: f64 = path.windows(2).map(|w| w[0].distance_to(w[1])).sum();
    if total <= f64::EPSILON {
        return Some(first);
    }
    let mut remaining = total / 2.0;
    for w in path.windows(2) {
        let len = w[0].distance_to(w[1]);
        if remaining <= len {
            let t = remaining / len;
            let (a, b) = (w[0], w[1]);
            return Some(Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t));
        }
        remaining -= len;
    }
    path.last().copied()
}

// ── Accumulator ──────────────────────────────────────────────────────────

struct ComponentList {
    page: Size,
    items: Vec<DetectedComponent>,
    duplicates: usize,
}

impl ComponentList {
    fn new(page: Size) -> Self {
        Self {
            page,
            items: Vec::new(),
            duplicates: 0,
        }
    }

    fn push(
        &mut self,
        kind: AnnotationType,
        p: Point,
        label: Option<String>,
        source_id: Option<String>,
    ) {
        let x = p.x.clamp(0.0, self.page.width.max(0.0));
        let y = p.y.clamp(0.0, self.page.height.max(0.0));
        let position = Point::new(x, y);
        let duplicate = self
            .items
            .iter()
            .any(|c| c.kind == kind && c.position.distance_to(position) < DEDUPE_DISTANCE);
        if duplicate {
            self.duplicates += 1;
            return;
        }
        self.items.push(DetectedComponent {
            kind,
            position,
            label,
            source_id,
        });
    }
}

// ── Demo data ────────────────────────────────────────────────────────────

/// Fixed analysis used by the demo flow, in the legacy layout.
pub fn demo_analysis() -> Value {
    json!({
        "pipes": [
            {"id": "pipe_1", "start_coords": [150, 300], "end_coords": [450, 300],
             "diameter": "6\"", "material": "CS"},
            {"id": "pipe_2", "start_coords": [450, 300], "end_coords": [750, 200],
             "diameter": "6\"", "material": "CS"}
        ],
        "fittings": [
            {"id": "elbow_1", "type": "elbow", "coords": [450, 300],
             "connections": ["pipe_1", "pipe_2"]}
        ],
        "supports": [
            {"id": "support_1", "label": "PS-1", "coords": [300, 350], "type": "pipe_support"},
            {"id": "support_2", "label": "S-2", "coords": [600, 250], "type": "pipe_support"}
        ],
        "weld_points": [
            {"id": "weld_1", "coords": [200, 300], "type": "shop_joint",
             "connected_components": ["pipe_1"]},
            {"id": "weld_2", "coords": [400, 300], "type": "shop_joint",
             "connected_components": ["pipe_1"]}
        ],
        "drawing_info": {
            "scale": "1:100",
            "title": "Demo Isometric Drawing",
            "dimensions": "800x600"
        }
    })
}

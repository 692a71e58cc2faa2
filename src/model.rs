//! Annotation data model: symbols, pages and the wire records they travel in.
//!
//! ## Two annotation types
//!
//! [`AnnotationRecord`] is what clients send and receive: loose, partially
//! optional, accepting a couple of historical field layouts. [`Annotation`]
//! is what the geometry core consumes: every field resolved, the shape
//! explicit, the page index already checked against the document. The
//! conversion happens once, in [`assemble_pages`].

use crate::error::WeldMapError;
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;

// ── Primitives ───────────────────────────────────────────────────────────

/// A 2D point. Units depend on the frame it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Width and height in the units of the owning frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Components as 0.0–1.0 floats (PDF colour space).
    pub fn to_unit(self) -> (f64, f64, f64) {
        (
            f64::from(self.0) / 255.0,
            f64::from(self.1) / 255.0,
            f64::from(self.2) / 255.0,
        )
    }
}

// ── Symbol taxonomy ──────────────────────────────────────────────────────

/// What a symbol denotes. Determines the default shape and the colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    FieldWeld,
    ShopWeld,
    PipeSection,
    PipeSupport,
    FlangeJoint,
}

impl AnnotationType {
    pub const ALL: [AnnotationType; 5] = [
        AnnotationType::FieldWeld,
        AnnotationType::ShopWeld,
        AnnotationType::PipeSection,
        AnnotationType::PipeSupport,
        AnnotationType::FlangeJoint,
    ];

    pub fn default_shape(self) -> Shape {
        match self {
            AnnotationType::FieldWeld => Shape::Diamond,
            AnnotationType::ShopWeld => Shape::Circle,
            AnnotationType::PipeSection => Shape::RoundedRectangle,
            AnnotationType::PipeSupport => Shape::Rectangle,
            AnnotationType::FlangeJoint => Shape::Hexagon,
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            AnnotationType::FieldWeld => Rgb(0xFF, 0x44, 0x44),
            AnnotationType::ShopWeld => Rgb(0x44, 0xCC, 0xCC),
            AnnotationType::PipeSection => Rgb(0x44, 0x88, 0xFF),
            AnnotationType::PipeSupport => Rgb(0x44, 0xCC, 0x44),
            AnnotationType::FlangeJoint => Rgb(0xAA, 0x44, 0xFF),
        }
    }

    /// Short code used for generated ids and default labels.
    pub fn code(self) -> &'static str {
        match self {
            AnnotationType::FieldWeld => "FW",
            AnnotationType::ShopWeld => "SW",
            AnnotationType::PipeSection => "PIPE",
            AnnotationType::PipeSupport => "PS",
            AnnotationType::FlangeJoint => "FJ",
        }
    }
}

/// Outline drawn for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Diamond,
    Circle,
    Rectangle,
    #[serde(alias = "pill")]
    RoundedRectangle,
    Hexagon,
}

// ── Annotation ───────────────────────────────────────────────────────────

/// One placed or generated symbol, fully resolved.
///
/// Rendered geometry depends only on `shape` and `anchor`; `target` and
/// `label` are drawn in addition.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: String,
    pub kind: AnnotationType,
    pub shape: Shape,
    pub anchor: Point,
    pub target: Option<Point>,
    pub label: Option<String>,
    pub page_index: usize,
}

impl Annotation {
    pub fn new(
        id: impl Into<String>,
        kind: AnnotationType,
        anchor: Point,
        page_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            shape: kind.default_shape(),
            anchor,
            target: None,
            label: None,
            page_index,
        }
    }

    pub fn with_target(mut self, target: Point) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The target, if one is present and differs from the anchor.
    pub fn connector_target(&self) -> Option<Point> {
        self.target.filter(|t| *t != self.anchor)
    }
}

// ── Wire record ──────────────────────────────────────────────────────────

/// Annotation as exchanged with clients.
///
/// Deserialisation accepts the current `{anchor:{x,y}}` layout as well as the
/// flat `{x, y}` layout, and numeric ids. `shape` may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct AnnotationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    pub shape: Option<Shape>,
    pub anchor: Point,
    pub target: Option<Point>,
    pub label: Option<String>,
    pub page: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct RawRecord {
    id: RawId,
    #[serde(rename = "type")]
    kind: AnnotationType,
    #[serde(default)]
    shape: Option<Shape>,
    #[serde(default)]
    anchor: Option<Point>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    target: Option<Point>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    page: usize,
}

impl TryFrom<RawRecord> for AnnotationRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let id = match raw.id {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        };
        let anchor = match (raw.anchor, raw.x, raw.y) {
            (Some(p), _, _) => p,
            (None, Some(x), Some(y)) => Point::new(x, y),
            _ => return Err(format!("annotation '{id}' has no anchor")),
        };
        Ok(Self {
            id,
            kind: raw.kind,
            shape: raw.shape,
            anchor,
            target: raw.target,
            label: raw.label.filter(|l| !l.trim().is_empty()),
            page: raw.page,
        })
    }
}

impl From<&Annotation> for AnnotationRecord {
    fn from(a: &Annotation) -> Self {
        Self {
            id: a.id.clone(),
            kind: a.kind,
            shape: Some(a.shape),
            anchor: a.anchor,
            target: a.target,
            label: a.label.clone(),
            page: a.page_index,
        }
    }
}

impl AnnotationRecord {
    /// Resolve into a core [`Annotation`], checking the page index.
    pub fn into_annotation(self, page_count: usize) -> Result<Annotation, WeldMapError> {
        if self.id.trim().is_empty() {
            return Err(WeldMapError::invalid("annotation id must not be empty"));
        }
        if self.page >= page_count {
            return Err(WeldMapError::PageOutOfRange {
                id: self.id,
                page: self.page,
                total: page_count,
            });
        }
        if !self.anchor.is_finite() || self.target.is_some_and(|t| !t.is_finite()) {
            return Err(WeldMapError::invalid(format!(
                "annotation '{}' has non-finite coordinates",
                self.id
            )));
        }
        Ok(Annotation {
            shape: self.shape.unwrap_or_else(|| self.kind.default_shape()),
            id: self.id,
            kind: self.kind,
            anchor: self.anchor,
            target: self.target,
            label: self.label,
            page_index: self.page,
        })
    }
}

/// Validate a batch of records against a document of `page_count` pages.
pub fn resolve_records(
    records: Vec<AnnotationRecord>,
    page_count: usize,
) -> Result<Vec<Annotation>, WeldMapError> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .map(|r| {
            if !seen.insert(r.id.clone()) {
                return Err(WeldMapError::DuplicateAnnotationId { id: r.id });
            }
            r.into_annotation(page_count)
        })
        .collect()
}

// ── Canvas ───────────────────────────────────────────────────────────────

/// Client-reported canvas geometry.
///
/// `width`/`height` are the canvas backing-store size in device pixels.
/// Annotation coordinates live in the editor's unscaled stage space, so the
/// display size they refer to is `width / (device_pixel_ratio * zoom)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasInfo {
    pub width: f64,
    pub height: f64,
    #[serde(default = "unit", rename = "devicePixelRatio")]
    #[serde(alias = "device_pixel_ratio")]
    pub device_pixel_ratio: f64,
    #[serde(default = "unit")]
    pub zoom: f64,
}

fn unit() -> f64 {
    1.0
}

impl CanvasInfo {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
            zoom: 1.0,
        }
    }

    pub fn display_size(&self) -> Size {
        let divisor = self.device_pixel_ratio * self.zoom;
        Size::new(self.width / divisor, self.height / divisor)
    }
}

// ── Pages ────────────────────────────────────────────────────────────────

/// One rasterised drawing sheet and the annotations that belong to it.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    /// Encoded image bytes (PNG or JPEG).
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub annotations: Vec<Annotation>,
}

impl Page {
    /// Wrap encoded bytes, reading only the header for the pixel size.
    pub fn from_encoded(index: usize, image: Vec<u8>) -> Result<Self, WeldMapError> {
        let (width, height) = ImageReader::new(Cursor::new(&image))
            .with_guessed_format()
            .map_err(|e| decode_failure(index, e))?
            .into_dimensions()
            .map_err(|e| decode_failure(index, e))?;
        if width == 0 || height == 0 {
            return Err(decode_failure(index, "image has zero size"));
        }
        Ok(Self {
            index,
            image,
            width,
            height,
            annotations: Vec::new(),
        })
    }

    /// Fully decode the background image.
    pub fn decode(&self) -> Result<DynamicImage, WeldMapError> {
        image::load_from_memory(&self.image).map_err(|e| decode_failure(self.index, e))
    }

    pub fn raster_size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

fn decode_failure(index: usize, detail: impl std::fmt::Display) -> WeldMapError {
    WeldMapError::DecodeFailure {
        page: index + 1,
        detail: detail.to_string(),
    }
}

/// Build the page list for an export: validate every record, then read each
/// image's header and distribute annotations to their pages in insertion order.
pub fn assemble_pages(
    images: Vec<Vec<u8>>,
    records: Vec<AnnotationRecord>,
) -> Result<Vec<Page>, WeldMapError> {
    if images.is_empty() {
        return Err(WeldMapError::invalid("at least one page image is required"));
    }
    let annotations = resolve_records(records, images.len())?;

    let mut pages = images
        .into_iter()
        .enumerate()
        .map(|(i, bytes)| Page::from_encoded(i, bytes))
        .collect::<Result<Vec<_>, _>>()?;
    for a in annotations {
        let idx = a.page_index;
        pages[idx].annotations.push(a);
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn every_type_has_distinct_default_shape() {
        let shapes: HashSet<Shape> = AnnotationType::ALL
            .iter()
            .map(|t| t.default_shape())
            .collect();
        assert_eq!(shapes.len(), AnnotationType::ALL.len());
    }

    #[test]
    fn record_accepts_anchor_layout() {
        let r: AnnotationRecord = serde_json::from_str(
            r#"{"id":"a","type":"field_weld","shape":"diamond","anchor":{"x":1,"y":2},"target":null,"label":null,"page":0}"#,
        )
        .unwrap();
        assert_eq!(r.anchor, Point::new(1.0, 2.0));
        assert_eq!(r.shape, Some(Shape::Diamond));
    }

    #[test]
    fn record_accepts_flat_layout_and_numeric_id() {
        let json = r#"{"id":7,"type":"shop_weld","x":100,"y":150,"page":0}"#;
        let r: AnnotationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, "7");
        assert_eq!(r.anchor, Point::new(100.0, 150.0));
        assert_eq!(r.shape, None);
    }

    #[test]
    fn pill_is_rounded_rectangle() {
        let s: Shape = serde_json::from_str(r#""pill""#).unwrap();
        assert_eq!(s, Shape::RoundedRectangle);
    }

    #[test]
    fn record_without_anchor_is_rejected() {
        let r = serde_json::from_str::<AnnotationRecord>(r#"{"id":"a","type":"field_weld"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn missing_shape_derives_from_type() {
        let json = r#"{"id":"a","type":"flange_joint","anchor":{"x":0,"y":0}}"#;
        let r: AnnotationRecord = serde_json::from_str(json).unwrap();
        let a = r.into_annotation(1).unwrap();
        assert_eq!(a.shape, Shape::Hexagon);
    }

    #[test]
    fn out_of_range_page_rejected() {
        let json = r#"{"id":"a","type":"field_weld","anchor":{"x":0,"y":0},"page":1}"#;
        let r: AnnotationRecord = serde_json::from_str(json).unwrap();
        assert!(matches!(
            r.into_annotation(1),
            Err(WeldMapError::PageOutOfRange { page: 1, total: 1, .. })
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let a = Annotation::new("x", AnnotationType::FieldWeld, Point::new(1.0, 1.0), 0);
        let recs = vec![AnnotationRecord::from(&a), AnnotationRecord::from(&a)];
        assert!(matches!(
            resolve_records(recs, 1),
            Err(WeldMapError::DuplicateAnnotationId { .. })
        ));
    }

    #[test]
    fn canvas_display_size_divides_dpr_and_zoom() {
        let json = r#"{"width":1600,"height":1200,"devicePixelRatio":2}"#;
        let c: CanvasInfo = serde_json::from_str(json).unwrap();
        assert_eq!(c.display_size(), Size::new(800.0, 600.0));
        let z = CanvasInfo {
            zoom: 0.5,
            ..CanvasInfo::new(400.0, 300.0)
        };
        assert_eq!(z.display_size(), Size::new(800.0, 600.0));
    }

    #[test]
    fn connector_target_ignores_coincident_target() {
        let p = Point::new(100.0, 100.0);
        let a = Annotation::new("a", AnnotationType::FieldWeld, p, 0).with_target(p);
        assert_eq!(a.connector_target(), None);
        let b = a.clone().with_target(Point::new(5.0, 5.0));
        assert_eq!(b.connector_target(), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn assemble_distributes_annotations_in_order() {
        let recs: Vec<AnnotationRecord> = serde_json::from_str(
            r#"[
                {"id":"a","type":"field_weld","anchor":{"x":1,"y":1},"page":1},
                {"id":"b","type":"shop_weld","anchor":{"x":2,"y":2},"page":0},
                {"id":"c","type":"pipe_support","anchor":{"x":3,"y":3},"page":1}
            ]"#,
        )
        .unwrap();
        let pages = assemble_pages(vec![png(4, 3), png(8, 6)], recs).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!((pages[1].width, pages[1].height), (8, 6));
        let ids: Vec<&str> = pages[1].annotations.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(pages[0].annotations[0].id, "b");
    }

    #[test]
    fn assemble_requires_images() {
        assert!(matches!(
            assemble_pages(vec![], vec![]),
            Err(WeldMapError::InvalidInput { .. })
        ));
    }

    #[test]
    fn garbage_image_is_decode_failure() {
        assert!(matches!(
            assemble_pages(vec![b"not an image".to_vec()], vec![]),
            Err(WeldMapError::DecodeFailure { page: 1, .. })
        ));
    }
}

//! Symbol outlines at a canonical size.
//!
//! All proportions are multiples of one `unit_size`, so the same shape
//! rendered into canvas pixels, raster pixels or PDF points differs only by
//! that factor and the centre. Every shape is symmetric about both axes,
//! which means a Y-flipped frame needs no special handling here.

use crate::model::{Point, Rgb, Shape};
use std::f64::consts::{FRAC_PI_2, PI};

/// Diamond half-diagonal.
pub const DIAMOND_HALF: f64 = 0.8;
/// Circle and hexagon circumradius.
pub const ROUND_RADIUS: f64 = 0.35;
/// Rectangle / rounded rectangle width and height.
pub const BOX_WIDTH: f64 = 1.4;
pub const BOX_HEIGHT: f64 = 0.7;
/// Rounded rectangle corner radius.
pub const CORNER_RADIUS: f64 = 0.3;
/// Half-length of the flange centreline.
pub const FLANGE_BAR_HALF: f64 = 0.25;

const ELLIPSE_SEGMENTS: usize = 48;
const CORNER_SEGMENTS: usize = 8;

/// One drawable path element.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Closed polygon through the given vertices.
    Polygon(Vec<Point>),
    Ellipse { center: Point, rx: f64, ry: f64 },
    Rect { min: Point, max: Point },
    RoundedRect { min: Point, max: Point, radius: f64 },
    /// Open straight segment.
    Segment(Point, Point),
}

impl Primitive {
    pub fn translated(&self, dx: f64, dy: f64) -> Primitive {
        let t = |p: &Point| p.translated(dx, dy);
        match self {
            Primitive::Polygon(pts) => Primitive::Polygon(pts.iter().map(t).collect()),
            Primitive::Ellipse { center, rx, ry } => Primitive::Ellipse {
                center: t(center),
                rx: *rx,
                ry: *ry,
            },
            Primitive::Rect { min, max } => Primitive::Rect {
                min: t(min),
                max: t(max),
            },
            Primitive::RoundedRect { min, max, radius } => Primitive::RoundedRect {
                min: t(min),
                max: t(max),
                radius: *radius,
            },
            Primitive::Segment(a, b) => Primitive::Segment(t(a), t(b)),
        }
    }

    /// Whether [`Primitive::to_path`] describes a closed outline.
    pub fn is_closed(&self) -> bool {
        !matches!(self, Primitive::Segment(..))
    }

    /// Flatten into a polyline. Closed outlines do not repeat the first point.
    pub fn to_path(&self) -> Vec<Point> {
        match self {
            Primitive::Polygon(pts) => pts.clone(),
            Primitive::Ellipse { center, rx, ry } => (0..ELLIPSE_SEGMENTS)
                .map(|i| {
                    let a = 2.0 * PI * i as f64 / ELLIPSE_SEGMENTS as f64;
                    Point::new(center.x + rx * a.cos(), center.y + ry * a.sin())
                })
                .collect(),
            Primitive::Rect { min, max } => vec![
                Point::new(min.x, min.y),
                Point::new(max.x, min.y),
                Point::new(max.x, max.y),
                Point::new(min.x, max.y),
            ],
            Primitive::RoundedRect { min, max, radius } => rounded_rect_path(*min, *max, *radius),
            Primitive::Segment(a, b) => vec![*a, *b],
        }
    }
}

fn rounded_rect_path(min: Point, max: Point, radius: f64) -> Vec<Point> {
    let r = radius
        .min((max.x - min.x) / 2.0)
        .min((max.y - min.y) / 2.0)
        .max(0.0);
    // Corner centres, walked counter-clockwise starting bottom-right (y-down).
    let corners = [
        (Point::new(max.x - r, max.y - r), 0.0),
        (Point::new(min.x + r, max.y - r), FRAC_PI_2),
        (Point::new(min.x + r, min.y + r), PI),
        (Point::new(max.x - r, min.y + r), 3.0 * FRAC_PI_2),
    ];
    let mut path = Vec::with_capacity(corners.len() * (CORNER_SEGMENTS + 1));
    for (c, start) in corners {
        for i in 0..=CORNER_SEGMENTS {
            let a = start + FRAC_PI_2 * i as f64 / CORNER_SEGMENTS as f64;
            path.push(Point::new(c.x + r * a.cos(), c.y + r * a.sin()));
        }
    }
    path
}

/// The primitives of one symbol plus its stroke colour.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeGeometry {
    pub primitives: Vec<Primitive>,
    pub color: Rgb,
}

impl ShapeGeometry {
    pub fn translated(&self, dx: f64, dy: f64) -> ShapeGeometry {
        let shift = |p: &Primitive| p.translated(dx, dy);
        ShapeGeometry {
            primitives: self.primitives.iter().map(shift).collect(),
            color: self.color,
        }
    }
}

/// Computes symbol geometry for one output space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRenderer {
    unit_size: f64,
}

impl ShapeRenderer {
    pub fn new(unit_size: f64) -> Self {
        Self { unit_size }
    }

    pub fn unit_size(&self) -> f64 {
        self.unit_size
    }

    pub fn render(&self, shape: Shape, center: Point, color: Rgb) -> ShapeGeometry {
        let s = self.unit_size;
        let primitives = match shape {
            Shape::Diamond => {
                let d = DIAMOND_HALF * s;
                vec![Primitive::Polygon(vec![
                    center.translated(0.0, -d),
                    center.translated(d, 0.0),
                    center.translated(0.0, d),
                    center.translated(-d, 0.0),
                ])]
            }
            Shape::Circle => {
                let r = ROUND_RADIUS * s;
                vec![Primitive::Ellipse {
                    center,
                    rx: r,
                    ry: r,
                }]
            }
            Shape::Rectangle => {
                let (min, max) = box_corners(center, s);
                vec![Primitive::Rect { min, max }]
            }
            Shape::RoundedRectangle => {
                let (min, max) = box_corners(center, s);
                vec![Primitive::RoundedRect {
                    min,
                    max,
                    radius: CORNER_RADIUS * s,
                }]
            }
            Shape::Hexagon => {
                let r = ROUND_RADIUS * s;
                let vertices = (0..6)
                    .map(|i| {
                        let a = (i as f64 * 60.0).to_radians();
                        Point::new(center.x + r * a.cos(), center.y + r * a.sin())
                    })
                    .collect();
                let bar = FLANGE_BAR_HALF * s;
                vec![
                    Primitive::Polygon(vertices),
                    Primitive::Segment(center.translated(-bar, 0.0), center.translated(bar, 0.0)),
                ]
            }
        };
        ShapeGeometry { primitives, color }
    }

    /// Half of the vertical extent of `shape`, for label offsets.
    pub fn half_height(&self, shape: Shape) -> f64 {
        let s = self.unit_size;
        match shape {
            Shape::Diamond => DIAMOND_HALF * s,
            Shape::Circle => ROUND_RADIUS * s,
            Shape::Rectangle | Shape::RoundedRectangle => BOX_HEIGHT * s / 2.0,
            // Vertices at 60° and 120° sit highest.
            Shape::Hexagon => ROUND_RADIUS * s * 60f64.to_radians().sin(),
        }
    }
}

fn box_corners(center: Point, s: f64) -> (Point, Point) {
    let hw = BOX_WIDTH * s / 2.0;
    let hh = BOX_HEIGHT * s / 2.0;
    (center.translated(-hw, -hh), center.translated(hw, hh))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SHAPES: [Shape; 5] = [
        Shape::Diamond,
        Shape::Circle,
        Shape::Rectangle,
        Shape::RoundedRectangle,
        Shape::Hexagon,
    ];

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    fn paths(g: &ShapeGeometry) -> Vec<Vec<Point>> {
        g.primitives.iter().map(Primitive::to_path).collect()
    }

    #[test]
    fn translation_invariance() {
        let r = ShapeRenderer::new(22.5);
        let color = Rgb(1, 2, 3);
        for shape in ALL_SHAPES {
            let moves = [
                (0.0, 0.0, 10.0, -4.0),
                (75.0, 375.0, -75.0, 12.5),
                (3.3, 7.7, 1e3, 1e3),
            ];
            for (cx, cy, dx, dy) in moves {
                let origin = Point::new(cx, cy);
                let moved = r.render(shape, origin, color).translated(dx, dy);
                let direct = r.render(shape, Point::new(cx + dx, cy + dy), color);
                let (a, b) = (paths(&moved), paths(&direct));
                assert_eq!(a.len(), b.len());
                for (pa, pb) in a.iter().zip(&b) {
                    assert_eq!(pa.len(), pb.len());
                    assert!(pa.iter().zip(pb).all(|(p, q)| close(*p, *q)), "{shape:?}");
                }
            }
        }
    }

    #[test]
    fn diamond_vertices() {
        let r = ShapeRenderer::new(10.0);
        let g = r.render(Shape::Diamond, Point::new(75.0, 375.0), Rgb::BLACK);
        let Primitive::Polygon(v) = &g.primitives[0] else {
            panic!("diamond must be a polygon");
        };
        assert_eq!(
            v,
            &vec![
                Point::new(75.0, 367.0),
                Point::new(83.0, 375.0),
                Point::new(75.0, 383.0),
                Point::new(67.0, 375.0),
            ]
        );
    }

    #[test]
    fn box_proportions() {
        let r = ShapeRenderer::new(10.0);
        for shape in [Shape::Rectangle, Shape::RoundedRectangle] {
            let g = r.render(shape, Point::new(0.0, 0.0), Rgb::BLACK);
            let (min, max) = match &g.primitives[0] {
                Primitive::Rect { min, max } => (*min, *max),
                Primitive::RoundedRect { min, max, radius } => {
                    assert!((radius - 3.0).abs() < 1e-9);
                    (*min, *max)
                }
                other => panic!("unexpected {other:?}"),
            };
            assert!((max.x - min.x - 14.0).abs() < 1e-9);
            assert!((max.y - min.y - 7.0).abs() < 1e-9);
        }
    }

    #[test]
    fn hexagon_has_six_vertices_and_bar() {
        let g = ShapeRenderer::new(20.0).render(Shape::Hexagon, Point::new(0.0, 0.0), Rgb::BLACK);
        assert_eq!(g.primitives.len(), 2);
        let Primitive::Polygon(v) = &g.primitives[0] else {
            panic!("hexagon must be a polygon");
        };
        assert_eq!(v.len(), 6);
        assert!(v.iter().all(|p| (p.x.hypot(p.y) - 7.0).abs() < 1e-9));
        assert_eq!(
            g.primitives[1],
            Primitive::Segment(Point::new(-5.0, 0.0), Point::new(5.0, 0.0))
        );
    }

    #[test]
    fn rounded_rect_path_stays_in_bounds() {
        let p = Primitive::RoundedRect {
            min: Point::new(0.0, 0.0),
            max: Point::new(14.0, 7.0),
            radius: 3.0,
        };
        for q in p.to_path() {
            assert!(q.x >= -1e-9 && q.x <= 14.0 + 1e-9, "{q:?}");
            assert!(q.y >= -1e-9 && q.y <= 7.0 + 1e-9, "{q:?}");
        }
        assert!(p.is_closed());
    }

    #[test]
    fn circle_radius() {
        let g = ShapeRenderer::new(10.0).render(Shape::Circle, Point::new(5.0, 5.0), Rgb::BLACK);
        for q in g.primitives[0].to_path() {
            assert!((q.distance_to(Point::new(5.0, 5.0)) - 3.5).abs() < 1e-9);
        }
    }
}

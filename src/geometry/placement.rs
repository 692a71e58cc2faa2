//! Margin-band placement for automatically generated symbols.
//!
//! Detected components sit inside the drawing. Drawing their symbols on top
//! of them would hide the linework, so each symbol goes into one of four
//! strips along the page edges, on the side opposite its target, and a
//! connector points back at the real location.
//!
//! ```text
//!            ┌──────────── top ────────────┐
//!   ┌──┐                                        ┌──┐
//!   │  │                                        │  │
//!  left        target in left third ──────────▶ right
//!   │  │                                        │  │
//!   └──┘                                        └──┘
//!            └────────── bottom ───────────┘
//! ```

use crate::config::PlacementConfig;
use crate::model::{Point, Size};

/// One of the four margin strips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Left,
    Right,
    Top,
    Bottom,
}

impl Band {
    const ALL: [Band; 4] = [Band::Left, Band::Right, Band::Top, Band::Bottom];

    fn slot(self) -> usize {
        match self {
            Band::Left => 0,
            Band::Right => 1,
            Band::Top => 2,
            Band::Bottom => 3,
        }
    }

    fn is_side(self) -> bool {
        matches!(self, Band::Left | Band::Right)
    }
}

/// Axis-aligned band bounds in page pixels (y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRect {
    pub min: Point,
    pub max: Point,
}

impl BandRect {
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Result of placing one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub band: Band,
    pub anchor: Point,
    /// The detected component coordinate, unchanged.
    pub target: Point,
    /// False when anchor and target are too close for a meaningful line.
    pub show_connector: bool,
}

/// Assigns band positions sequentially for one page.
#[derive(Debug, Clone)]
pub struct SymbolPlacementSolver {
    page: Size,
    config: PlacementConfig,
    counts: [usize; 4],
}

impl SymbolPlacementSolver {
    pub fn new(page: Size, config: PlacementConfig) -> Self {
        Self {
            page,
            config,
            counts: [0; 4],
        }
    }

    /// Bounds of `band`, shrunk to fit pages smaller than the configured margins.
    pub fn band_rect(&self, band: Band) -> BandRect {
        let c = &self.config;
        let (w, h) = (self.page.width.max(0.0), self.page.height.max(0.0));

        let across = |len: f64, far: bool| {
            let offset = c.edge_offset.min(len / 2.0);
            let thickness = c.band_thickness.min(len / 2.0 - offset).max(0.0);
            if far {
                (len - offset - thickness, len - offset)
            } else {
                (offset, offset + thickness)
            }
        };
        let along = |len: f64| {
            let inset = c.span_inset.min(len / 2.0);
            (inset, len - inset)
        };

        let ((x0, x1), (y0, y1)) = match band {
            Band::Left => (across(w, false), along(h)),
            Band::Right => (across(w, true), along(h)),
            Band::Top => (along(w), across(h, false)),
            Band::Bottom => (along(w), across(h, true)),
        };
        BandRect {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    /// Band opposite the target: horizontal thirds first, then vertical halves.
    pub fn choose_band(&self, target: Point) -> Band {
        let (w, h) = (self.page.width, self.page.height);
        if target.x < w / 3.0 {
            Band::Right
        } else if target.x > 2.0 * w / 3.0 {
            Band::Left
        } else if target.y < h / 2.0 {
            Band::Bottom
        } else {
            Band::Top
        }
    }

    /// Place the next symbol for `target`.
    pub fn place(&mut self, target: Point) -> Placement {
        let band = self.choose_band(target);
        let rect = self.band_rect(band);
        let n = self.counts[band.slot()];
        self.counts[band.slot()] += 1;

        let c = &self.config;
        let pitch = if band.is_side() {
            c.side_pitch
        } else {
            c.edge_pitch
        };
        let offset = n as f64 * pitch + pitch / 2.0;

        let anchor = if band.is_side() {
            let (lo, hi) = (rect.min.y, rect.max.y);
            let y = clamp_inset(lo + offset, lo, hi, c.end_clearance);
            Point::new((rect.min.x + rect.max.x) / 2.0, y)
        } else {
            let (lo, hi) = (rect.min.x, rect.max.x);
            let x = clamp_inset(lo + offset, lo, hi, c.end_clearance);
            Point::new(x, (rect.min.y + rect.max.y) / 2.0)
        };

        Placement {
            band,
            anchor,
            target,
            show_connector: anchor.distance_to(target) >= c.min_connector_length,
        }
    }

    pub fn place_all(&mut self, targets: &[Point]) -> Vec<Placement> {
        targets.iter().map(|t| self.place(*t)).collect()
    }

    /// Number of symbols assigned to each band so far.
    pub fn band_counts(&self) -> Vec<(Band, usize)> {
        Band::ALL.iter().map(|b| (*b, self.counts[b.slot()])).collect()
    }
}

/// Clamp `v` into `[lo + inset, hi - inset]`, shrinking the inset for short bands.
fn clamp_inset(v: f64, lo: f64, hi: f64, inset: f64) -> f64 {
    let inset = inset.min((hi - lo) / 2.0).max(0.0);
    let low = lo + inset;
    v.clamp(low, (hi - inset).max(low))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver(w: f64, h: f64) -> SymbolPlacementSolver {
        SymbolPlacementSolver::new(Size::new(w, h), PlacementConfig::default())
    }

    #[test]
    fn left_third_target_goes_right() {
        let mut s = solver(800.0, 600.0);
        let p = s.place(Point::new(50.0, 300.0));
        assert_eq!(p.band, Band::Right);
        assert!(p.anchor.x > 2.0 * 800.0 / 3.0, "{:?}", p.anchor);
        assert!(p.show_connector);
        assert_eq!(p.target, Point::new(50.0, 300.0));
    }

    #[test]
    fn quadrant_rule() {
        let s = solver(900.0, 600.0);
        assert_eq!(s.choose_band(Point::new(100.0, 100.0)), Band::Right);
        assert_eq!(s.choose_band(Point::new(800.0, 100.0)), Band::Left);
        assert_eq!(s.choose_band(Point::new(450.0, 100.0)), Band::Bottom);
        assert_eq!(s.choose_band(Point::new(450.0, 500.0)), Band::Top);
    }

    #[test]
    fn sequential_pitch_along_side_band() {
        let mut s = solver(800.0, 600.0);
        let a = s.place(Point::new(10.0, 10.0));
        let b = s.place(Point::new(20.0, 20.0));
        assert_eq!(a.anchor, Point::new(750.0, 85.0));
        assert_eq!(b.anchor.y - a.anchor.y, 50.0);
        assert_eq!(a.anchor.x, b.anchor.x);
    }

    #[test]
    fn edge_band_uses_edge_pitch() {
        let mut s = solver(900.0, 600.0);
        let a = s.place(Point::new(450.0, 100.0));
        let b = s.place(Point::new(450.0, 120.0));
        assert_eq!(a.band, Band::Bottom);
        assert_eq!(a.anchor, Point::new(100.0, 550.0));
        assert_eq!(b.anchor.x - a.anchor.x, 80.0);
    }

    #[test]
    fn overflow_clamps_to_far_edge() {
        let mut s = solver(800.0, 600.0);
        let placements: Vec<Placement> = (0..40).map(|_| s.place(Point::new(10.0, 10.0))).collect();
        let rect = s.band_rect(Band::Right);
        let last = placements.last().unwrap();
        assert_eq!(last.anchor.y, rect.max.y - 20.0);
        assert!(placements.iter().all(|p| rect.contains(p.anchor)));
    }

    #[test]
    fn anchors_always_inside_assigned_band() {
        let sheets = [
            (800.0, 600.0),
            (1700.0, 1100.0),
            (90.0, 70.0),
            (10.0, 10.0),
            (2.0, 500.0),
        ];
        for (w, h) in sheets {
            let mut s = solver(w, h);
            for i in 0..=20 {
                for j in 0..=20 {
                    let t = Point::new(w * i as f64 / 20.0, h * j as f64 / 20.0);
                    let p = s.place(t);
                    let rect = s.band_rect(p.band);
                    assert!(
                        rect.contains(p.anchor),
                        "page {w}x{h} target {t:?} → {p:?} outside {rect:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn close_target_suppresses_connector() {
        // Margins collapse to the page centre on a tiny sheet.
        let mut s = solver(60.0, 60.0);
        let p = s.place(Point::new(25.0, 30.0));
        assert_eq!(p.band, Band::Top);
        assert_eq!(p.anchor, Point::new(30.0, 30.0));
        assert!(!p.show_connector);
    }

    #[test]
    fn counts_per_band() {
        let mut s = solver(800.0, 600.0);
        s.place_all(&[
            Point::new(10.0, 10.0),
            Point::new(790.0, 10.0),
            Point::new(10.0, 500.0),
        ]);
        let counts = s.band_counts();
        assert!(counts.contains(&(Band::Right, 2)));
        assert!(counts.contains(&(Band::Left, 1)));
        assert!(counts.contains(&(Band::Top, 0)));
    }
}

//! Connector line from a symbol to the point it refers to.

use crate::model::Point;

/// Connector dimensions, already in target units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectorStyle {
    /// Distance kept free between the arrow tip and the target.
    pub tip_gap: f64,
    /// Arrowhead length along the line. Zero disables the head.
    pub head_size: f64,
}

/// A straight line plus an optional filled triangular head at its end.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub start: Point,
    pub end: Point,
    /// Tip, left barb, right barb.
    pub head: Option<[Point; 3]>,
}

/// Line from `from` (the symbol anchor) towards `to`.
///
/// Returns `None` for coincident points. When the line is too short to keep
/// `tip_gap` clear, a plain line to `to` without a head is produced.
pub fn connector(from: Point, to: Point, style: ConnectorStyle) -> Option<Connector> {
    let length = from.distance_to(to);
    if length <= f64::EPSILON {
        return None;
    }
    if length <= style.tip_gap {
        return Some(Connector {
            start: from,
            end: to,
            head: None,
        });
    }

    let (ux, uy) = ((to.x - from.x) / length, (to.y - from.y) / length);
    let end = to.translated(-ux * style.tip_gap, -uy * style.tip_gap);
    let head = (style.head_size > 0.0).then(|| {
        let base = end.translated(-ux * style.head_size, -uy * style.head_size);
        let half = style.head_size / 2.0;
        [
            end,
            base.translated(-uy * half, ux * half),
            base.translated(uy * half, -ux * half),
        ]
    });
    Some(Connector {
        start: from,
        end,
        head,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLE: ConnectorStyle = ConnectorStyle {
        tip_gap: 15.0,
        head_size: 8.0,
    };

    #[test]
    fn coincident_points_draw_nothing() {
        let p = Point::new(3.0, 4.0);
        assert_eq!(connector(p, p, STYLE), None);
    }

    #[test]
    fn line_stops_short_of_target() {
        let c = connector(Point::new(0.0, 0.0), Point::new(100.0, 0.0), STYLE).unwrap();
        assert_eq!(c.end, Point::new(85.0, 0.0));
        let [tip, l, r] = c.head.unwrap();
        assert_eq!(tip, c.end);
        assert_eq!(l, Point::new(77.0, 4.0));
        assert_eq!(r, Point::new(77.0, -4.0));
    }

    #[test]
    fn short_line_has_no_head() {
        let c = connector(Point::new(0.0, 0.0), Point::new(0.0, 12.0), STYLE).unwrap();
        assert_eq!(c.end, Point::new(0.0, 12.0));
        assert!(c.head.is_none());
    }

    #[test]
    fn head_disabled() {
        let style = ConnectorStyle {
            head_size: 0.0,
            ..STYLE
        };
        let c = connector(Point::new(0.0, 0.0), Point::new(0.0, 50.0), style).unwrap();
        assert!(c.head.is_none());
        assert_eq!(c.end, Point::new(0.0, 35.0));
    }
}

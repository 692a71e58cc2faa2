//! Canvas/display space → target space mapping.
//!
//! The only place scale factors are computed. Every caller obtains a
//! [`CoordinateFrame`] from the *reported* display size and the *actual*
//! output size; there is no fallback constant.

use crate::error::WeldMapError;
use crate::model::{Point, Size};

/// Which space a frame maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    PageRaster,
    OutputDocument,
}

/// Affine scale + optional Y flip from display space into `kind` space.
///
/// Computed once per page of an export and never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateFrame {
    pub kind: FrameKind,
    pub scale_x: f64,
    pub scale_y: f64,
    pub flip_y: bool,
    /// Height of the target space; the flip axis.
    pub output_height: f64,
}

impl CoordinateFrame {
    /// Unit scale, no flip.
    pub fn identity(kind: FrameKind, output_height: f64) -> Self {
        Self {
            kind,
            scale_x: 1.0,
            scale_y: 1.0,
            flip_y: false,
            output_height,
        }
    }

    /// Derive the frame from display and output dimensions.
    ///
    /// Zero, negative or non-finite dimensions on either side are a
    /// [`WeldMapError::TransformConfig`].
    pub fn from_dimensions(
        kind: FrameKind,
        display: Size,
        output: Size,
        flip_y: bool,
    ) -> Result<Self, WeldMapError> {
        check_dimensions("display", display)?;
        check_dimensions("output", output)?;
        Ok(Self {
            kind,
            scale_x: output.width / display.width,
            scale_y: output.height / display.height,
            flip_y,
            output_height: output.height,
        })
    }

    pub fn apply(&self, p: Point) -> Point {
        transform(
            p,
            self.scale_x,
            self.scale_y,
            self.flip_y,
            self.output_height,
        )
    }

    /// Scale a display-space length into this frame.
    ///
    /// Uses the smaller axis factor so shapes never stretch.
    pub fn scale_length(&self, len: f64) -> f64 {
        len * self.scale_x.min(self.scale_y)
    }

    /// Sign of "downwards on screen" in this frame's Y axis.
    pub fn down(&self) -> f64 {
        if self.flip_y {
            -1.0
        } else {
            1.0
        }
    }
}

/// `(x·sx, H − y·sy)` when flipping, `(x·sx, y·sy)` otherwise.
pub fn transform(p: Point, scale_x: f64, scale_y: f64, flip_y: bool, output_height: f64) -> Point {
    let x = p.x * scale_x;
    let y = p.y * scale_y;
    if flip_y {
        Point::new(x, output_height - y)
    } else {
        Point::new(x, y)
    }
}

fn check_dimensions(which: &str, s: Size) -> Result<(), WeldMapError> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if valid(s.width) && valid(s.height) {
        Ok(())
    } else {
        Err(WeldMapError::TransformConfig {
            detail: format!(
                "{which} size must be positive, got {}x{}",
                s.width, s.height
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [(f64, f64); 6] = [
        (0.0, 0.0),
        (1.0, 2.0),
        (-5.5, 3.25),
        (800.0, 600.0),
        (123.456, 789.012),
        (1e6, -1e6),
    ];

    #[test]
    fn unit_scale_without_flip_is_identity() {
        for (x, y) in SAMPLES {
            let p = Point::new(x, y);
            assert_eq!(transform(p, 1.0, 1.0, false, 450.0), p);
        }
    }

    #[test]
    fn flip_mirrors_about_output_height() {
        for (x, y) in SAMPLES {
            let q = transform(Point::new(x, y), 1.0, 1.0, true, 450.0);
            assert_eq!(q.x, x);
            assert_eq!(q.y, 450.0 - y);
        }
    }

    #[test]
    fn canvas_to_pdf_scenario() {
        let frame = CoordinateFrame::from_dimensions(
            FrameKind::OutputDocument,
            Size::new(800.0, 600.0),
            Size::new(600.0, 450.0),
            true,
        )
        .unwrap();
        assert_eq!(frame.scale_x, 0.75);
        assert_eq!(frame.scale_y, 0.75);
        let p = frame.apply(Point::new(100.0, 100.0));
        assert_eq!(p, Point::new(75.0, 375.0));
    }

    #[test]
    fn deterministic() {
        let frame = CoordinateFrame::from_dimensions(
            FrameKind::OutputDocument,
            Size::new(913.0, 577.0),
            Size::new(1224.0, 792.0),
            true,
        )
        .unwrap();
        let p = Point::new(311.7, 42.9);
        assert_eq!(frame.apply(p), frame.apply(p));
    }

    #[test]
    fn zero_display_is_config_error() {
        let displays = [
            Size::new(0.0, 600.0),
            Size::new(800.0, 0.0),
            Size::new(f64::NAN, 1.0),
        ];
        for display in displays {
            let r = CoordinateFrame::from_dimensions(
                FrameKind::OutputDocument,
                display,
                Size::new(600.0, 450.0),
                true,
            );
            assert!(
                matches!(r, Err(WeldMapError::TransformConfig { .. })),
                "{display:?}"
            );
        }
    }

    #[test]
    fn scale_length_uses_smaller_axis() {
        let frame = CoordinateFrame::from_dimensions(
            FrameKind::PageRaster,
            Size::new(100.0, 100.0),
            Size::new(200.0, 50.0),
            false,
        )
        .unwrap();
        assert_eq!(frame.scale_length(10.0), 5.0);
    }
}

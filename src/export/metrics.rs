//! Helvetica text metrics.
//!
//! Labels in the PDF are set in the built-in Helvetica font, which is never
//! embedded, so their width has to come from the standard AFM widths rather
//! than from glyph outlines. The raster target falls back to the same table
//! when no TrueType font is available.

use crate::model::Size;

/// Ascender + |descender| of Helvetica, per 1000 em.
const ASCENT: f64 = 718.0;
const DESCENT: f64 = 207.0;

/// Advance widths for ASCII 32..=126, per 1000 em.
const WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const DEFAULT_WIDTH: u16 = 556;

fn advance(c: char) -> u16 {
    match c as u32 {
        32..=126 => WIDTHS[(c as u32 - 32) as usize],
        _ => DEFAULT_WIDTH,
    }
}

/// Width of `text` at `size` units.
pub fn text_width(text: &str, size: f64) -> f64 {
    let total: u32 = text.chars().map(|c| u32::from(advance(c))).sum();
    f64::from(total) * size / 1000.0
}

/// Full line box of `text` at `size` units.
pub fn text_size(text: &str, size: f64) -> Size {
    Size::new(text_width(text, size), (ASCENT + DESCENT) * size / 1000.0)
}

/// Distance from the bottom of the line box to the baseline.
pub fn descent(size: f64) -> f64 {
    DESCENT * size / 1000.0
}

//! Geometry primitives and sizing heuristics.
//!
//! Positions and dimensions are written by the layout collaborator; the core
//! only ever *estimates* sizes (label width heuristic, smart-collapse
//! footprints) and records what layout hands back.

use serde::{Deserialize, Serialize};

/// Default footprint for a node whose dimensions have not been computed yet.
pub const DEFAULT_NODE_DIMENSIONS: Dimensions = Dimensions {
    width: 120.0,
    height: 60.0,
};

/// Fixed footprint assumed for a collapsed container when estimating
/// expansion cost. Collapsed containers render as a single compact box, so a
/// constant is a good enough approximation for the budget heuristic.
pub const COLLAPSED_CONTAINER_DIMENSIONS: Dimensions = Dimensions {
    width: 180.0,
    height: 60.0,
};

/// Padding added around a container's children when estimating its expanded
/// footprint.
pub const BORDER_PADDING: f64 = 24.0;

const LABEL_MIN_WIDTH: f64 = 120.0;
const LABEL_MAX_WIDTH: f64 = 400.0;
const LABEL_CHAR_WIDTH: f64 = 6.0;
const LABEL_SIDE_PADDING: f64 = 32.0;
const LABEL_HEIGHT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Estimate the box needed to display `label`.
///
/// `width = clamp(120, len * 6 + 32, 400)`, `height = 60`. Character count
/// (not byte length) feeds the estimate so multi-byte labels do not inflate
/// the box.
pub fn label_dimensions(label: &str) -> Dimensions {
    let chars = label.chars().count() as f64;
    let width = (chars * LABEL_CHAR_WIDTH + LABEL_SIDE_PADDING).clamp(LABEL_MIN_WIDTH, LABEL_MAX_WIDTH);
    Dimensions {
        width,
        height: LABEL_HEIGHT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_label_clamps_to_min_width() {
        let d = label_dimensions("ab");
        assert_eq!(d.width, 120.0);
        assert_eq!(d.height, 60.0);
    }

    #[test]
    fn long_label_clamps_to_max_width() {
        let label = "x".repeat(200);
        let d = label_dimensions(&label);
        assert_eq!(d.width, 400.0);
    }

    #[test]
    fn mid_label_scales_linearly() {
        // 30 chars * 6 + 32 = 212, inside the clamp range.
        let label = "y".repeat(30);
        let d = label_dimensions(&label);
        assert_eq!(d.width, 212.0);
    }

    #[test]
    fn char_count_not_byte_len() {
        // 20 three-byte chars: width from 20 chars, not 60 bytes.
        let label = "\u{4e2d}".repeat(20);
        let d = label_dimensions(&label);
        assert_eq!(d.width, 152.0);
    }

    #[test]
    fn area_product() {
        assert_eq!(Dimensions::new(10.0, 4.0).area(), 40.0);
    }
}

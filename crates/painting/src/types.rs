use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::{BLACK, DEFAULT_STROKE_WIDTH, WHITE};

/// A position in surface-local pixel coordinates
pub type Point = Vec2;

/// Styling applied to every stroke and fill on a surface
///
/// Strokes are always round-capped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Stroke diameter in pixels
    pub width: f32,
    /// RGBA foreground
    pub stroke_color: [u8; 4],
    /// RGBA background used by fill and clear
    pub fill_color: [u8; 4],
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: DEFAULT_STROKE_WIDTH,
            stroke_color: WHITE,
            fill_color: BLACK,
        }
    }
}

impl StrokeStyle {
    /// Half the stroke width
    pub fn radius(&self) -> f32 {
        self.width / 2.0
    }
}

/// A line piece between two consecutive pointer positions
///
/// Segments are consumed immediately by the surface and never retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSegment {
    pub prev: Point,
    pub current: Point,
}

impl StrokeSegment {
    pub fn new(prev: Point, current: Point) -> Self {
        Self { prev, current }
    }
}

/// Pixel rectangle `(x, y, width, height)`
pub type Region = (u32, u32, u32, u32);

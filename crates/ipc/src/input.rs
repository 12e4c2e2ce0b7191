//! Pointer input types for the drawing element.

use serde::{Deserialize, Serialize};

/// Pointer events raised on the drawing element.
///
/// Coordinates are viewport (client) coordinates; they are translated into
/// surface-local pixels using the element's [`ElementRect`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerEvent {
    Down { client_x: f32, client_y: f32 },
    Move { client_x: f32, client_y: f32 },
    Up { client_x: f32, client_y: f32 },
    /// Pointer left the element's bounds
    Leave,
}

/// On-screen bounding box of the drawing element, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ElementRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Rect placed at the viewport origin with the given size
    pub fn at_origin(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

use glam::Vec2;
use lipi_ipc::ElementRect;

use crate::types::Point;

/// Convert viewport coordinates to surface-local pixel coordinates
///
/// Subtracts the element's on-screen origin. When the element is displayed
/// at a size other than the surface's pixel size, the offset is rescaled so
/// the result still addresses surface pixels.
pub fn to_surface_local(
    client_x: f32,
    client_y: f32,
    rect: &ElementRect,
    surface_width: u32,
    surface_height: u32,
) -> Point {
    let offset = Vec2::new(client_x - rect.left, client_y - rect.top);
    let scale = Vec2::new(
        axis_scale(rect.width, surface_width),
        axis_scale(rect.height, surface_height),
    );
    offset * scale
}

/// Check that a point lies within `[0, width) x [0, height)`
pub fn in_surface_bounds(point: Point, width: u32, height: u32) -> bool {
    point.is_finite()
        && point.x >= 0.0
        && point.y >= 0.0
        && point.x < width as f32
        && point.y < height as f32
}

fn axis_scale(displayed: f32, actual: u32) -> f32 {
    if displayed > 0.0 && displayed.is_finite() {
        actual as f32 / displayed
    } else {
        1.0
    }
}

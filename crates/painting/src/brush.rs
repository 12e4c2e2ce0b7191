//! Segment rasterization for strokes
//!
//! Strokes are rendered hard-edged: a pixel takes the stroke color when its
//! center lies inside the stroked shape, with no anti-aliasing. The classifier
//! sees binary strokes, so partial coverage would only add noise.

use glam::Vec2;
use image::{Rgba, RgbaImage};
use tracing::trace;

use crate::types::{Point, Region, StrokeStyle};

/// Stamp a round-capped line from `from` to `to` onto `image` using `style`.
///
/// Returns the bounding box of the affected region (x, y, width, height), or
/// `None` if the stroke lies completely outside the image.
pub fn stamp_segment(
    image: &mut RgbaImage,
    from: Point,
    to: Point,
    style: &StrokeStyle,
) -> Option<Region> {
    let radius = style.radius();
    if !(radius > 0.0) {
        trace!("stamp_segment: skipped, non-positive radius");
        return None;
    }

    let (width, height) = image.dimensions();
    let min = from.min(to) - Vec2::splat(radius);
    let max = from.max(to) + Vec2::splat(radius);

    // Clamp to surface bounds
    let x_min = (min.x.floor().max(0.0) as u32).min(width);
    let y_min = (min.y.floor().max(0.0) as u32).min(height);
    let x_max = (max.x.ceil().max(0.0) as u32).min(width);
    let y_max = (max.y.ceil().max(0.0) as u32).min(height);

    if x_min >= x_max || y_min >= y_max {
        return None;
    }

    let color = Rgba(style.stroke_color);
    let mut touched = false;
    for py in y_min..y_max {
        for px in x_min..x_max {
            let center = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
            if covers(center, from, to, radius) {
                image.put_pixel(px, py, color);
                touched = true;
            }
        }
    }

    if !touched {
        return None;
    }
    Some((x_min, y_min, x_max - x_min, y_max - y_min))
}

/// Whether `p` lies within `radius` of the segment `a`-`b`
///
/// This is the round-capped capsule; a zero-length segment is a disc.
#[inline]
pub fn covers(p: Point, a: Point, b: Point, radius: f32) -> bool {
    let ab = b - a;
    let len_sq = ab.length_squared();
    let closest = if len_sq <= f32::EPSILON {
        a
    } else {
        a + ab * ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    p.distance_squared(closest) <= radius * radius
}

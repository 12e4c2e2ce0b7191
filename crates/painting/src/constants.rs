/// Default surface edge length in pixels.
pub const DEFAULT_CANVAS_SIZE: u32 = 256;

/// Default stroke diameter in pixels.
pub const DEFAULT_STROKE_WIDTH: f32 = 30.0;

/// Channels per pixel in surface readback (RGBA).
pub const SNAPSHOT_CHANNELS: usize = 4;

/// Default foreground color (`#fff`).
pub const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Default background color (`#000`).
pub const BLACK: [u8; 4] = [0, 0, 0, 255];

//! Raster surface for drawing - 8-bit RGBA storage backed by `image`

use image::{Rgba, RgbaImage};
use thiserror::Error;
use tracing::{debug, trace};

use crate::brush::stamp_segment;
use crate::constants::SNAPSHOT_CHANNELS;
use crate::types::{Point, Region, StrokeStyle};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Surface is already initialized")]
    AlreadyInitialized,
    #[error("Surface is not initialized")]
    NotInitialized,
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Region ({x}, {y}) {width}x{height} is empty after clamping")]
    EmptyRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// The drawable pixel buffer
///
/// A surface starts uninitialized and becomes usable after exactly one call
/// to [`RasterSurface::initialize`]. Its dimensions never change afterwards.
/// All rectangles are addressed as `(x, y, width, height)`.
#[derive(Debug, Default)]
pub struct RasterSurface {
    image: Option<RgbaImage>,
    style: StrokeStyle,
}

impl RasterSurface {
    /// Create an uninitialized surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the pixel buffer, apply the style and fill with the background
    pub fn initialize(
        &mut self,
        width: u32,
        height: u32,
        style: StrokeStyle,
    ) -> Result<(), SurfaceError> {
        if self.image.is_some() {
            return Err(SurfaceError::AlreadyInitialized);
        }
        if width == 0 || height == 0 {
            return Err(SurfaceError::InvalidDimensions { width, height });
        }

        debug!(
            "RasterSurface::initialize: {}x{}, stroke width {:.1}",
            width, height, style.width
        );
        self.style = style;
        self.image = Some(RgbaImage::from_pixel(width, height, Rgba(style.fill_color)));
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has run
    pub fn is_initialized(&self) -> bool {
        self.image.is_some()
    }

    /// Surface dimensions as (width, height), if initialized
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }

    /// The active stroke style
    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    /// Draw a stroke segment from `prev` to `current` in the foreground color
    ///
    /// Pointer events can arrive before the surface is set up; those draws are
    /// dropped silently. Returns the affected region, if any.
    pub fn draw_segment(&mut self, prev: Point, current: Point) -> Option<Region> {
        let Some(image) = self.image.as_mut() else {
            trace!("draw_segment: surface not initialized, ignoring");
            return None;
        };

        let region = stamp_segment(image, prev, current, &self.style);
        trace!(
            "draw_segment: ({:.1}, {:.1}) -> ({:.1}, {:.1}), region {:?}",
            prev.x, prev.y, current.x, current.y, region
        );
        region
    }

    /// Reset the whole buffer to the background color without reallocating
    pub fn clear(&mut self) {
        let fill = Rgba(self.style.fill_color);
        if let Some(image) = self.image.as_mut() {
            for pixel in image.pixels_mut() {
                *pixel = fill;
            }
            debug!("RasterSurface::clear");
        }
    }

    /// Copy the pixels of a rectangle
    ///
    /// The rectangle is clamped to the surface. The returned snapshot owns
    /// its data and reflects every draw and clear made before the call.
    pub fn read_pixels(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<PixelSnapshot, SurfaceError> {
        let image = self.image.as_ref().ok_or(SurfaceError::NotInitialized)?;
        let (surface_w, surface_h) = image.dimensions();

        let x0 = x.min(surface_w);
        let y0 = y.min(surface_h);
        let w = width.min(surface_w - x0);
        let h = height.min(surface_h - y0);
        if w == 0 || h == 0 {
            return Err(SurfaceError::EmptyRegion {
                x,
                y,
                width,
                height,
            });
        }

        let row_bytes = surface_w as usize * SNAPSHOT_CHANNELS;
        let raw = image.as_raw();
        let mut data = Vec::with_capacity(w as usize * h as usize * SNAPSHOT_CHANNELS);
        for row in y0..y0 + h {
            let start = row as usize * row_bytes + x0 as usize * SNAPSHOT_CHANNELS;
            data.extend_from_slice(&raw[start..start + w as usize * SNAPSHOT_CHANNELS]);
        }

        Ok(PixelSnapshot {
            width: w,
            height: h,
            data,
        })
    }

    /// Copy the entire surface
    pub fn snapshot(&self) -> Result<PixelSnapshot, SurfaceError> {
        let (width, height) = self.dimensions().ok_or(SurfaceError::NotInitialized)?;
        self.read_pixels(0, 0, width, height)
    }
}

/// A point-in-time RGBA copy of a surface region
///
/// Pixels are stored row-major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSnapshot {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl PixelSnapshot {
    /// Wrap raw RGBA bytes. Returns `None` if the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * SNAPSHOT_CHANNELS {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Get a pixel at the given coordinates
    /// Returns None if coordinates are out of bounds
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = ((y as usize) * (self.width as usize) + (x as usize)) * SNAPSHOT_CHANNELS;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.data[index..index + SNAPSHOT_CHANNELS]);
        Some(out)
    }

    /// Extract one channel as a row-major plane
    ///
    /// Returns `None` for a channel index past RGBA.
    pub fn channel(&self, channel: usize) -> Option<Vec<u8>> {
        if channel >= SNAPSHOT_CHANNELS {
            return None;
        }
        Some(
            self.data
                .chunks_exact(SNAPSHOT_CHANNELS)
                .map(|px| px[channel])
                .collect(),
        )
    }

    /// Whether every pixel equals `color`
    pub fn is_uniform(&self, color: [u8; 4]) -> bool {
        self.data
            .chunks_exact(SNAPSHOT_CHANNELS)
            .all(|px| px == color.as_slice())
    }
}

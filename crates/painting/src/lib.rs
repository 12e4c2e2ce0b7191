//! Lipi painting system - raster surface and stroke capture
//!
//! This crate provides the drawing half of the recognition pipeline:
//! - [`surface::RasterSurface`] - RGBA pixel buffer with fill, stroke and readback
//! - [`surface::PixelSnapshot`] - point-in-time copy of a surface region
//! - [`brush`] - round-capped segment rasterization
//! - [`capture::StrokeCapturer`] - pointer press/move/release state machine
//! - [`validation`] - viewport to surface coordinate conversion

pub mod brush;
pub mod capture;
pub mod constants;
pub mod surface;
pub mod types;
pub mod validation;

pub use brush::*;
pub use capture::*;
pub use constants::*;
pub use surface::*;
pub use types::*;
pub use validation::*;

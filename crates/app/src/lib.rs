//! Lipi - draw a character, get a label
//!
//! [`DrawingCanvas`] wires the pipeline together: pointer events are captured
//! into strokes on a raster surface, and on request a snapshot of that surface
//! is preprocessed, classified and decoded into a label.

mod canvas;
mod logging;
mod prediction;

pub use canvas::{CanvasError, DrawingCanvas};
pub use logging::init_tracing;
pub use prediction::{PredictError, PredictionTask};

pub use lipi_config::LipiConfig;
pub use lipi_ipc::{CanvasToUi, ElementRect, PointerEvent, PredictionState, UiToCanvas};
pub use lipi_inference::{LabelTable, InferenceAdapter};

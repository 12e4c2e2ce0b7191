//! Drawing canvas component
//!
//! Owns one raster surface and one lazily-loaded classifier for a drawing
//! session. The host calls [`DrawingCanvas::mount`] once the drawing element
//! exists, forwards pointer events, and triggers clear and predict.

use std::sync::Arc;

use candle_core::Device;
use lipi_config::{ConfigError, LipiConfig};
use lipi_inference::{
    InferenceAdapter, LabelDecoder, LabelTable, PredictionFlag, TensorPreprocessor,
};
use lipi_ipc::{CanvasToUi, ElementRect, PointerEvent, PredictionState, UiToCanvas};
use lipi_painting::{RasterSurface, Region, StrokeCapturer, StrokeStyle, SurfaceError};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, trace};

use crate::prediction::{PredictionJob, PredictionTask};

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("Canvas is already mounted; dimensions are fixed")]
    AlreadyMounted,
}

/// The drawing component: stroke capture plus the predict flow
pub struct DrawingCanvas {
    config: LipiConfig,
    surface: RasterSurface,
    /// Present while mounted; dropping it detaches pointer handling
    capturer: Option<StrokeCapturer>,
    preprocessor: TensorPreprocessor,
    adapter: Arc<Mutex<InferenceAdapter>>,
    decoder: Arc<LabelDecoder>,
    prediction: Arc<watch::Sender<PredictionState>>,
    predicted: PredictionFlag,
}

impl DrawingCanvas {
    /// Create an unmounted canvas using the configured model artifact and
    /// the Devanagari label table
    pub fn new(config: LipiConfig) -> Result<Self, CanvasError> {
        let adapter = InferenceAdapter::from_config(&config.model, Device::Cpu);
        Self::with_adapter(config, adapter, LabelTable::devanagari())
    }

    /// Create an unmounted canvas around a given adapter and label table
    pub fn with_adapter(
        config: LipiConfig,
        adapter: InferenceAdapter,
        labels: LabelTable,
    ) -> Result<Self, CanvasError> {
        config.validate()?;
        let preprocessor = TensorPreprocessor::from_config(&config.model, Device::Cpu);
        let (prediction, _) = watch::channel(PredictionState::NoPrediction);
        let predicted = adapter.prediction_flag();

        Ok(Self {
            config,
            surface: RasterSurface::new(),
            capturer: None,
            preprocessor,
            adapter: Arc::new(Mutex::new(adapter)),
            decoder: Arc::new(LabelDecoder::new(labels)),
            prediction: Arc::new(prediction),
            predicted,
        })
    }

    /// Set the surface size; only allowed before mounting
    pub fn set_dimensions(&mut self, width: u32, height: u32) -> Result<(), CanvasError> {
        if self.surface.is_initialized() {
            return Err(CanvasError::AlreadyMounted);
        }
        let mut config = self.config.clone();
        config.canvas.width = width;
        config.canvas.height = height;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Configured (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.config.canvas.width, self.config.canvas.height)
    }

    /// Initialize the surface and start listening for pointer input
    pub fn mount(&mut self) -> Result<(), CanvasError> {
        let canvas = &self.config.canvas;
        let style = StrokeStyle {
            width: canvas.stroke_width,
            stroke_color: canvas.stroke_color,
            fill_color: canvas.background_color,
        };
        self.surface.initialize(canvas.width, canvas.height, style)?;
        self.capturer = Some(StrokeCapturer::new(canvas.width, canvas.height));
        info!("DrawingCanvas mounted ({}x{})", canvas.width, canvas.height);
        Ok(())
    }

    /// Stop listening for pointer input
    ///
    /// Any drag in progress is dropped; later events are ignored.
    pub fn unmount(&mut self) {
        if self.capturer.take().is_some() {
            debug!("DrawingCanvas unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.capturer.is_some()
    }

    /// Feed a pointer event; draws a segment when one completes
    pub fn handle_pointer(&mut self, event: &PointerEvent, rect: &ElementRect) -> Option<Region> {
        let Some(capturer) = self.capturer.as_mut() else {
            trace!("handle_pointer: not mounted, ignoring {:?}", event);
            return None;
        };
        let segment = capturer.handle(event, rect)?;
        self.surface.draw_segment(segment.prev, segment.current)
    }

    /// Reset the drawing to the background color
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    /// The live surface
    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    /// Start a prediction of the current drawing
    ///
    /// The surface is copied now; strokes drawn while the returned task runs
    /// do not affect it. The task is independent of the canvas and may be
    /// spawned. There is no cancellation: each request runs to completion.
    pub fn request_prediction(&self) -> PredictionTask {
        let job = PredictionJob {
            snapshot: self.surface.snapshot(),
            preprocessor: self.preprocessor.clone(),
            adapter: Arc::clone(&self.adapter),
            decoder: Arc::clone(&self.decoder),
            output: Arc::clone(&self.prediction),
        };
        self.prediction.send_replace(PredictionState::Pending);
        Box::pin(job.run())
    }

    /// Predict the current drawing and wait for the result
    pub async fn predict(&self) -> PredictionState {
        self.request_prediction().await
    }

    /// Current prediction state
    pub fn prediction(&self) -> PredictionState {
        self.prediction.borrow().clone()
    }

    /// Whether any prediction has been computed
    ///
    /// Stays true once set, including while a later prediction is pending or
    /// after one fails.
    pub fn is_predicted(&self) -> bool {
        self.predicted.is_set()
    }

    /// Watch prediction state changes
    pub fn subscribe(&self) -> watch::Receiver<PredictionState> {
        self.prediction.subscribe()
    }

    /// Current state as a UI message
    pub fn ui_update(&self) -> CanvasToUi {
        CanvasToUi::PredictionChanged(self.prediction())
    }

    /// Dispatch a UI message
    ///
    /// `Predict` returns the prediction task for the caller to await or spawn.
    pub fn handle_message(&mut self, message: UiToCanvas) -> Option<PredictionTask> {
        match message {
            UiToCanvas::Pointer { event, rect } => {
                self.handle_pointer(&event, &rect);
                None
            }
            UiToCanvas::Clear => {
                self.clear();
                None
            }
            UiToCanvas::Predict => Some(self.request_prediction()),
        }
    }
}

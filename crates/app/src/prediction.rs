//! The predict flow: snapshot -> tensor -> scores -> label
//!
//! Each stage hands its result to the next only on success; the first
//! failure ends the run and becomes the user-visible `Unavailable` state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lipi_inference::{
    DecodeError, DecodedLabel, InferenceAdapter, InferenceError, LabelDecoder, TensorPreprocessor,
};
use lipi_ipc::PredictionState;
use lipi_painting::{PixelSnapshot, SurfaceError};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

/// A running prediction; resolves to the published state
pub type PredictionTask = Pin<Box<dyn Future<Output = PredictionState> + Send + 'static>>;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Canvas snapshot failed: {0}")]
    Snapshot(#[from] SurfaceError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Label decoding failed: {0}")]
    Decode(#[from] DecodeError),
}

impl PredictError {
    /// Whether this points at a model/label-table mismatch rather than a missing model
    pub fn is_integration_error(&self) -> bool {
        matches!(self, Self::Decode(DecodeError::IndexOutOfRange { .. }))
    }
}

/// Everything a prediction needs, detached from the canvas
pub(crate) struct PredictionJob {
    pub snapshot: Result<PixelSnapshot, SurfaceError>,
    pub preprocessor: TensorPreprocessor,
    pub adapter: Arc<Mutex<InferenceAdapter>>,
    pub decoder: Arc<LabelDecoder>,
    pub output: Arc<watch::Sender<PredictionState>>,
}

impl PredictionJob {
    /// Run the pipeline and publish the outcome
    pub async fn run(self) -> PredictionState {
        let state = match self.execute().await {
            Ok(decoded) => {
                info!(
                    "Prediction: class {} ({}) score {:.4}",
                    decoded.index, decoded.label, decoded.score
                );
                PredictionState::Predicted {
                    index: decoded.index,
                    label: decoded.label,
                }
            }
            Err(e) => {
                if e.is_integration_error() {
                    error!("Label table does not match the model: {}", e);
                } else {
                    warn!("Prediction unavailable: {}", e);
                }
                PredictionState::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        self.output.send_replace(state.clone());
        state
    }

    async fn execute(&self) -> Result<DecodedLabel, PredictError> {
        let snapshot = self.snapshot.as_ref().map_err(|e| e.clone())?;
        let tensor = self.preprocessor.preprocess(snapshot)?;
        debug!("Prediction input shape {:?}", tensor.shape());

        let scores = {
            let mut adapter = self.adapter.lock().await;
            adapter.predict(&tensor).await?
        };
        Ok(self.decoder.decode(&scores)?)
    }
}

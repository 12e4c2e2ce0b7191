//! Character classification for Lipi
//!
//! Turns a canvas snapshot into a class label:
//! - [`preprocess::TensorPreprocessor`] - snapshot to `[1, 32, 32, 1]` tensor
//! - [`model::LayersModel`] - sequential classifier loaded from a manifest and safetensors weights
//! - [`adapter::InferenceAdapter`] - lazy model loading and forward passes
//! - [`decoder::LabelDecoder`] - arg-max over scores into a [`decoder::LabelTable`]

mod adapter;
mod decoder;
mod model;
mod preprocess;

pub use adapter::{InferenceAdapter, ModelState, PredictionFlag, ScoreVector};
pub use decoder::{DecodeError, DecodedLabel, LabelDecoder, LabelTable};
pub use model::{
    Activation, LayerSpec, LayersModel, MANIFEST_FORMAT, MANIFEST_VERSION, ModelManifest, Padding,
    write_artifact,
};
pub use preprocess::{PreprocessedTensor, REDUCTION_CHANNEL, TensorPreprocessor};

use std::path::PathBuf;

use candle_core::Tensor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid layer {index}: {message}")]
    Layer { index: usize, message: String },

    #[error("Tensor operation failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Model is not loaded")]
    ModelUnavailable,

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),
}

/// A loaded classifier: tensor in, scores out
///
/// This is the seam between the pipeline and the model itself. The input is
/// the preprocessed NHWC tensor; the output holds one score per class.
pub trait Classifier: Send + Sync {
    /// Run a forward pass
    fn forward(&self, input: &Tensor) -> Result<Tensor, InferenceError>;

    /// Length of the score vector this model produces
    fn num_classes(&self) -> usize;
}

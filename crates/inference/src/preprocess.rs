//! Snapshot to model-input tensor conversion
//!
//! The classifier was trained on inputs produced by exactly this sequence:
//! single channel, `[H, W, 1]`, batch dimension, nearest-neighbor resize,
//! cast to f32, divide by 255. Reordering the steps changes the numbers.

use candle_core::{DType, Device, Tensor};
use lipi_config::ModelConfig;
use lipi_painting::PixelSnapshot;
use tracing::debug;

use crate::InferenceError;

/// Snapshot channel used for the single-channel reduction (red)
///
/// Strokes and background are grayscale, so R = G = B and red equals luminance.
pub const REDUCTION_CHANNEL: usize = 0;

/// Model input of shape `[1, height, width, 1]` with values in `[0.0, 1.0]`
#[derive(Debug, Clone)]
pub struct PreprocessedTensor {
    tensor: Tensor,
}

impl PreprocessedTensor {
    pub fn as_tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.dims()
    }

    /// Copy the values out in row-major order
    pub fn to_vec(&self) -> Result<Vec<f32>, InferenceError> {
        Ok(self.tensor.flatten_all()?.to_vec1::<f32>()?)
    }
}

/// Converts canvas snapshots into model input tensors
#[derive(Debug, Clone)]
pub struct TensorPreprocessor {
    target_width: usize,
    target_height: usize,
    device: Device,
}

impl TensorPreprocessor {
    /// Create a preprocessor resizing to `target_width` x `target_height`
    pub fn new(target_width: usize, target_height: usize, device: Device) -> Self {
        Self {
            target_width,
            target_height,
            device,
        }
    }

    /// Create a preprocessor for the configured model input size
    pub fn from_config(config: &ModelConfig, device: Device) -> Self {
        Self::new(
            config.input_width as usize,
            config.input_height as usize,
            device,
        )
    }

    /// Convert a full-surface snapshot into a `[1, H', W', 1]` tensor
    pub fn preprocess(&self, snapshot: &PixelSnapshot) -> Result<PreprocessedTensor, InferenceError> {
        let (width, height) = (snapshot.width as usize, snapshot.height as usize);
        if width == 0 || height == 0 || self.target_width == 0 || self.target_height == 0 {
            return Err(InferenceError::Preprocess(format!(
                "cannot resize {}x{} to {}x{}",
                width, height, self.target_width, self.target_height
            )));
        }

        // 1. Single channel
        let plane = snapshot.channel(REDUCTION_CHANNEL).ok_or_else(|| {
            InferenceError::Preprocess(format!("snapshot has no channel {}", REDUCTION_CHANNEL))
        })?;
        let pixels = Tensor::from_vec(plane, height * width, &self.device)?;

        // 2. [H, W, 1]
        let pixels = pixels.reshape((height, width, 1))?;

        // 3. [1, H, W, 1]
        let pixels = pixels.unsqueeze(0)?;

        // 4. Nearest-neighbor resize on the integer values
        let pixels = resize_nearest_nhwc(&pixels, self.target_height, self.target_width)?;

        // 5. Cast
        let pixels = pixels.to_dtype(DType::F32)?;

        // 6. Normalize into [0, 1]
        let pixels = (pixels / 255.0)?;

        debug!(
            "TensorPreprocessor: {}x{} snapshot -> {:?}",
            width,
            height,
            pixels.dims()
        );
        Ok(PreprocessedTensor { tensor: pixels })
    }
}

/// Nearest-neighbor resize of an NHWC tensor
///
/// Output index `i` samples source index `floor(i * in / out)`, clamped to
/// the last row or column (no corner alignment, no half-pixel offset).
pub(crate) fn resize_nearest_nhwc(
    input: &Tensor,
    out_height: usize,
    out_width: usize,
) -> Result<Tensor, InferenceError> {
    let (_, in_height, in_width, _) = input.dims4()?;
    let device = input.device();

    let rows = Tensor::from_vec(nearest_indices(in_height, out_height), out_height, device)?;
    let cols = Tensor::from_vec(nearest_indices(in_width, out_width), out_width, device)?;

    Ok(input.index_select(&rows, 1)?.index_select(&cols, 2)?)
}

fn nearest_indices(input_len: usize, output_len: usize) -> Vec<u32> {
    (0..output_len)
        .map(|i| ((i * input_len) / output_len).min(input_len - 1) as u32)
        .collect()
}

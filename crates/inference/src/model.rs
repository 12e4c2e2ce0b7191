//! Sequential classifier loaded from a layer manifest and safetensors weights
//!
//! The artifact is a directory holding `model.json` (topology) and a
//! safetensors file (weights). Layers are described channels-last, the same
//! way the network was defined for training; convolutions run channels-first
//! internally and `flatten` restores channels-last order so dense weights
//! exported from a channels-last network apply unchanged.
//!
//! Weight names are `<layer name>.weight` and `<layer name>.bias`, with conv
//! kernels stored as `[out, in, kh, kw]` and dense kernels as `[out, in]`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Classifier, InferenceError};

/// Value of the manifest's `format` field
pub const MANIFEST_FORMAT: &str = "lipi-layers";

/// Manifest schema version understood by this loader
pub const MANIFEST_VERSION: u32 = 1;

fn default_format() -> String {
    MANIFEST_FORMAT.to_string()
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

fn default_stride() -> usize {
    1
}

/// Model topology as stored in `model.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Input shape without the batch dimension: `[height, width, channels]`
    pub input_shape: [usize; 3],
    /// Weights file, relative to the manifest
    pub weights: PathBuf,
    pub layers: Vec<LayerSpec>,
}

/// Convolution padding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    Valid,
    Same,
}

/// Element-wise activation applied after a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn apply(self, xs: Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Linear => Ok(xs),
            Self::Relu => xs.relu(),
            Self::Sigmoid => candle_nn::ops::sigmoid(&xs),
            Self::Tanh => xs.tanh(),
            Self::Softmax => candle_nn::ops::softmax_last_dim(&xs),
        }
    }
}

/// One entry of the manifest's `layers` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        name: String,
        filters: usize,
        kernel_size: usize,
        #[serde(default = "default_stride")]
        strides: usize,
        #[serde(default)]
        padding: Padding,
        #[serde(default)]
        activation: Activation,
    },
    MaxPool2d {
        pool_size: usize,
        /// Defaults to `pool_size`
        #[serde(default)]
        strides: Option<usize>,
    },
    Flatten,
    Dense {
        name: String,
        units: usize,
        #[serde(default)]
        activation: Activation,
    },
    /// Training-only; identity at inference
    Dropout { rate: f32 },
    Activation { activation: Activation },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Spatial {
        height: usize,
        width: usize,
        channels: usize,
    },
    Flat(usize),
}

#[derive(Debug)]
enum Layer {
    Conv2d {
        conv: Conv2d,
        activation: Activation,
    },
    MaxPool2d {
        pool: usize,
        stride: usize,
    },
    Flatten,
    Dense {
        linear: Linear,
        activation: Activation,
    },
    Activation(Activation),
}

/// A sequential network built from a [`ModelManifest`]
#[derive(Debug)]
pub struct LayersModel {
    input_shape: [usize; 3],
    layers: Vec<Layer>,
    num_classes: usize,
}

impl LayersModel {
    /// Read the manifest and its weights file and build the network
    pub async fn load(manifest_path: impl AsRef<Path>, device: &Device) -> Result<Self, InferenceError> {
        let manifest_path = manifest_path.as_ref();
        let text = tokio::fs::read_to_string(manifest_path)
            .await
            .map_err(|source| InferenceError::Io {
                path: manifest_path.to_path_buf(),
                source,
            })?;
        let manifest: ModelManifest = serde_json::from_str(&text)?;
        manifest.check_format()?;

        let weights_path = manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&manifest.weights);
        let weights = tokio::fs::read(&weights_path)
            .await
            .map_err(|source| InferenceError::Io {
                path: weights_path.clone(),
                source,
            })?;
        debug!(
            "LayersModel::load: {} ({} bytes of weights)",
            weights_path.display(),
            weights.len()
        );

        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, device)?;
        let model = Self::from_manifest(&manifest, vb)?;
        info!(
            "Loaded model from {}: {} layers, {} classes",
            manifest_path.display(),
            model.layers.len(),
            model.num_classes
        );
        Ok(model)
    }

    /// Build the network from a parsed manifest and a weight source
    pub fn from_manifest(manifest: &ModelManifest, vb: VarBuilder) -> Result<Self, InferenceError> {
        manifest.check_format()?;

        let [height, width, channels] = manifest.input_shape;
        if height == 0 || width == 0 || channels == 0 {
            return Err(InferenceError::UnsupportedFormat(format!(
                "input shape {:?} has a zero dimension",
                manifest.input_shape
            )));
        }

        let mut shape = Shape::Spatial {
            height,
            width,
            channels,
        };
        let mut layers = Vec::with_capacity(manifest.layers.len());

        for (index, spec) in manifest.layers.iter().enumerate() {
            let layer_err = |message: String| InferenceError::Layer { index, message };

            match spec {
                LayerSpec::Conv2d {
                    name,
                    filters,
                    kernel_size,
                    strides,
                    padding,
                    activation,
                } => {
                    let Shape::Spatial {
                        height,
                        width,
                        channels,
                    } = shape
                    else {
                        return Err(layer_err("conv2d after flatten".into()));
                    };
                    let (kernel, stride) = (*kernel_size, *strides);
                    if kernel == 0 || stride == 0 || *filters == 0 {
                        return Err(layer_err("conv2d sizes must be non-zero".into()));
                    }

                    let pad = match padding {
                        Padding::Valid => 0,
                        Padding::Same if stride == 1 && kernel % 2 == 1 => (kernel - 1) / 2,
                        Padding::Same => {
                            return Err(layer_err(
                                "same padding needs stride 1 and an odd kernel".into(),
                            ));
                        }
                    };
                    let (out_h, out_w) = conv_output(height, width, kernel, stride, pad)
                        .ok_or_else(|| {
                            layer_err(format!("kernel {} larger than {}x{} input", kernel, height, width))
                        })?;

                    let cfg = Conv2dConfig {
                        padding: pad,
                        stride,
                        ..Default::default()
                    };
                    let conv = candle_nn::conv2d(channels, *filters, kernel, cfg, vb.pp(name))?;
                    layers.push(Layer::Conv2d {
                        conv,
                        activation: *activation,
                    });
                    shape = Shape::Spatial {
                        height: out_h,
                        width: out_w,
                        channels: *filters,
                    };
                }
                LayerSpec::MaxPool2d { pool_size, strides } => {
                    let Shape::Spatial {
                        height,
                        width,
                        channels,
                    } = shape
                    else {
                        return Err(layer_err("max_pool2d after flatten".into()));
                    };
                    let pool = *pool_size;
                    let stride = strides.unwrap_or(pool);
                    if pool == 0 || stride == 0 {
                        return Err(layer_err("pool sizes must be non-zero".into()));
                    }
                    let (out_h, out_w) = conv_output(height, width, pool, stride, 0)
                        .ok_or_else(|| layer_err(format!("pool {} larger than {}x{}", pool, height, width)))?;

                    layers.push(Layer::MaxPool2d { pool, stride });
                    shape = Shape::Spatial {
                        height: out_h,
                        width: out_w,
                        channels,
                    };
                }
                LayerSpec::Flatten => {
                    if let Shape::Spatial {
                        height,
                        width,
                        channels,
                    } = shape
                    {
                        layers.push(Layer::Flatten);
                        shape = Shape::Flat(height * width * channels);
                    }
                }
                LayerSpec::Dense {
                    name,
                    units,
                    activation,
                } => {
                    let Shape::Flat(features) = shape else {
                        return Err(layer_err("dense needs a flatten before it".into()));
                    };
                    if *units == 0 {
                        return Err(layer_err("dense units must be non-zero".into()));
                    }
                    let linear = candle_nn::linear(features, *units, vb.pp(name))?;
                    layers.push(Layer::Dense {
                        linear,
                        activation: *activation,
                    });
                    shape = Shape::Flat(*units);
                }
                LayerSpec::Dropout { .. } => {}
                LayerSpec::Activation { activation } => {
                    layers.push(Layer::Activation(*activation));
                }
            }
        }

        let Shape::Flat(num_classes) = shape else {
            return Err(InferenceError::UnsupportedFormat(
                "model must end in a flat score vector".into(),
            ));
        };

        Ok(Self {
            input_shape: manifest.input_shape,
            layers,
            num_classes,
        })
    }

    /// Expected input shape `[height, width, channels]`
    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }
}

impl Classifier for LayersModel {
    fn forward(&self, input: &Tensor) -> Result<Tensor, InferenceError> {
        let (_, height, width, channels) = input.dims4()?;
        if [height, width, channels] != self.input_shape {
            return Err(InferenceError::Preprocess(format!(
                "model expects {:?}, got {:?}",
                self.input_shape,
                input.dims()
            )));
        }

        // NHWC -> NCHW for the convolution stack
        let mut xs = input.permute((0, 3, 1, 2))?.contiguous()?;
        for layer in &self.layers {
            xs = match layer {
                Layer::Conv2d { conv, activation } => activation.apply(conv.forward(&xs)?)?,
                Layer::MaxPool2d { pool, stride } => {
                    xs.max_pool2d_with_stride((*pool, *pool), (*stride, *stride))?
                }
                Layer::Flatten => xs.permute((0, 2, 3, 1))?.contiguous()?.flatten_from(1)?,
                Layer::Dense { linear, activation } => activation.apply(linear.forward(&xs)?)?,
                Layer::Activation(activation) => activation.apply(xs)?,
            };
        }
        Ok(xs)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl ModelManifest {
    /// Reject manifests written for another loader or schema
    pub fn check_format(&self) -> Result<(), InferenceError> {
        if self.format != MANIFEST_FORMAT {
            return Err(InferenceError::UnsupportedFormat(format!(
                "format {:?}, expected {:?}",
                self.format, MANIFEST_FORMAT
            )));
        }
        if self.version != MANIFEST_VERSION {
            return Err(InferenceError::UnsupportedFormat(format!(
                "version {}, expected {}",
                self.version, MANIFEST_VERSION
            )));
        }
        Ok(())
    }
}

/// Write a model artifact (`model.json` plus weights) into `dir`
///
/// Returns the manifest path. Used to package converted networks.
pub fn write_artifact(
    dir: impl AsRef<Path>,
    manifest: &ModelManifest,
    weights: &HashMap<String, Tensor>,
) -> Result<PathBuf, InferenceError> {
    let dir = dir.as_ref();
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| InferenceError::Io { path, source }
    };

    std::fs::create_dir_all(dir).map_err(io_err(dir))?;

    let weights_path = dir.join(&manifest.weights);
    candle_core::safetensors::save(weights, &weights_path)?;

    let manifest_path = dir.join("model.json");
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&manifest_path, json).map_err(io_err(&manifest_path))?;
    Ok(manifest_path)
}

fn conv_output(
    height: usize,
    width: usize,
    kernel: usize,
    stride: usize,
    pad: usize,
) -> Option<(usize, usize)> {
    let padded_h = height + 2 * pad;
    let padded_w = width + 2 * pad;
    if padded_h < kernel || padded_w < kernel {
        return None;
    }
    Some((
        (padded_h - kernel) / stride + 1,
        (padded_w - kernel) / stride + 1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_manifest(units: usize) -> ModelManifest {
        ModelManifest {
            format: MANIFEST_FORMAT.into(),
            version: MANIFEST_VERSION,
            input_shape: [4, 4, 1],
            weights: "model.safetensors".into(),
            layers: vec![
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    name: "out".into(),
                    units,
                    activation: Activation::Linear,
                },
            ],
        }
    }

    fn dense_weights(units: usize, features: usize, bias: Vec<f32>) -> HashMap<String, Tensor> {
        let mut weights = HashMap::new();
        weights.insert(
            "out.weight".to_string(),
            Tensor::zeros((units, features), DType::F32, &Device::Cpu).unwrap(),
        );
        weights.insert(
            "out.bias".to_string(),
            Tensor::from_vec(bias, units, &Device::Cpu).unwrap(),
        );
        weights
    }

    #[test]
    fn test_manifest_parses_layer_list() {
        let json = r#"{
            "input_shape": [32, 32, 1],
            "weights": "weights.safetensors",
            "layers": [
                { "type": "conv2d", "name": "c1", "filters": 8, "kernel_size": 3, "activation": "relu" },
                { "type": "max_pool2d", "pool_size": 2 },
                { "type": "dropout", "rate": 0.25 },
                { "type": "flatten" },
                { "type": "dense", "name": "d1", "units": 46, "activation": "softmax" }
            ]
        }"#;
        let manifest: ModelManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.format, MANIFEST_FORMAT);
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(manifest.layers.len(), 5);
        assert!(matches!(
            manifest.layers[0],
            LayerSpec::Conv2d {
                strides: 1,
                padding: Padding::Valid,
                activation: Activation::Relu,
                ..
            }
        ));
        assert!(manifest.check_format().is_ok());
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut manifest = dense_manifest(3);
        manifest.version = 7;
        assert!(matches!(
            manifest.check_format(),
            Err(InferenceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_conv_output_shapes() {
        assert_eq!(conv_output(32, 32, 3, 1, 0), Some((30, 30)));
        assert_eq!(conv_output(32, 32, 3, 1, 1), Some((32, 32)));
        assert_eq!(conv_output(30, 30, 2, 2, 0), Some((15, 15)));
        assert_eq!(conv_output(2, 2, 3, 1, 0), None);
    }

    #[test]
    fn test_dense_forward() {
        let weights = dense_weights(3, 16, vec![0.5, 2.0, -1.0]);
        let vb = VarBuilder::from_tensors(weights, DType::F32, &Device::Cpu);
        let model = LayersModel::from_manifest(&dense_manifest(3), vb).unwrap();
        assert_eq!(model.num_classes(), 3);

        let input = Tensor::ones((1, 4, 4, 1), DType::F32, &Device::Cpu).unwrap();
        let output = model.forward(&input).unwrap();
        assert_eq!(output.dims(), &[1, 3]);
        let scores = output.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(scores, vec![0.5, 2.0, -1.0]);
    }

    #[test]
    fn test_forward_rejects_wrong_input_shape() {
        let weights = dense_weights(3, 16, vec![0.0; 3]);
        let vb = VarBuilder::from_tensors(weights, DType::F32, &Device::Cpu);
        let model = LayersModel::from_manifest(&dense_manifest(3), vb).unwrap();

        let input = Tensor::ones((1, 8, 8, 1), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            model.forward(&input),
            Err(InferenceError::Preprocess(_))
        ));
    }

    #[test]
    fn test_conv_stack_shape_propagation() {
        let manifest = ModelManifest {
            format: MANIFEST_FORMAT.into(),
            version: MANIFEST_VERSION,
            input_shape: [32, 32, 1],
            weights: "model.safetensors".into(),
            layers: vec![
                LayerSpec::Conv2d {
                    name: "conv".into(),
                    filters: 2,
                    kernel_size: 3,
                    strides: 1,
                    padding: Padding::Valid,
                    activation: Activation::Relu,
                },
                LayerSpec::MaxPool2d {
                    pool_size: 2,
                    strides: None,
                },
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    name: "out".into(),
                    units: 46,
                    activation: Activation::Softmax,
                },
            ],
        };

        let mut weights = HashMap::new();
        weights.insert(
            "conv.weight".to_string(),
            Tensor::zeros((2, 1, 3, 3), DType::F32, &Device::Cpu).unwrap(),
        );
        weights.insert(
            "conv.bias".to_string(),
            Tensor::zeros(2, DType::F32, &Device::Cpu).unwrap(),
        );
        // 30x30 after conv, 15x15 after pooling, 2 channels
        weights.extend(dense_weights(46, 15 * 15 * 2, vec![0.0; 46]));

        let vb = VarBuilder::from_tensors(weights, DType::F32, &Device::Cpu);
        let model = LayersModel::from_manifest(&manifest, vb).unwrap();
        assert_eq!(model.num_classes(), 46);

        let input = Tensor::zeros((1, 32, 32, 1), DType::F32, &Device::Cpu).unwrap();
        let scores = model
            .forward(&input)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(scores.len(), 46);
        // Softmax over equal logits is uniform
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_dense_before_flatten_rejected() {
        let mut manifest = dense_manifest(3);
        manifest.layers.remove(0);
        let vb = VarBuilder::from_tensors(dense_weights(3, 16, vec![0.0; 3]), DType::F32, &Device::Cpu);
        assert!(matches!(
            LayersModel::from_manifest(&manifest, vb),
            Err(InferenceError::Layer { index: 0, .. })
        ));
    }

    #[test]
    fn test_missing_weights_rejected() {
        let vb = VarBuilder::from_tensors(HashMap::new(), DType::F32, &Device::Cpu);
        assert!(matches!(
            LayersModel::from_manifest(&dense_manifest(3), vb),
            Err(InferenceError::Candle(_))
        ));
    }

    #[tokio::test]
    async fn test_load_written_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dense_manifest(3);
        let path = write_artifact(dir.path(), &manifest, &dense_weights(3, 16, vec![1.0, 3.0, 2.0]))
            .unwrap();

        let model = LayersModel::load(&path, &Device::Cpu).await.unwrap();
        assert_eq!(model.num_classes(), 3);
        assert_eq!(model.input_shape(), [4, 4, 1]);
    }

    #[tokio::test]
    async fn test_load_missing_manifest() {
        let result = LayersModel::load("/no/such/model.json", &Device::Cpu).await;
        assert!(matches!(result, Err(InferenceError::Io { .. })));
    }

    #[tokio::test]
    async fn test_load_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = LayersModel::load(&path, &Device::Cpu).await;
        assert!(matches!(result, Err(InferenceError::Manifest(_))));
    }
}

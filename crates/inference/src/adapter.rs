//! Model lifecycle and forward passes

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use candle_core::{DType, Device};
use lipi_config::ModelConfig;
use tracing::{debug, error, info, warn};

use crate::model::LayersModel;
use crate::preprocess::PreprocessedTensor;
use crate::{Classifier, InferenceError};

/// Whether a model is available for inference
pub enum ModelState {
    Unloaded,
    Loaded(Box<dyn Classifier>),
}

impl ModelState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unloaded => f.write_str("Unloaded"),
            Self::Loaded(model) => write!(f, "Loaded({} classes)", model.num_classes()),
        }
    }
}

/// Raw classifier output, one score per class, in class-index order
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the largest score
    ///
    /// Ties go to the lowest index and NaN scores are skipped. Returns `None`
    /// if there is no comparable score.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, &val) in self.0.iter().enumerate() {
            if val.is_nan() {
                continue;
            }
            match best {
                Some((_, best_val)) if val <= best_val => {}
                _ => best = Some((idx, val)),
            }
        }
        best.map(|(idx, _)| idx)
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

/// Process-wide "a prediction has occurred" marker
///
/// Set by the first successful forward pass and never cleared. Clones share
/// the same flag, so it can be read without locking the adapter.
#[derive(Debug, Clone, Default)]
pub struct PredictionFlag(Arc<AtomicBool>);

impl PredictionFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Loads the classifier on demand and runs it
///
/// A failed load is logged and leaves the adapter unloaded; prediction then
/// fails fast with [`InferenceError::ModelUnavailable`].
pub struct InferenceAdapter {
    /// Manifest to load from; `None` for an injected classifier
    manifest_path: Option<PathBuf>,
    device: Device,
    cache_after_load: bool,
    state: ModelState,
    predicted: PredictionFlag,
}

impl InferenceAdapter {
    /// Create an unloaded adapter reading the model from `manifest_path`
    pub fn new(manifest_path: impl Into<PathBuf>, device: Device) -> Self {
        Self {
            manifest_path: Some(manifest_path.into()),
            device,
            cache_after_load: true,
            state: ModelState::Unloaded,
            predicted: PredictionFlag::default(),
        }
    }

    /// Create an adapter for the configured model artifact
    pub fn from_config(config: &ModelConfig, device: Device) -> Self {
        let mut adapter = Self::new(config.manifest_path.clone(), device);
        adapter.cache_after_load = config.cache_after_load;
        adapter
    }

    /// Wrap an already-loaded classifier
    pub fn with_classifier(classifier: Box<dyn Classifier>, device: Device) -> Self {
        Self {
            manifest_path: None,
            device,
            cache_after_load: true,
            state: ModelState::Loaded(classifier),
            predicted: PredictionFlag::default(),
        }
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Whether any prediction has completed
    pub fn has_predicted(&self) -> bool {
        self.predicted.is_set()
    }

    /// Shared handle on the prediction marker
    pub fn prediction_flag(&self) -> PredictionFlag {
        self.predicted.clone()
    }

    /// Load the model artifact
    ///
    /// Never fails outward: errors are logged and leave the adapter unloaded.
    /// Returns whether a model is available afterwards.
    pub async fn load_model(&mut self) -> bool {
        let Some(path) = self.manifest_path.clone() else {
            return self.is_loaded();
        };
        if self.cache_after_load && self.is_loaded() {
            debug!("InferenceAdapter: model already loaded, reusing");
            return true;
        }

        match LayersModel::load(&path, &self.device).await {
            Ok(model) => {
                info!("InferenceAdapter: model ready ({} classes)", model.num_classes());
                self.state = ModelState::Loaded(Box::new(model));
                true
            }
            Err(e) => {
                error!("Model load error from {}: {}", path.display(), e);
                self.state = ModelState::Unloaded;
                false
            }
        }
    }

    /// Run the classifier on a preprocessed input
    ///
    /// Loads the model first if needed. Every intermediate tensor is dropped
    /// before returning; the result is a plain score list.
    pub async fn predict(&mut self, input: &PreprocessedTensor) -> Result<ScoreVector, InferenceError> {
        self.load_model().await;

        let ModelState::Loaded(model) = &self.state else {
            warn!("InferenceAdapter::predict: no model available");
            return Err(InferenceError::ModelUnavailable);
        };

        let scores = {
            let output = model.forward(input.as_tensor())?;
            output.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?
        };
        if scores.len() != model.num_classes() {
            warn!(
                "InferenceAdapter::predict: {} scores from a {}-class model",
                scores.len(),
                model.num_classes()
            );
        }

        self.predicted.set();
        debug!("InferenceAdapter::predict: {} scores", scores.len());
        Ok(ScoreVector::new(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activation, LayerSpec, ModelManifest, write_artifact};
    use crate::preprocess::TensorPreprocessor;
    use candle_core::Tensor;
    use lipi_painting::{RasterSurface, StrokeStyle};
    use std::collections::HashMap;

    struct FixedScores(Vec<f32>);

    impl Classifier for FixedScores {
        fn forward(&self, input: &Tensor) -> Result<Tensor, InferenceError> {
            let batch = input.dim(0)?;
            Ok(Tensor::from_vec(self.0.clone(), (batch, self.0.len()), input.device())?)
        }

        fn num_classes(&self) -> usize {
            self.0.len()
        }
    }

    fn blank_input() -> PreprocessedTensor {
        let mut surface = RasterSurface::new();
        surface.initialize(256, 256, StrokeStyle::default()).unwrap();
        TensorPreprocessor::new(32, 32, Device::Cpu)
            .preprocess(&surface.snapshot().unwrap())
            .unwrap()
    }

    fn write_model(dir: &Path, bias: Vec<f32>) -> PathBuf {
        let units = bias.len();
        let manifest = ModelManifest {
            format: crate::MANIFEST_FORMAT.into(),
            version: crate::MANIFEST_VERSION,
            input_shape: [32, 32, 1],
            weights: "model.safetensors".into(),
            layers: vec![
                LayerSpec::Flatten,
                LayerSpec::Dense {
                    name: "logits".into(),
                    units,
                    activation: Activation::Softmax,
                },
            ],
        };
        let mut weights = HashMap::new();
        weights.insert(
            "logits.weight".to_string(),
            Tensor::zeros((units, 32 * 32), DType::F32, &Device::Cpu).unwrap(),
        );
        weights.insert(
            "logits.bias".to_string(),
            Tensor::from_vec(bias, units, &Device::Cpu).unwrap(),
        );
        write_artifact(dir, &manifest, &weights).unwrap()
    }

    #[test]
    fn test_argmax_first_occurrence_wins() {
        let scores = ScoreVector::new(vec![0.1, 0.7, 0.2, 0.7]);
        assert_eq!(scores.argmax(), Some(1));
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(ScoreVector::new(vec![f32::NAN, 0.5, 0.2]).argmax(), Some(1));
        assert_eq!(ScoreVector::new(vec![f32::NAN]).argmax(), None);
        assert_eq!(ScoreVector::new(vec![]).argmax(), None);
    }

    #[test]
    fn test_argmax_negative_scores() {
        assert_eq!(ScoreVector::new(vec![-3.0, -1.0, -2.0]).argmax(), Some(1));
    }

    #[tokio::test]
    async fn test_predict_with_injected_classifier() {
        let mut adapter =
            InferenceAdapter::with_classifier(Box::new(FixedScores(vec![0.2, 0.5, 0.3])), Device::Cpu);
        assert!(!adapter.has_predicted());

        let scores = adapter.predict(&blank_input()).await.unwrap();
        assert_eq!(scores.as_slice(), &[0.2, 0.5, 0.3]);
        assert!(adapter.has_predicted());
    }

    #[tokio::test]
    async fn test_missing_artifact_leaves_adapter_unloaded() {
        let mut adapter = InferenceAdapter::new("/no/such/dir/model.json", Device::Cpu);

        assert!(!adapter.load_model().await);
        assert!(!adapter.is_loaded());

        let result = adapter.predict(&blank_input()).await;
        assert!(matches!(result, Err(InferenceError::ModelUnavailable)));
        assert!(!adapter.has_predicted());
    }

    #[tokio::test]
    async fn test_predict_loads_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let mut bias = vec![0.0; 46];
        bias[7] = 5.0;
        let path = write_model(dir.path(), bias);

        let mut adapter = InferenceAdapter::new(path, Device::Cpu);
        assert!(!adapter.is_loaded());

        let scores = adapter.predict(&blank_input()).await.unwrap();
        assert!(adapter.is_loaded());
        assert_eq!(scores.len(), 46);
        assert_eq!(scores.argmax(), Some(7));
    }

    #[tokio::test]
    async fn test_cached_model_survives_artifact_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), vec![0.0, 1.0]);

        let mut adapter = InferenceAdapter::new(&path, Device::Cpu);
        assert!(adapter.load_model().await);
        std::fs::remove_file(&path).unwrap();

        // Cached: no reload, still usable
        assert!(adapter.predict(&blank_input()).await.is_ok());
    }

    #[tokio::test]
    async fn test_uncached_model_reloads_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            manifest_path: write_model(dir.path(), vec![0.0, 1.0]),
            cache_after_load: false,
            ..Default::default()
        };
        let mut adapter = InferenceAdapter::from_config(&config, Device::Cpu);
        let flag = adapter.prediction_flag();
        assert!(adapter.predict(&blank_input()).await.is_ok());
        assert!(flag.is_set());

        // The next call reloads, finds the file gone and unloads
        std::fs::remove_file(&config.manifest_path).unwrap();
        assert!(matches!(
            adapter.predict(&blank_input()).await,
            Err(InferenceError::ModelUnavailable)
        ));
        assert!(!adapter.is_loaded());

        // A failed call never clears the marker
        assert!(adapter.has_predicted());
        assert!(flag.is_set());
    }

    #[test]
    fn test_from_config() {
        let config = ModelConfig {
            manifest_path: "/tmp/elsewhere/model.json".into(),
            cache_after_load: false,
            ..Default::default()
        };
        let adapter = InferenceAdapter::from_config(&config, Device::Cpu);
        assert_eq!(
            adapter.manifest_path(),
            Some(Path::new("/tmp/elsewhere/model.json"))
        );
        assert!(!adapter.cache_after_load);
    }
}

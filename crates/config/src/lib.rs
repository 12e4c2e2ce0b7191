//! Shared configuration for Lipi
//!
//! This crate provides the single source of truth for canvas dimensions,
//! stroke styling, and the location of the classifier artifact. Values come
//! from defaults, an optional JSON file, and `LIPI_*` environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Default canvas width in pixels
pub const DEFAULT_WIDTH: u32 = 256;

/// Default canvas height in pixels
pub const DEFAULT_HEIGHT: u32 = 256;

/// Default stroke width in pixels
pub const DEFAULT_STROKE_WIDTH: f32 = 30.0;

/// Foreground (stroke) color, `#fff`
pub const DEFAULT_STROKE_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Background (fill) color, `#000`
pub const DEFAULT_BACKGROUND_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Spatial size the classifier expects
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 32;

/// Location of the model manifest, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "assets/models/model.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid stroke width: {0}")]
    InvalidStrokeWidth(f32),
}

/// Drawing surface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// Stroke diameter in pixels
    pub stroke_width: f32,
    /// RGBA stroke color
    pub stroke_color: [u8; 4],
    /// RGBA background color
    pub background_color: [u8; 4],
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            stroke_width: DEFAULT_STROKE_WIDTH,
            stroke_color: DEFAULT_STROKE_COLOR,
            background_color: DEFAULT_BACKGROUND_COLOR,
        }
    }
}

impl CanvasConfig {
    /// Create a canvas config with the given dimensions and default styling
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }
}

/// Classifier artifact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the model manifest (`model.json`)
    pub manifest_path: PathBuf,
    /// Width the canvas snapshot is resized to
    pub input_width: u32,
    /// Height the canvas snapshot is resized to
    pub input_height: u32,
    /// Keep the model after the first successful load instead of reloading per prediction
    pub cache_after_load: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_width: DEFAULT_MODEL_INPUT_SIZE,
            input_height: DEFAULT_MODEL_INPUT_SIZE,
            cache_after_load: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LipiConfig {
    pub canvas: CanvasConfig,
    pub model: ModelConfig,
}

impl LipiConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `LIPI_*` environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `LIPI_*` environment overrides in place
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("LIPI_MODEL_PATH") {
            self.model.manifest_path = PathBuf::from(path);
        }
        if let Some(width) = env_override("LIPI_CANVAS_WIDTH") {
            self.canvas.width = width;
        }
        if let Some(height) = env_override("LIPI_CANVAS_HEIGHT") {
            self.canvas.height = height;
        }
        if let Some(cache) = env_override("LIPI_MODEL_CACHE") {
            self.model.cache_after_load = cache;
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let canvas = &self.canvas;
        if canvas.width == 0 || canvas.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: canvas.width,
                height: canvas.height,
            });
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.model.input_width,
                height: self.model.input_height,
            });
        }
        if !(canvas.stroke_width > 0.0) {
            return Err(ConfigError::InvalidStrokeWidth(canvas.stroke_width));
        }
        Ok(())
    }
}

fn env_override<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value {:?} for {}", raw, key);
            None
        }
    }
}

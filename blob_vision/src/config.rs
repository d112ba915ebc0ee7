//! Tunable settings for the vision pipeline and its render loop.
//!
//! Every field has a default, so a config file only needs the values it changes:
//!
//! ```toml
//! use_derived_channels = false
//! dim_unmatched = 0.4
//!
//! [detection]
//! min_neighbors = 5
//! ```

use crate::core_modules::face_tracker::{DetectionParams, ModelSpec};
use crate::core_modules::mask_engine::{CompositeOptions, MaskOptions, UnmatchedStyle};
use crate::core_modules::pixel::pixel::Pixel;
use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the VisionPipeline, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Also match on the signed channel differences, not just R, G and B.
    pub use_derived_channels: bool,
    /// RGBA color painted over matched pixels.
    pub highlight: [u8; 4],
    /// Dim unmatched pixels by this factor instead of passing them through.
    pub dim_unmatched: Option<f32>,
    /// The display shows the buffer mirrored horizontally.
    pub mirrored: bool,
    /// Run the face tracker each tick.
    pub track_faces: bool,
    pub detection: DetectionParams,
    /// Vertical offset of the overlay's neutral position, added to each detection's `y`.
    pub overlay_base_offset_y: i32,
    pub tick_interval_ms: u64,
    /// Cascade files that must all load before face tracking starts.
    pub models: Vec<ModelSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_derived_channels: true,
            highlight: [255, 0, 0, 255],
            dim_unmatched: None,
            mirrored: false,
            track_faces: true,
            detection: DetectionParams::default(),
            overlay_base_offset_y: 30,
            tick_interval_ms: 16,
            models: vec![
                ModelSpec::new("frontal_face", "models/haarcascade_frontalface_default.xml"),
                ModelSpec::new("eye", "models/haarcascade_eye.xml"),
            ],
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| VisionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VisionError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(factor) = self.dim_unmatched {
            if !(0.0..=1.0).contains(&factor) {
                return Err(VisionError::Config(format!("dim_unmatched must be within [0, 1], got {factor}")));
            }
        }
        if self.detection.scale_factor <= 1.0 {
            return Err(VisionError::Config(format!(
                "detection.scale_factor must be greater than 1, got {}",
                self.detection.scale_factor
            )));
        }
        if self.detection.min_neighbors < 0 {
            return Err(VisionError::Config("detection.min_neighbors cannot be negative".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(VisionError::Config("tick_interval_ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn mask_options(&self) -> MaskOptions {
        MaskOptions { use_derived_channels: self.use_derived_channels }
    }

    pub fn composite_options(&self) -> CompositeOptions {
        let [r, g, b, a] = self.highlight;
        CompositeOptions {
            highlight: Pixel::new(r, g, b, a),
            unmatched: match self.dim_unmatched {
                Some(factor) => UnmatchedStyle::Dim(factor),
                None => UnmatchedStyle::PassThrough,
            },
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

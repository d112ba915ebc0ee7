// THEORY:
// A single error type for the whole engine. Most failures in a live pipeline are
// local and recoverable: a bad frame costs one tick, a broken classifier costs one
// detection. The only failure with a longer reach is a model that never loads,
// and even that only disables the face half of the pipeline.
//
// Calibration never produces an error. Out-of-range bounds are clamped where they
// are applied, so there is deliberately no variant for them here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("frame buffer too small (expected at least {expected} bytes, got {actual})")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("frame stride {stride} is shorter than a row of {width} RGBA pixels")]
    InvalidStride { stride: usize, width: u32 },
    #[error("mask is {mask_width}x{mask_height} but frame is {frame_width}x{frame_height}")]
    MaskMismatch { mask_width: u32, mask_height: u32, frame_width: u32, frame_height: u32 },
    #[error("failed to load cascade model '{name}': {reason}")]
    ModelLoad { name: String, reason: String },
    #[error("cascade classifier failed: {0}")]
    Classifier(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, VisionError>;

// THEORY:
// This file is the main entry point for the `blob_vision` library crate. It
// exports the `VisionPipeline`, its `PipelineConfig`, and the `RenderLoop` that
// drives it as the high-level interface to the engine.
//
// The per-frame building blocks (`core_modules`) stay public so a host can use a
// single stage on its own, e.g. the mask engine over a still image, but most
// callers only need the re-exports below.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod render_loop;
pub mod telemetry;

pub use crate::config::PipelineConfig;
pub use crate::core_modules::color_predicate::{BoundsUpdate, ChannelRange, ColorPredicate, PredicateChannel};
pub use crate::core_modules::face_tracker::{
    CascadeClassifier, DetectionParams, DetectionRect, FaceTracker, ModelLoader, ModelSpec, OverlayOffset,
};
pub use crate::core_modules::frame::{DeviceInfo, Frame, FrameSource};
pub use crate::core_modules::pixel::pixel::Pixel;
pub use crate::core_modules::point_sampler::{PointerEvent, SurfaceRect};
pub use crate::error::{Result, VisionError};
pub use crate::pipeline::{TickReport, VisionPipeline};
pub use crate::render_loop::{DisplaySurface, LoopControl, LoopStats, RenderLoop, TickOutcome};

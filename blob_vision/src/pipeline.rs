// THEORY:
// The `pipeline` module is the top-level API for the vision engine. It owns the
// only state that lives across ticks (the color predicate, the pending samples,
// and the face tracker) and runs one complete pass per frame.
//
// One tick, in order:
// 1.  Validate the frame. A malformed frame fails the tick before anything is
//     mutated, so it cannot poison the predicate.
// 2.  Drain queued samples into the predicate.
// 3.  Mask and composite (or copy through, when the predicate is at reset).
// 4.  Run the face tracker, when enabled and ready.
// 5.  Package everything into a `TickReport` for the display surface.
//
// Every buffer allocated in a tick is owned by that tick and dropped when the
// call returns, on the error path as well as the happy path.

use crate::core_modules::color_predicate::{BoundsUpdate, ColorPredicate};
use crate::core_modules::face_tracker::{CascadeClassifier, DetectionRect, FaceTracker, OverlayOffset};
use crate::core_modules::frame::Frame;
use crate::core_modules::mask_engine::mask_engine;
use crate::core_modules::point_sampler::{DrainReport, PointSampler, PointerEvent};
use crate::error::Result;
use image::RgbaImage;

pub use crate::config::PipelineConfig;

/// Everything the display surface needs for one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub output: RgbaImage,
    pub matched_pixels: usize,
    /// The output is an unmodified copy because the predicate is at reset.
    pub identity: bool,
    pub samples: DrainReport,
    pub detections: Vec<DetectionRect>,
    /// Where the overlay should be translated to; `None` until a face has been seen.
    pub overlay_offset: Option<OverlayOffset>,
}

/// The main, top-level struct for the vision engine.
pub struct VisionPipeline<C> {
    config: PipelineConfig,
    predicate: ColorPredicate,
    sampler: PointSampler,
    tracker: FaceTracker<C>,
    ticks: u64,
}

impl<C: CascadeClassifier> VisionPipeline<C> {
    pub fn new(config: PipelineConfig, tracker: FaceTracker<C>) -> Self {
        Self {
            sampler: PointSampler::new(config.mirrored),
            config,
            predicate: ColorPredicate::reset(),
            tracker,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn predicate(&self) -> &ColorPredicate {
        &self.predicate
    }

    pub fn reset_predicate(&mut self) {
        self.predicate = ColorPredicate::reset();
    }

    /// Direct slider edits.
    pub fn set_bounds(&mut self, updates: &[BoundsUpdate]) {
        self.predicate.set_bounds(updates);
    }

    pub fn sampler_mut(&mut self) -> &mut PointSampler {
        &mut self.sampler
    }

    pub fn handle_pointer(&mut self, event: PointerEvent, buffer_size: (u32, u32)) {
        self.sampler.handle(event, buffer_size);
    }

    pub fn tracker(&self) -> &FaceTracker<C> {
        &self.tracker
    }

    /// Runs one full pass over `frame`.
    pub fn process_tick(&mut self, frame: &Frame<'_>) -> Result<TickReport> {
        // Stage 1: Reject malformed input before touching any state.
        frame.validate()?;

        // Stage 2: Calibration
        let samples = self.sampler.drain_into(frame, &mut self.predicate);

        // Stage 3: Masking & Compositing
        let rendered = mask_engine::render(
            frame,
            &self.predicate,
            self.config.mask_options(),
            self.config.composite_options(),
        )?;

        // Stage 4: Face Tracking
        let (detections, overlay_offset) = if self.config.track_faces {
            let outcome = self.tracker.track(frame)?;
            (outcome.detections, outcome.offset)
        } else {
            (Vec::new(), self.tracker.overlay_offset())
        };

        self.ticks += 1;
        Ok(TickReport {
            tick: self.ticks,
            output: rendered.image,
            matched_pixels: rendered.matched_pixels,
            identity: rendered.identity,
            samples,
            detections,
            overlay_offset,
        })
    }
}

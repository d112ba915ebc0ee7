// THEORY:
// The `FaceTracker` locates faces with a pre-trained cascade classifier and turns
// the primary detection into a translation for an overlay image. It is detection,
// not tracking: every tick starts from nothing and no identity survives a frame.
//
// Key architectural principles:
// 1.  **Opaque Classifier**: The cascade is a black box behind `CascadeClassifier`.
//     This module only prepares its input (a grayscale downconvert) and interprets
//     its output (rectangles, in classifier order).
// 2.  **Two States, One Transition**: A tracker is `Unloaded` until every required
//     model has loaded, then `Ready` for the rest of the session. Loading is an
//     awaited future, not a callback flipping a flag. A failed load leaves the
//     tracker `Unloaded` for good, and detection degrades to a no-op while the
//     color half of the pipeline keeps running.
// 3.  **Sticky Overlay**: The first rectangle drives the overlay. When a frame has
//     no detections the previous offset is kept, so a single missed frame does not
//     make the overlay jump back to its neutral position.

use crate::core_modules::frame::Frame;
use crate::error::Result;
use futures::future::try_join_all;
use image::GrayImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;

/// An axis-aligned detection in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DetectionRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// The 2D translation applied to the overlay element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayOffset {
    pub tx: i32,
    pub ty: i32,
}

/// Multi-scale detection settings handed to the classifier.
///
/// A size of `(0, 0)` means "unconstrained".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size: (i32, i32),
    pub max_size: (i32, i32),
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self { scale_factor: 1.1, min_neighbors: 3, min_size: (0, 0), max_size: (0, 0) }
    }
}

/// A cascade model file the tracker needs before it can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub path: PathBuf,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into() }
    }
}

/// The pre-trained detector, consumed as a black box.
pub trait CascadeClassifier {
    fn detect_multi_scale(&mut self, gray: &GrayImage, params: &DetectionParams) -> Result<Vec<DetectionRect>>;
}

/// Loads model files and assembles them into a classifier.
pub trait ModelLoader {
    type Model;
    type Classifier: CascadeClassifier;

    fn load_model(&self, spec: &ModelSpec) -> impl Future<Output = Result<Self::Model>> + Send;

    /// Builds the classifier once every model in the session has loaded.
    fn assemble(&self, models: Vec<Self::Model>) -> Result<Self::Classifier>;
}

pub enum TrackerState<C> {
    Unloaded,
    Ready(C),
}

/// Result of one `track` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOutcome {
    pub detections: Vec<DetectionRect>,
    /// The overlay offset after this tick (unchanged when nothing was found).
    pub offset: Option<OverlayOffset>,
}

pub struct FaceTracker<C> {
    state: TrackerState<C>,
    params: DetectionParams,
    /// Vertical offset of the overlay's neutral position.
    base_offset_y: i32,
    offset: Option<OverlayOffset>,
}

impl<C: CascadeClassifier> FaceTracker<C> {
    pub fn unloaded(params: DetectionParams, base_offset_y: i32) -> Self {
        Self { state: TrackerState::Unloaded, params, base_offset_y, offset: None }
    }

    pub fn ready(classifier: C, params: DetectionParams, base_offset_y: i32) -> Self {
        Self { state: TrackerState::Ready(classifier), params, base_offset_y, offset: None }
    }

    /// Awaits every model in `models`, then assembles the classifier.
    ///
    /// Any failure is logged and yields an `Unloaded` tracker; it is never retried.
    pub async fn load<L>(loader: &L, models: &[ModelSpec], params: DetectionParams, base_offset_y: i32) -> Self
    where
        L: ModelLoader<Classifier = C>,
    {
        let loaded = try_join_all(models.iter().map(|spec| loader.load_model(spec))).await;
        match loaded.and_then(|loaded_models| loader.assemble(loaded_models)) {
            Ok(classifier) => {
                info!("face tracker ready ({} model(s) loaded)", models.len());
                Self::ready(classifier, params, base_offset_y)
            }
            Err(err) => {
                warn!("face tracking disabled for this session: {err}");
                Self::unloaded(params, base_offset_y)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, TrackerState::Ready(_))
    }

    pub fn overlay_offset(&self) -> Option<OverlayOffset> {
        self.offset
    }

    /// Runs the classifier on a grayscale copy of `frame`.
    ///
    /// An unloaded tracker returns no detections.
    pub fn detect(&mut self, frame: &Frame<'_>) -> Result<Vec<DetectionRect>> {
        let TrackerState::Ready(classifier) = &mut self.state else {
            return Ok(Vec::new());
        };
        let gray = frame.grayscale()?;
        classifier.detect_multi_scale(&gray, &self.params)
    }

    pub fn map_to_overlay(&self, rect: &DetectionRect) -> OverlayOffset {
        OverlayOffset { tx: rect.x, ty: self.base_offset_y + rect.y }
    }

    /// Detects, then moves the overlay to the first detection if there is one.
    pub fn track(&mut self, frame: &Frame<'_>) -> Result<TrackOutcome> {
        let detections = self.detect(frame)?;
        if let Some(primary) = detections.first() {
            let offset = self.map_to_overlay(primary);
            debug!("overlay follows face at {:?} -> {:?}", primary, offset);
            self.offset = Some(offset);
        }
        Ok(TrackOutcome { detections, offset: self.offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;
    use std::collections::VecDeque;

    /// Replays canned detections, one batch per call.
    struct Scripted {
        batches: VecDeque<Result<Vec<DetectionRect>>>,
        seen: Vec<(u32, u32, DetectionParams)>,
    }

    impl Scripted {
        fn new(batches: Vec<Result<Vec<DetectionRect>>>) -> Self {
            Self { batches: batches.into(), seen: Vec::new() }
        }
    }

    impl CascadeClassifier for Scripted {
        fn detect_multi_scale(&mut self, gray: &GrayImage, params: &DetectionParams) -> Result<Vec<DetectionRect>> {
            self.seen.push((gray.width(), gray.height(), *params));
            self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct Loader {
        missing: Option<&'static str>,
    }

    impl ModelLoader for Loader {
        type Model = String;
        type Classifier = Scripted;

        fn load_model(&self, spec: &ModelSpec) -> impl Future<Output = Result<String>> + Send {
            let name = spec.name.clone();
            let missing = self.missing;
            async move {
                if missing == Some(name.as_str()) {
                    Err(VisionError::ModelLoad { name, reason: "not found".into() })
                } else {
                    Ok(name)
                }
            }
        }

        fn assemble(&self, _models: Vec<String>) -> Result<Scripted> {
            Ok(Scripted::new(Vec::new()))
        }
    }

    fn models() -> Vec<ModelSpec> {
        vec![ModelSpec::new("face", "face.xml"), ModelSpec::new("eye", "eye.xml")]
    }

    fn gray_frame() -> Vec<u8> {
        vec![128u8; 8 * 6 * 4]
    }

    #[tokio::test]
    async fn becomes_ready_when_every_model_loads() {
        let tracker = FaceTracker::load(&Loader { missing: None }, &models(), DetectionParams::default(), 30).await;
        assert!(tracker.is_ready());
    }

    #[tokio::test]
    async fn one_failed_model_keeps_the_tracker_unloaded() {
        let mut tracker =
            FaceTracker::load(&Loader { missing: Some("eye") }, &models(), DetectionParams::default(), 30).await;
        assert!(!tracker.is_ready());

        let buffer = gray_frame();
        let outcome = tracker.track(&Frame::new(8, 6, &buffer)).expect("no-op track");
        assert!(outcome.detections.is_empty());
        assert_eq!(outcome.offset, None);
    }

    #[test]
    fn detect_uses_fixed_multiscale_parameters() {
        let mut tracker = FaceTracker::ready(Scripted::new(vec![]), DetectionParams::default(), 30);
        let buffer = gray_frame();
        tracker.detect(&Frame::new(8, 6, &buffer)).expect("detect");

        let TrackerState::Ready(classifier) = &tracker.state else { panic!("tracker should be ready") };
        let (w, h, params) = classifier.seen[0];
        assert_eq!((w, h), (8, 6));
        assert_eq!(params.scale_factor, 1.1);
        assert_eq!(params.min_neighbors, 3);
        assert_eq!(params.min_size, (0, 0));
        assert_eq!(params.max_size, (0, 0));
    }

    #[test]
    fn first_detection_drives_the_overlay() {
        let batches = vec![Ok(vec![DetectionRect::new(40, 12, 50, 50), DetectionRect::new(5, 5, 80, 80)])];
        let mut tracker = FaceTracker::ready(Scripted::new(batches), DetectionParams::default(), 30);
        let buffer = gray_frame();

        let outcome = tracker.track(&Frame::new(8, 6, &buffer)).expect("track");
        assert_eq!(outcome.detections.len(), 2);
        assert_eq!(outcome.offset, Some(OverlayOffset { tx: 40, ty: 42 }));
    }

    #[test]
    fn empty_detection_keeps_the_previous_offset() {
        let batches = vec![Ok(vec![DetectionRect::new(7, 3, 20, 20)]), Ok(vec![])];
        let mut tracker = FaceTracker::ready(Scripted::new(batches), DetectionParams::default(), 30);
        let buffer = gray_frame();
        let frame = Frame::new(8, 6, &buffer);

        tracker.track(&frame).expect("first tick");
        let outcome = tracker.track(&frame).expect("second tick");
        assert!(outcome.detections.is_empty());
        assert_eq!(tracker.overlay_offset(), Some(OverlayOffset { tx: 7, ty: 33 }));
    }

    #[test]
    fn classifier_failures_surface_as_errors() {
        let batches = vec![Err(VisionError::Classifier("bad input".into()))];
        let mut tracker = FaceTracker::ready(Scripted::new(batches), DetectionParams::default(), 30);
        let buffer = gray_frame();
        assert!(tracker.track(&Frame::new(8, 6, &buffer)).is_err());
        assert_eq!(tracker.overlay_offset(), None);
    }
}

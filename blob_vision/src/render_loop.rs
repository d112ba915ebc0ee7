// THEORY:
// The `RenderLoop` is the heartbeat of a live session. It wakes once per display
// refresh, pulls the newest frame, forwards input that arrived since the last
// tick, runs the pipeline, and hands the result to whatever is drawing it.
//
// Key architectural principles:
// 1.  **Cooperative, Single Task**: The loop is one async task. No tick suspends
//     part-way through; the only await points are the timer and the stop signal.
// 2.  **Failures Cost One Tick**: A missing frame skips the tick quietly. A bad
//     frame or a classifier error is logged and skipped. Nothing is retried, and the
//     next tick is always scheduled.
// 3.  **Explicit Stop**: `LoopControl::stop` is observed before the next tick
//     starts. Per-tick buffers are owned by the tick, so there is nothing to
//     release beyond letting them drop.
// 4.  **Input Through a Queue**: The UI never holds the pipeline. It sends pointer
//     events down a channel, and the loop feeds them to the sampler at tick start.

use crate::core_modules::face_tracker::CascadeClassifier;
use crate::core_modules::frame::FrameSource;
use crate::core_modules::point_sampler::PointerEvent;
use crate::pipeline::{TickReport, VisionPipeline};
use crate::telemetry::timing_guard;
use log::{Level, debug, info, warn};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// Receives one composited frame (and overlay offset) per successful tick.
pub trait DisplaySurface {
    fn present(&mut self, report: &TickReport);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The frame source had nothing to offer.
    Skipped,
    /// The tick failed and was dropped.
    Failed,
    Rendered,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub rendered: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Wall time of the slowest tick, whatever its outcome.
    pub slowest_tick: Duration,
}

impl LoopStats {
    fn record(&mut self, outcome: TickOutcome, took: Duration) {
        self.slowest_tick = self.slowest_tick.max(took);
        match outcome {
            TickOutcome::Rendered => self.rendered += 1,
            TickOutcome::Skipped => self.skipped += 1,
            TickOutcome::Failed => self.failed += 1,
        }
    }
}

/// The UI side of a render loop: stop it, or feed it pointer input.
#[derive(Clone)]
pub struct LoopControl {
    stop_tx: watch::Sender<bool>,
    input_tx: mpsc::UnboundedSender<PointerEvent>,
}

impl LoopControl {
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Returns `false` once the loop has gone away.
    pub fn send_pointer(&self, event: PointerEvent) -> bool {
        self.input_tx.send(event).is_ok()
    }
}

pub struct RenderLoop {
    interval: Duration,
    stop_rx: watch::Receiver<bool>,
    input_rx: mpsc::UnboundedReceiver<PointerEvent>,
}

impl RenderLoop {
    pub fn new(interval: Duration) -> (Self, LoopControl) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        (Self { interval, stop_rx, input_rx }, LoopControl { stop_tx, input_tx })
    }

    /// One pass: input, frame, pipeline, surface.
    pub fn tick<S, D, C>(&mut self, source: &mut S, pipeline: &mut VisionPipeline<C>, surface: &mut D) -> TickOutcome
    where
        S: FrameSource,
        D: DisplaySurface,
        C: CascadeClassifier,
    {
        let Some(frame) = source.current_frame() else {
            debug!("frame unavailable, skipping tick");
            return TickOutcome::Skipped;
        };

        let buffer_size = (frame.width, frame.height);
        while let Ok(event) = self.input_rx.try_recv() {
            pipeline.handle_pointer(event, buffer_size);
        }

        match pipeline.process_tick(&frame) {
            Ok(report) => {
                surface.present(&report);
                TickOutcome::Rendered
            }
            Err(err) => {
                warn!("tick dropped: {err}");
                TickOutcome::Failed
            }
        }
    }

    /// Ticks at the configured interval until stopped.
    ///
    /// Dropping every `LoopControl` also stops the loop.
    pub async fn run<S, D, C>(mut self, source: &mut S, pipeline: &mut VisionPipeline<C>, surface: &mut D) -> LoopStats
    where
        S: FrameSource,
        D: DisplaySurface,
        C: CascadeClassifier,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = LoopStats::default();

        info!("render loop started ({:?} per tick)", self.interval);
        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let timing = timing_guard("tick", Level::Trace);
                    let outcome = self.tick(source, pipeline, surface);
                    stats.record(outcome, timing.finish());
                }
            }
        }
        info!(
            "render loop stopped: {} rendered, {} skipped, {} failed, slowest tick {:.2?}",
            stats.rendered, stats.skipped, stats.failed, stats.slowest_tick
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core_modules::face_tracker::{DetectionParams, DetectionRect, FaceTracker};
    use crate::core_modules::frame::{DeviceInfo, Frame};
    use crate::core_modules::point_sampler::SurfaceRect;
    use crate::error::Result;
    use image::GrayImage;
    use std::collections::VecDeque;

    struct NoFaces;

    impl CascadeClassifier for NoFaces {
        fn detect_multi_scale(&mut self, _: &GrayImage, _: &DetectionParams) -> Result<Vec<DetectionRect>> {
            Ok(Vec::new())
        }
    }

    /// Serves a queue of (width, height, bytes) frames; `None` entries are "camera not ready".
    struct Queued {
        frames: VecDeque<Option<(u32, u32, Vec<u8>)>>,
        current: Option<(u32, u32, Vec<u8>)>,
    }

    impl FrameSource for Queued {
        fn current_frame(&mut self) -> Option<Frame<'_>> {
            self.current = self.frames.pop_front().flatten();
            self.current.as_ref().map(|(w, h, data)| Frame::new(*w, *h, data))
        }

        fn devices(&self) -> Vec<DeviceInfo> {
            vec![DeviceInfo { index: 0, label: "queued".into() }]
        }

        fn select_device(&mut self, _index: usize) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        reports: Vec<TickReport>,
    }

    impl DisplaySurface for Recorder {
        fn present(&mut self, report: &TickReport) {
            self.reports.push(report.clone());
        }
    }

    fn pipeline() -> VisionPipeline<NoFaces> {
        let config = PipelineConfig::default();
        let tracker = FaceTracker::ready(NoFaces, config.detection, config.overlay_base_offset_y);
        VisionPipeline::new(config, tracker)
    }

    #[test]
    fn each_kind_of_tick_is_classified() {
        let mut source = Queued {
            frames: VecDeque::from(vec![None, Some((0, 0, Vec::new())), Some((1, 1, vec![1, 2, 3, 255]))]),
            current: None,
        };
        let mut pipeline = pipeline();
        let mut surface = Recorder::default();
        let (mut render_loop, _control) = RenderLoop::new(Duration::from_millis(1));

        assert_eq!(render_loop.tick(&mut source, &mut pipeline, &mut surface), TickOutcome::Skipped);
        assert_eq!(render_loop.tick(&mut source, &mut pipeline, &mut surface), TickOutcome::Failed);
        assert_eq!(render_loop.tick(&mut source, &mut pipeline, &mut surface), TickOutcome::Rendered);
        assert_eq!(surface.reports.len(), 1);
        assert_eq!(surface.reports[0].output.as_raw(), &vec![1, 2, 3, 255]);
    }

    #[test]
    fn pointer_input_reaches_the_sampler_at_tick_start() {
        let mut source = Queued {
            frames: VecDeque::from(vec![Some((1, 1, vec![10, 20, 30, 255]))]),
            current: None,
        };
        let mut pipeline = pipeline();
        let mut surface = Recorder::default();
        let (mut render_loop, control) = RenderLoop::new(Duration::from_millis(1));

        let surface_rect = SurfaceRect::from_size(100.0, 100.0);
        assert!(control.send_pointer(PointerEvent::Down));
        assert!(control.send_pointer(PointerEvent::Move { device_x: 50.0, device_y: 50.0, surface: surface_rect }));
        assert!(control.send_pointer(PointerEvent::Up));

        render_loop.tick(&mut source, &mut pipeline, &mut surface);
        assert_eq!(surface.reports[0].samples.applied, 1);
        assert!(!pipeline.predicate().is_at_reset());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_the_loop() {
        let frames = (0..1000).map(|_| Some((1, 1, vec![0, 0, 0, 255]))).collect();
        let mut source = Queued { frames, current: None };
        let mut pipeline = pipeline();
        let mut surface = Recorder::default();
        let (render_loop, control) = RenderLoop::new(Duration::from_millis(16));

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            control.stop();
            control
        });

        let stats = render_loop.run(&mut source, &mut pipeline, &mut surface).await;
        let control = stopper.await.expect("stopper task");

        assert!(stats.rendered >= 1);
        assert!(stats.rendered < 1000);
        assert_eq!(stats.failed, 0);
        assert!(!control.send_pointer(PointerEvent::Up));
    }

    #[tokio::test]
    async fn already_stopped_loop_never_ticks() {
        let mut source = Queued { frames: VecDeque::new(), current: None };
        let mut pipeline = pipeline();
        let mut surface = Recorder::default();
        let (render_loop, control) = RenderLoop::new(Duration::from_millis(16));
        control.stop();

        let stats = render_loop.run(&mut source, &mut pipeline, &mut surface).await;
        assert_eq!(stats, LoopStats::default());
    }
}

use blob_vision::core_modules::mask_engine::{CompositeOptions, MaskOptions, mask_engine};
use blob_vision::{
    CascadeClassifier, ChannelRange, ColorPredicate, DetectionParams, DetectionRect, DeviceInfo, DisplaySurface,
    FaceTracker, Frame, FrameSource, ModelLoader, ModelSpec, OverlayOffset, Pixel, PipelineConfig, PointerEvent,
    RenderLoop, Result, SurfaceRect, TickOutcome, TickReport, VisionError, VisionPipeline,
};
use image::GrayImage;
use std::future::Future;
use std::time::Duration;

/// Reports a face only where the frame is bright enough.
struct BrightSpot;

impl CascadeClassifier for BrightSpot {
    fn detect_multi_scale(&mut self, gray: &GrayImage, _: &DetectionParams) -> Result<Vec<DetectionRect>> {
        Ok(gray
            .enumerate_pixels()
            .find(|(_, _, px)| px.0[0] > 200)
            .map(|(x, y, _)| DetectionRect::new(x as i32, y as i32, 4, 4))
            .into_iter()
            .collect())
    }
}

struct DiskLoader;

impl ModelLoader for DiskLoader {
    type Model = ModelSpec;
    type Classifier = BrightSpot;

    fn load_model(&self, spec: &ModelSpec) -> impl Future<Output = Result<ModelSpec>> + Send {
        let spec = spec.clone();
        async move {
            if spec.path.extension().is_some_and(|ext| ext == "xml") {
                Ok(spec)
            } else {
                Err(VisionError::ModelLoad { name: spec.name, reason: "not a cascade file".into() })
            }
        }
    }

    fn assemble(&self, _: Vec<ModelSpec>) -> Result<BrightSpot> {
        Ok(BrightSpot)
    }
}

struct Still {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Still {
    fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = std::iter::repeat_n(rgba, (width * height) as usize).flatten().collect();
        Self { width, height, data }
    }

    fn set(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let at = ((y * self.width + x) * 4) as usize;
        self.data[at..at + 4].copy_from_slice(&rgba);
    }
}

impl FrameSource for Still {
    fn current_frame(&mut self) -> Option<Frame<'_>> {
        Some(Frame::new(self.width, self.height, &self.data))
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        vec![DeviceInfo { index: 0, label: "still".into() }]
    }

    fn select_device(&mut self, index: usize) -> Result<()> {
        match index {
            0 => Ok(()),
            _ => Err(VisionError::Config(format!("no device {index}"))),
        }
    }
}

#[derive(Default)]
struct Surface {
    last: Option<TickReport>,
}

impl DisplaySurface for Surface {
    fn present(&mut self, report: &TickReport) {
        self.last = Some(report.clone());
    }
}

fn sample(pipeline: &mut VisionPipeline<BrightSpot>, x: f64, y: f64, size: (u32, u32)) {
    let surface = SurfaceRect::from_size(size.0 as f64, size.1 as f64);
    pipeline.handle_pointer(PointerEvent::Down, size);
    pipeline.handle_pointer(PointerEvent::Move { device_x: x, device_y: y, surface }, size);
    pipeline.handle_pointer(PointerEvent::Up, size);
}

async fn ready_pipeline() -> VisionPipeline<BrightSpot> {
    let config = PipelineConfig::default();
    let tracker =
        FaceTracker::load(&DiskLoader, &config.models, config.detection, config.overlay_base_offset_y).await;
    assert!(tracker.is_ready());
    VisionPipeline::new(config, tracker)
}

#[tokio::test]
async fn calibrating_on_pure_red_then_darker_red() {
    let mut still = Still::filled(4, 4, [0, 0, 0, 255]);
    still.set(1, 1, [255, 0, 0, 255]);
    still.set(2, 2, [200, 0, 0, 255]);
    let mut pipeline = ready_pipeline().await;

    sample(&mut pipeline, 1.0, 1.0, (4, 4));
    pipeline.process_tick(&still.current_frame().expect("frame")).expect("tick");
    let p = *pipeline.predicate();
    assert_eq!(p.red, ChannelRange::new(255, 255));
    assert_eq!(p.green, ChannelRange::new(0, 0));
    assert_eq!(p.blue, ChannelRange::new(0, 0));
    assert_eq!(p.red_green, ChannelRange::new(255, 255));
    assert_eq!(p.red_blue, ChannelRange::new(255, 255));
    assert_eq!(p.green_blue, ChannelRange::new(0, 0));

    sample(&mut pipeline, 2.0, 2.0, (4, 4));
    let report = pipeline.process_tick(&still.current_frame().expect("frame")).expect("tick");
    let p = *pipeline.predicate();
    assert_eq!(p.red, ChannelRange::new(200, 255));
    assert_eq!(p.green, ChannelRange::new(0, 0));
    assert_eq!(p.blue, ChannelRange::new(0, 0));
    assert_eq!(p.red_green, ChannelRange::new(200, 255));
    assert_eq!(p.red_blue, ChannelRange::new(200, 255));
    assert_eq!(p.green_blue, ChannelRange::new(0, 0));
    assert_eq!(report.matched_pixels, 2);
}

#[tokio::test]
async fn no_faces_leaves_the_overlay_where_it_was() {
    let mut pipeline = ready_pipeline().await;

    let mut lit = Still::filled(8, 8, [0, 0, 0, 255]);
    lit.set(3, 5, [255, 255, 255, 255]);
    let first = pipeline.process_tick(&lit.current_frame().expect("frame")).expect("tick");
    assert_eq!(first.overlay_offset, Some(OverlayOffset { tx: 3, ty: 35 }));

    let mut dark = Still::filled(8, 8, [0, 0, 0, 255]);
    let second = pipeline.process_tick(&dark.current_frame().expect("frame")).expect("tick");
    assert!(second.detections.is_empty());
    assert_eq!(second.overlay_offset, Some(OverlayOffset { tx: 3, ty: 35 }));
}

#[tokio::test]
async fn a_bad_model_disables_faces_but_not_color() {
    let config = PipelineConfig {
        models: vec![ModelSpec::new("face", "face.xml"), ModelSpec::new("eye", "eye.bin")],
        ..PipelineConfig::default()
    };
    let tracker =
        FaceTracker::load(&DiskLoader, &config.models, config.detection, config.overlay_base_offset_y).await;
    assert!(!tracker.is_ready());
    let mut pipeline = VisionPipeline::new(config, tracker);

    let mut still = Still::filled(4, 4, [255, 255, 255, 255]);
    sample(&mut pipeline, 0.0, 0.0, (4, 4));
    let report = pipeline.process_tick(&still.current_frame().expect("frame")).expect("tick");
    assert!(report.detections.is_empty());
    assert_eq!(report.overlay_offset, None);
    assert_eq!(report.matched_pixels, 16);
}

#[tokio::test]
async fn a_zero_sized_frame_costs_one_tick() {
    struct Flaky {
        calls: u32,
        good: Still,
    }

    impl FrameSource for Flaky {
        fn current_frame(&mut self) -> Option<Frame<'_>> {
            self.calls += 1;
            if self.calls == 1 {
                Some(Frame::new(0, 0, &[]))
            } else {
                self.good.current_frame()
            }
        }

        fn devices(&self) -> Vec<DeviceInfo> {
            self.good.devices()
        }

        fn select_device(&mut self, index: usize) -> Result<()> {
            self.good.select_device(index)
        }
    }

    let mut source = Flaky { calls: 0, good: Still::filled(2, 2, [9, 9, 9, 255]) };
    let mut pipeline = ready_pipeline().await;
    let mut surface = Surface::default();
    let (mut render_loop, _control) = RenderLoop::new(Duration::from_millis(16));

    assert_eq!(render_loop.tick(&mut source, &mut pipeline, &mut surface), TickOutcome::Failed);
    assert!(surface.last.is_none());
    assert_eq!(render_loop.tick(&mut source, &mut pipeline, &mut surface), TickOutcome::Rendered);
    assert_eq!(surface.last.as_ref().map(|r| r.output.dimensions()), Some((2, 2)));
}

#[test]
fn reset_render_is_the_identity_for_any_frame() {
    for (w, h) in [(1u32, 1u32), (3, 2), (16, 9)] {
        let data: Vec<u8> = (0..w * h * 4).map(|i| (i * 37 % 256) as u8).collect();
        let frame = Frame::new(w, h, &data);
        let rendered =
            mask_engine::render(&frame, &ColorPredicate::reset(), MaskOptions::default(), CompositeOptions::default())
                .expect("render");
        assert_eq!(rendered.image.as_raw(), &data);
    }
}

#[test]
fn device_selection_goes_through_the_capability() {
    let mut still = Still::filled(1, 1, [0, 0, 0, 255]);
    assert_eq!(still.devices().len(), 1);
    assert!(still.select_device(0).is_ok());
    assert!(still.select_device(3).is_err());
    assert_eq!(still.current_frame().and_then(|f| f.pixel_at(0, 0)), Some(Pixel::rgb(0, 0, 0)));
}

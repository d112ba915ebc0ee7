// Live preview driver: camera in, highlighted picture out. Drag with the left
// mouse button to teach the predicate a color. `q` or ESC quits.
//
// Usage: visual_tester [camera_index] [config.toml]

mod camera;
mod cascade;
mod surface;

use anyhow::{Context, Result};
use blob_vision::{FaceTracker, FrameSource, PipelineConfig, PointerEvent, RenderLoop, SurfaceRect, VisionPipeline};
use camera::OpenCvCamera;
use cascade::HaarCascadeLoader;
use log::info;
use opencv::highgui;
use std::env;
use std::sync::{Arc, Mutex};
use surface::{HighGuiSurface, SharedFrameSize};

const WINDOW: &str = "blob_vision";

fn pointer_event(event: i32, x: i32, y: i32, frame_size: &SharedFrameSize) -> Vec<PointerEvent> {
    let (width, height) = frame_size.lock().map(|size| *size).unwrap_or((0, 0));
    let surface = SurfaceRect::from_size(width as f64, height as f64);
    let at = PointerEvent::Move { device_x: x as f64, device_y: y as f64, surface };
    match event {
        highgui::EVENT_LBUTTONDOWN => vec![PointerEvent::Down, at],
        highgui::EVENT_MOUSEMOVE => vec![at],
        highgui::EVENT_LBUTTONUP => vec![PointerEvent::Up],
        _ => Vec::new(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let device_index: usize = match args.get(1) {
        Some(arg) => arg.parse().with_context(|| format!("camera index must be a number, got '{arg}'"))?,
        None => 0,
    };
    let config = match args.get(2) {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    let mut camera = OpenCvCamera::open(device_index).context("cannot open camera")?;
    for device in camera.devices() {
        info!("found device {}: {}", device.index, device.label);
    }
    info!("using camera {}", camera.device_index());

    let tracker = if config.track_faces {
        FaceTracker::load(&HaarCascadeLoader, &config.models, config.detection, config.overlay_base_offset_y).await
    } else {
        FaceTracker::unloaded(config.detection, config.overlay_base_offset_y)
    };
    let (render_loop, control) = RenderLoop::new(config.tick_interval());
    let mirrored = config.mirrored;
    let mut pipeline = VisionPipeline::new(config, tracker);

    highgui::named_window(WINDOW, highgui::WINDOW_AUTOSIZE)?;
    let frame_size: SharedFrameSize = Arc::new(Mutex::new((0, 0)));
    let mouse_size = frame_size.clone();
    let mouse_control = control.clone();
    highgui::set_mouse_callback(
        WINDOW,
        Some(Box::new(move |event, x, y, _flags| {
            for pointer in pointer_event(event, x, y, &mouse_size) {
                mouse_control.send_pointer(pointer);
            }
        })),
    )?;

    let mut surface = HighGuiSurface::new(WINDOW, mirrored, frame_size, control);
    let stats = render_loop.run(&mut camera, &mut pipeline, &mut surface).await;
    highgui::destroy_all_windows()?;

    println!("{} frame(s) rendered, {} skipped, {} failed", stats.rendered, stats.skipped, stats.failed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_down_starts_a_drag_at_the_cursor() {
        let size: SharedFrameSize = Arc::new(Mutex::new((640, 480)));
        let events = pointer_event(highgui::EVENT_LBUTTONDOWN, 10, 20, &size);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PointerEvent::Down));
        assert!(matches!(
            events[1],
            PointerEvent::Move { device_x, device_y, surface } if device_x == 10.0 && device_y == 20.0 && surface.right == 640.0
        ));
    }

    #[test]
    fn other_buttons_are_ignored() {
        let size: SharedFrameSize = Arc::new(Mutex::new((640, 480)));
        assert!(pointer_event(highgui::EVENT_RBUTTONDOWN, 1, 1, &size).is_empty());
        assert!(matches!(pointer_event(highgui::EVENT_LBUTTONUP, 1, 1, &size)[..], [PointerEvent::Up]));
    }
}

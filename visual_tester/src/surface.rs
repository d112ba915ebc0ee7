// THEORY:
// A HighGUI window as a `DisplaySurface`. Detections and the overlay anchor are
// drawn in buffer coordinates first, then the whole picture is flipped when the
// preview is mirrored, so pointer input and overlays agree with what is on screen.

use blob_vision::{DisplaySurface, LoopControl, OverlayOffset, TickReport};
use log::warn;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    highgui, imgproc,
    prelude::*,
};
use std::sync::{Arc, Mutex};

const ESC: i32 = 27;

/// Size of the last presented frame, read by the mouse callback.
pub type SharedFrameSize = Arc<Mutex<(u32, u32)>>;

pub struct HighGuiSurface {
    window: String,
    mirrored: bool,
    frame_size: SharedFrameSize,
    control: LoopControl,
    rgba: Mat,
    bgr: Mat,
    shown: Mat,
}

impl HighGuiSurface {
    pub fn new(window: impl Into<String>, mirrored: bool, frame_size: SharedFrameSize, control: LoopControl) -> Self {
        Self {
            window: window.into(),
            mirrored,
            frame_size,
            control,
            rgba: Mat::default(),
            bgr: Mat::default(),
            shown: Mat::default(),
        }
    }

    fn draw(&mut self, report: &TickReport) -> opencv::Result<()> {
        let (width, height) = report.output.dimensions();
        if self.rgba.cols() != width as i32 || self.rgba.rows() != height as i32 {
            self.rgba = Mat::new_rows_cols_with_default(height as i32, width as i32, core::CV_8UC4, Scalar::all(0.0))?;
        }
        self.rgba.data_bytes_mut()?.copy_from_slice(report.output.as_raw());
        imgproc::cvt_color(&self.rgba, &mut self.bgr, imgproc::COLOR_RGBA2BGR, 0)?;

        for face in &report.detections {
            let rect = Rect::new(face.x, face.y, face.width, face.height);
            imgproc::rectangle(&mut self.bgr, rect, Scalar::new(0.0, 255.0, 0.0, 0.0), 2, imgproc::LINE_8, 0)?;
        }
        if let Some(offset) = report.overlay_offset {
            draw_anchor(&mut self.bgr, offset)?;
        }

        if self.mirrored {
            core::flip(&self.bgr, &mut self.shown, 1)?;
            highgui::imshow(&self.window, &self.shown)?;
        } else {
            highgui::imshow(&self.window, &self.bgr)?;
        }

        if let Ok(mut size) = self.frame_size.lock() {
            *size = (width, height);
        }
        Ok(())
    }
}

fn draw_anchor(image: &mut Mat, offset: OverlayOffset) -> opencv::Result<()> {
    let center = Point::new(offset.tx, offset.ty);
    imgproc::circle(image, center, 6, Scalar::new(255.0, 255.0, 255.0, 0.0), -1, imgproc::LINE_AA, 0)?;
    imgproc::circle(image, center, 3, Scalar::new(0.0, 0.0, 0.0, 0.0), -1, imgproc::LINE_AA, 0)?;
    Ok(())
}

impl DisplaySurface for HighGuiSurface {
    fn present(&mut self, report: &TickReport) {
        if let Err(e) = self.draw(report) {
            warn!("present failed on tick {}: {e}", report.tick);
        }
        match highgui::poll_key() {
            Ok(key) if key == ESC || key == 'q' as i32 => self.control.stop(),
            Ok(_) => {}
            Err(e) => warn!("key poll failed: {e}"),
        }
    }
}

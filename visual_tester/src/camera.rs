// THEORY:
// The OpenCV side of the `FrameSource` capability. It owns the capture device and
// two scratch `Mat`s; each call reads one BGR frame, converts it to RGBA in place,
// and lends the result out as a `Frame` until the next call. Frames are always in
// sensor orientation. Mirroring is a display concern handled by the surface.

use blob_vision::{DeviceInfo, Frame, FrameSource, VisionError};
use log::{debug, info, warn};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

/// How many device indices to probe when listing cameras.
const MAX_PROBED_DEVICES: i32 = 4;

pub struct OpenCvCamera {
    capture: VideoCapture,
    device_index: usize,
    devices: Vec<DeviceInfo>,
    bgr: Mat,
    rgba: Mat,
}

impl OpenCvCamera {
    pub fn open(device_index: usize) -> opencv::Result<Self> {
        let devices = probe_devices();
        let capture = VideoCapture::new(device_index as i32, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            warn!("camera {device_index} did not open; frames will be unavailable");
        } else {
            info!(
                "camera {device_index} opened at {}x{}",
                capture.get(videoio::CAP_PROP_FRAME_WIDTH)?,
                capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?
            );
        }
        Ok(Self {
            capture,
            device_index,
            devices,
            bgr: Mat::default(),
            rgba: Mat::default(),
        })
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    fn grab(&mut self) -> opencv::Result<bool> {
        if !self.capture.read(&mut self.bgr)? || self.bgr.empty() {
            return Ok(false);
        }
        imgproc::cvt_color(&self.bgr, &mut self.rgba, imgproc::COLOR_BGR2RGBA, 0)?;
        Ok(true)
    }
}

fn probe_devices() -> Vec<DeviceInfo> {
    (0..MAX_PROBED_DEVICES)
        .filter_map(|index| {
            let capture = VideoCapture::new(index, videoio::CAP_ANY).ok()?;
            capture.is_opened().ok()?.then(|| DeviceInfo { index: index as usize, label: format!("camera {index}") })
        })
        .collect()
}

impl FrameSource for OpenCvCamera {
    fn current_frame(&mut self) -> Option<Frame<'_>> {
        match self.grab() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                debug!("frame grab failed: {e}");
                return None;
            }
        }
        let width = self.rgba.cols() as u32;
        let height = self.rgba.rows() as u32;
        let data = self.rgba.data_bytes().ok()?;
        Some(Frame::new(width, height, data))
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn select_device(&mut self, index: usize) -> blob_vision::Result<()> {
        let capture = VideoCapture::new(index as i32, videoio::CAP_ANY)
            .map_err(|e| VisionError::Config(format!("cannot open camera {index}: {e}")))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(VisionError::Config(format!("camera {index} is not available")));
        }
        self.capture = capture;
        self.device_index = index;
        info!("switched to camera {index}");
        Ok(())
    }
}

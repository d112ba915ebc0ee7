// THEORY:
// A `Frame` is a borrowed view over one RGBA buffer for exactly one tick. The
// engine never owns or retains camera memory: the source hands out a view, the
// tick reads it, and the borrow ends with the tick.
//
// Key architectural principles:
// 1.  **Borrowed, Not Owned**: `Frame<'a>` wraps `&'a [u8]`. Anything that must
//     outlive the tick (the composited output) is copied into an owned image.
// 2.  **Validate Once**: Dimension and length checks happen in `validate`, at the
//     top of each tick. The per-pixel loops downstream can then index freely.
// 3.  **Stride Aware**: Rows may be padded. Whole-frame operations walk rows; the
//     single-pixel lookup used by calibration only accepts packed buffers.
// 4.  **Narrow Capability**: `FrameSource` is everything the engine may ask of a
//     camera: the current frame and device selection, never the device itself.

use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::error::{Result, VisionError};
use image::{GrayImage, RgbaImage};

/// A borrowed, row-major RGBA8 buffer.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes from the start of one row to the start of the next.
    pub stride: usize,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// A packed frame (`stride == width * 4`).
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self::with_stride(width, height, width as usize * CHANNELS, data)
    }

    pub fn with_stride(width: u32, height: u32, stride: usize, data: &'a [u8]) -> Self {
        Self { width, height, stride, data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * CHANNELS
    }

    pub fn is_contiguous(&self) -> bool {
        self.stride == self.row_bytes()
    }

    /// Checks that the view describes a non-empty, fully backed buffer.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VisionError::EmptyFrame { width: self.width, height: self.height });
        }
        if self.stride < self.row_bytes() {
            return Err(VisionError::InvalidStride { stride: self.stride, width: self.width });
        }
        let expected = self
            .stride
            .checked_mul(self.height as usize - 1)
            .and_then(|padded| padded.checked_add(self.row_bytes()))
            .ok_or(VisionError::InvalidStride { stride: self.stride, width: self.width })?;
        if self.data.len() < expected {
            return Err(VisionError::BufferTooSmall { expected, actual: self.data.len() });
        }
        Ok(())
    }

    /// Reads one pixel of a packed frame.
    ///
    /// Returns `None` outside `[0,width) x [0,height)`, for strided buffers, and
    /// when the backing slice is too short.
    pub fn pixel_at(&self, x: i64, y: i64) -> Option<Pixel> {
        if !self.is_contiguous() {
            return None;
        }
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let bytes = self.data.get(start..start + CHANNELS)?;
        Pixel::try_from(bytes).ok()
    }

    /// Iterates the visible bytes of each row, skipping any stride padding.
    /// Call `validate` first; rows past the end of the buffer are not yielded.
    pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        let row_bytes = self.row_bytes();
        let data = self.data;
        let stride = self.stride.max(1);
        (0..self.height as usize).filter_map(move |row| {
            let start = row.checked_mul(stride)?;
            data.get(start..start.checked_add(row_bytes)?)
        })
    }

    /// Packed owned copy of the frame.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        self.validate()?;
        let mut packed = Vec::with_capacity(self.row_bytes() * self.height as usize);
        for row in self.rows() {
            packed.extend_from_slice(row);
        }
        let actual = packed.len();
        RgbaImage::from_raw(self.width, self.height, packed)
            .ok_or(VisionError::BufferTooSmall { expected: self.row_bytes() * self.height as usize, actual })
    }

    /// Single-channel Rec. 601 downconvert, the input a cascade classifier expects.
    pub fn grayscale(&self) -> Result<GrayImage> {
        self.validate()?;
        let mut gray = Vec::with_capacity(self.width as usize * self.height as usize);
        for row in self.rows() {
            gray.extend(row.chunks_exact(CHANNELS).filter_map(|px| Pixel::try_from(px).ok()).map(|p| p.gray()));
        }
        let actual = gray.len();
        GrayImage::from_raw(self.width, self.height, gray)
            .ok_or(VisionError::BufferTooSmall { expected: self.width as usize * self.height as usize, actual })
    }
}

impl<'a> From<&'a RgbaImage> for Frame<'a> {
    fn from(image: &'a RgbaImage) -> Self {
        Frame::new(image.width(), image.height(), image.as_raw())
    }
}

/// A capture device as listed by a frame source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub label: String,
}

/// The narrow camera capability the render loop is given.
pub trait FrameSource {
    /// The newest frame, or `None` when the camera is not ready yet.
    fn current_frame(&mut self) -> Option<Frame<'_>>;

    /// Video input devices available to `select_device`.
    fn devices(&self) -> Vec<DeviceInfo>;

    fn select_device(&mut self, index: usize) -> Result<()>;
}

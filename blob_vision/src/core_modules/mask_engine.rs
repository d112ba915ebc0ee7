// THEORY:
// The `MaskEngine` turns a frame and a `ColorPredicate` into something a person
// can look at: every matching pixel is painted in a solid highlight color, every
// other pixel is shown as it was (or dimmed, to make the highlight pop).
//
// Key architectural principles:
// 1.  **Pointwise Classification**: `compute_mask` decides each pixel from that
//     pixel and the predicate alone. No neighbourhood, no history.
// 2.  **Separate Stages**: Classification (`compute_mask`) and painting
//     (`composite`) are independent so either can be reused, e.g. counting matches
//     without producing an image.
// 3.  **Identity Fast Path**: A predicate at reset matches everything. Masking and
//     then painting "everything" is pointless work, so `compute_mask` returns an
//     identity mask without visiting a pixel, and `composite` turns that mask into
//     a plain copy of the source. Both entry points honour it.
// 4.  **Call-Scoped Buffers**: The mask and the output image are owned values
//     created inside one call. Nothing is cached between ticks, so memory per tick
//     is bounded by the frame size.

use crate::core_modules::color_predicate::ColorPredicate;
use crate::core_modules::frame::Frame;
use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::error::{Result, VisionError};
use image::{RgbImage, RgbaImage};

/// One boolean per pixel, row-major.
///
/// An identity mask comes from a predicate at reset. It carries no per-pixel
/// decisions and composites to an unmodified copy of the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    identity: bool,
    bits: Vec<bool>,
}

impl Mask {
    fn identity(width: u32, height: u32) -> Self {
        Self { width, height, identity: true, bits: Vec::new() }
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// `None` outside the mask, and everywhere on an identity mask.
    pub fn get(&self, x: u32, y: u32) -> Option<bool> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.bits.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Pixels that will be painted with the highlight. Zero for an identity mask.
    pub fn matched_count(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskOptions {
    /// Also require the signed channel differences to be in range.
    pub use_derived_channels: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self { use_derived_channels: true }
    }
}

/// What happens to pixels outside the mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnmatchedStyle {
    PassThrough,
    /// Multiply RGB by this factor (alpha untouched).
    Dim(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeOptions {
    pub highlight: Pixel,
    pub unmatched: UnmatchedStyle,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self { highlight: Pixel::rgb(255, 0, 0), unmatched: UnmatchedStyle::PassThrough }
    }
}

/// A composited frame and how many pixels were highlighted in it.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub image: RgbaImage,
    pub matched_pixels: usize,
    /// The predicate was at reset and the source was copied through.
    pub identity: bool,
}

pub mod mask_engine {
    use super::*;

    /// Classifies every pixel of `frame` against `predicate`.
    ///
    /// A predicate at reset yields an identity mask without per-pixel work.
    pub fn compute_mask(frame: &Frame<'_>, predicate: &ColorPredicate, options: MaskOptions) -> Result<Mask> {
        frame.validate()?;
        if predicate.is_at_reset() {
            return Ok(Mask::identity(frame.width, frame.height));
        }

        let mut bits = Vec::with_capacity(frame.width as usize * frame.height as usize);
        for row in frame.rows() {
            for bytes in row.chunks_exact(CHANNELS) {
                let pixel = Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3]);
                bits.push(predicate.contains(&pixel, options.use_derived_channels));
            }
        }

        Ok(Mask { width: frame.width, height: frame.height, identity: false, bits })
    }

    /// Paints matched pixels with the highlight color, or copies the frame
    /// through unchanged for an identity mask.
    pub fn composite(frame: &Frame<'_>, mask: &Mask, options: CompositeOptions) -> Result<RgbaImage> {
        frame.validate()?;
        if mask.width != frame.width || mask.height != frame.height {
            return Err(VisionError::MaskMismatch {
                mask_width: mask.width,
                mask_height: mask.height,
                frame_width: frame.width,
                frame_height: frame.height,
            });
        }
        if mask.identity {
            return frame.to_rgba_image();
        }

        let highlight = options.highlight.to_bytes();
        let mut out = Vec::with_capacity(mask.bits.len() * CHANNELS);
        let mut matched = mask.bits.iter();

        for row in frame.rows() {
            for (bytes, &hit) in row.chunks_exact(CHANNELS).zip(&mut matched) {
                if hit {
                    out.extend_from_slice(&highlight);
                    continue;
                }
                match options.unmatched {
                    UnmatchedStyle::PassThrough => out.extend_from_slice(bytes),
                    UnmatchedStyle::Dim(factor) => {
                        out.extend(bytes[..3].iter().map(|&c| scale_channel(c, factor)));
                        out.push(bytes[3]);
                    }
                }
            }
        }

        let actual = out.len();
        RgbaImage::from_raw(frame.width, frame.height, out).ok_or(VisionError::BufferTooSmall {
            expected: mask.bits.len() * CHANNELS,
            actual,
        })
    }

    /// `composite(frame, compute_mask(frame, predicate))` in one call.
    pub fn render(
        frame: &Frame<'_>,
        predicate: &ColorPredicate,
        mask_options: MaskOptions,
        composite_options: CompositeOptions,
    ) -> Result<Rendered> {
        let mask = compute_mask(frame, predicate, mask_options)?;
        let image = composite(frame, &mask, composite_options)?;
        Ok(Rendered { image, matched_pixels: mask.matched_count(), identity: mask.is_identity() })
    }

    /// Multiplies RGB by alpha and drops the alpha channel.
    pub fn premultiply_alpha(frame: &Frame<'_>) -> Result<RgbImage> {
        frame.validate()?;

        let mut out = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
        for row in frame.rows() {
            for bytes in row.chunks_exact(CHANNELS) {
                let alpha = bytes[3] as f32 / 255.0;
                out.extend(bytes[..3].iter().map(|&c| scale_channel(c, alpha)));
            }
        }

        let actual = out.len();
        RgbImage::from_raw(frame.width, frame.height, out).ok_or(VisionError::BufferTooSmall {
            expected: frame.width as usize * frame.height as usize * 3,
            actual,
        })
    }

    #[inline]
    fn scale_channel(value: u8, factor: f32) -> u8 {
        (value as f32 * factor).round().clamp(0.0, 255.0) as u8
    }
}

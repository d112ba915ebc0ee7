// THEORY:
// The `PointSampler` is the bridge between a person dragging across the preview
// and the calibration algorithm. Input arrives in device space, at whatever rate
// the display delivers it; calibration happens once per tick, against the frame
// being processed in that tick.
//
// Key architectural principles:
// 1.  **Map Per Event**: The on-screen surface can be resized at any moment, so the
//     device-to-buffer mapping is recomputed from the rectangle delivered with each
//     event. Scaling is assumed uniform between the surface and the buffer.
// 2.  **Queue, Then Drain**: Samples accumulate FIFO between ticks. The tick drains
//     them in arrival order *before* masking, so the Nth sample sees the predicate
//     already extended by samples 1..N-1 and the mask reflects all of them.
// 3.  **Discard Quietly**: A sample that lands outside the buffer (or on a frame
//     whose layout we cannot index) is dropped without touching the predicate.

use crate::core_modules::color_predicate::{ColorPredicate, ExtendMode};
use crate::core_modules::frame::Frame;
use log::{debug, trace};
use std::collections::VecDeque;

/// A pixel position in buffer coordinates. May lie outside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSample {
    pub x: i64,
    pub y: i64,
}

/// The on-screen bounding rectangle of the display surface, in device units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        self.left <= x && x <= self.right && self.top <= y && y <= self.bottom
    }
}

/// Maps a device position onto the buffer behind `rect`.
///
/// A point inside the rectangle (edges included) always lands on a real pixel, so
/// the corners map to `(0,0)` and `(width-1,height-1)`. Points outside keep their
/// raw, out-of-range value. Returns `None` for a degenerate rectangle or buffer
/// and for non-finite coordinates.
pub fn device_to_buffer(
    device_x: f64,
    device_y: f64,
    rect: SurfaceRect,
    buffer_size: (u32, u32),
    mirrored: bool,
) -> Option<PixelSample> {
    let (width, height) = buffer_size;
    let span_x = rect.right - rect.left;
    let span_y = rect.bottom - rect.top;
    if width == 0 || height == 0 || !(span_x > 0.0 && span_y > 0.0) {
        return None;
    }
    if ![device_x, device_y, span_x, span_y, rect.left, rect.top].iter().all(|v| v.is_finite()) {
        return None;
    }

    let last_x = (width - 1) as f64;
    let last_y = (height - 1) as f64;
    let mut x = ((device_x - rect.left) / span_x * width as f64).round();
    let mut y = ((device_y - rect.top) / span_y * height as f64).round();

    if rect.contains(device_x, device_y) {
        x = x.clamp(0.0, last_x);
        y = y.clamp(0.0, last_y);
    }
    // Flip before narrowing to integers; float casts saturate.
    if mirrored {
        x = last_x - x;
    }

    Some(PixelSample { x: x as i64, y: y as i64 })
}

/// A raw pointer/touch event forwarded by the display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down,
    Move { device_x: f64, device_y: f64, surface: SurfaceRect },
    Up,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: usize,
    pub discarded: usize,
}

/// Collects drag samples between ticks.
#[derive(Debug, Default)]
pub struct PointSampler {
    dragging: bool,
    /// The surface shows a horizontally mirrored image of the buffer.
    mirrored: bool,
    pending: VecDeque<PixelSample>,
}

impl PointSampler {
    pub fn new(mirrored: bool) -> Self {
        Self { dragging: false, mirrored, pending: VecDeque::new() }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn on_drag_start(&mut self) {
        self.dragging = true;
    }

    /// Queues the sample under the pointer. Ignored unless a drag is in progress.
    pub fn on_drag_move(
        &mut self,
        device_x: f64,
        device_y: f64,
        rect: SurfaceRect,
        buffer_size: (u32, u32),
    ) -> Option<PixelSample> {
        if !self.dragging {
            return None;
        }
        let sample = device_to_buffer(device_x, device_y, rect, buffer_size, self.mirrored)?;
        trace!("queued sample ({}, {}) from device ({device_x:.1}, {device_y:.1})", sample.x, sample.y);
        self.pending.push_back(sample);
        Some(sample)
    }

    pub fn on_drag_end(&mut self) {
        self.dragging = false;
    }

    /// Dispatches a forwarded pointer event to the matching drag handler.
    pub fn handle(&mut self, event: PointerEvent, buffer_size: (u32, u32)) {
        match event {
            PointerEvent::Down => self.on_drag_start(),
            PointerEvent::Move { device_x, device_y, surface } => {
                self.on_drag_move(device_x, device_y, surface, buffer_size);
            }
            PointerEvent::Up => self.on_drag_end(),
        }
    }

    /// Feeds every queued sample, oldest first, into `predicate`.
    pub fn drain_into(&mut self, frame: &Frame<'_>, predicate: &mut ColorPredicate) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(sample) = self.pending.pop_front() {
            match frame.pixel_at(sample.x, sample.y) {
                Some(pixel) => {
                    if predicate.extend(&pixel) == ExtendMode::Seeded {
                        debug!("predicate seeded from sample ({}, {}): {:?}", sample.x, sample.y, pixel);
                    }
                    report.applied += 1;
                }
                None => report.discarded += 1,
            }
        }

        if report.discarded > 0 {
            debug!("discarded {} sample(s) outside the {}x{} frame", report.discarded, frame.width, frame.height);
        }
        report
    }
}

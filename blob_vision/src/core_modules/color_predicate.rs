// THEORY:
// The `ColorPredicate` is the calibrated definition of "the color we are looking
// for." It is a box in a six-dimensional space: an inclusive range on each of the
// three primary channels, and an inclusive range on each signed pairwise channel
// difference. A pixel matches when it falls inside the box.
//
// Key architectural principles:
// 1.  **Match-All Default**: A fresh (reset) predicate spans every domain, so it
//     matches every pixel. This is the state a calibration session starts in.
// 2.  **Two-Mode Extension**: The first sample after a reset *defines* a new,
//     minimal predicate (every range collapses onto the sample). Every later
//     sample only *widens* ranges. Without the first mode a sample would have no
//     effect at all, since it already lies inside the match-all box.
// 3.  **Mode From Value**: Which mode applies is decided by `is_at_reset`, a pure
//     function of the current bounds. There is no hidden "calibrating" flag.
//     `is_at_reset` inspects the primary channels only; a predicate whose primary
//     ranges are default but whose derived ranges were narrowed still counts as
//     reset, and the next sample overwrites it.
// 4.  **Never Invalid**: Every mutation clamps into the channel domain and keeps
//     `min <= max`. Rapid slider input cannot produce an error.

use crate::core_modules::pixel::pixel::{Color, Pixel};

/// An inclusive `[min, max]` range over one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    pub min: Color,
    pub max: Color,
}

pub const PRIMARY_DOMAIN: ChannelRange = ChannelRange { min: 0, max: 255 };
pub const DERIVED_DOMAIN: ChannelRange = ChannelRange { min: -255, max: 255 };

impl ChannelRange {
    pub const fn new(min: Color, max: Color) -> Self {
        Self { min, max }
    }

    pub const fn singleton(value: Color) -> Self {
        Self { min: value, max: value }
    }

    #[inline]
    pub fn contains(&self, value: Color) -> bool {
        self.min <= value && value <= self.max
    }

    /// Grows the range to include `value`. Never narrows.
    pub fn widen(&mut self, value: Color) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn clamp_into(value: Color, domain: ChannelRange) -> Color {
        value.clamp(domain.min, domain.max)
    }
}

/// The six dimensions a predicate constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateChannel {
    Red,
    Green,
    Blue,
    RedGreen,
    RedBlue,
    GreenBlue,
}

impl PredicateChannel {
    pub const ALL: [PredicateChannel; 6] = [
        PredicateChannel::Red,
        PredicateChannel::Green,
        PredicateChannel::Blue,
        PredicateChannel::RedGreen,
        PredicateChannel::RedBlue,
        PredicateChannel::GreenBlue,
    ];

    pub fn is_derived(self) -> bool {
        matches!(self, Self::RedGreen | Self::RedBlue | Self::GreenBlue)
    }

    pub fn domain(self) -> ChannelRange {
        if self.is_derived() { DERIVED_DOMAIN } else { PRIMARY_DOMAIN }
    }

    /// This channel's value for `pixel`.
    pub fn value_of(self, pixel: &Pixel) -> Color {
        match self {
            Self::Red => pixel.red as Color,
            Self::Green => pixel.green as Color,
            Self::Blue => pixel.blue as Color,
            Self::RedGreen => pixel.red_green(),
            Self::RedBlue => pixel.red_blue(),
            Self::GreenBlue => pixel.green_blue(),
        }
    }
}

/// A direct edit of one channel's bounds. Fields left `None` are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsUpdate {
    pub channel: PredicateChannel,
    pub min: Option<Color>,
    pub max: Option<Color>,
}

impl BoundsUpdate {
    pub fn min(channel: PredicateChannel, min: Color) -> Self {
        Self { channel, min: Some(min), max: None }
    }

    pub fn max(channel: PredicateChannel, max: Color) -> Self {
        Self { channel, min: None, max: Some(max) }
    }

    pub fn range(channel: PredicateChannel, min: Color, max: Color) -> Self {
        Self { channel, min: Some(min), max: Some(max) }
    }
}

/// Which branch `ColorPredicate::extend` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendMode {
    /// The predicate was at reset and was replaced by singleton ranges.
    Seeded,
    /// Existing ranges were widened.
    Widened,
}

/// Inclusive ranges over the primary channels and their signed differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPredicate {
    pub red: ChannelRange,
    pub green: ChannelRange,
    pub blue: ChannelRange,
    pub red_green: ChannelRange,
    pub red_blue: ChannelRange,
    pub green_blue: ChannelRange,
}

impl Default for ColorPredicate {
    fn default() -> Self {
        Self::reset()
    }
}

impl ColorPredicate {
    /// The match-all predicate.
    pub fn reset() -> Self {
        Self {
            red: PRIMARY_DOMAIN,
            green: PRIMARY_DOMAIN,
            blue: PRIMARY_DOMAIN,
            red_green: DERIVED_DOMAIN,
            red_blue: DERIVED_DOMAIN,
            green_blue: DERIVED_DOMAIN,
        }
    }

    /// True when every primary range equals its default. Derived ranges are not consulted.
    pub fn is_at_reset(&self) -> bool {
        self.red == PRIMARY_DOMAIN && self.green == PRIMARY_DOMAIN && self.blue == PRIMARY_DOMAIN
    }

    pub fn range(&self, channel: PredicateChannel) -> ChannelRange {
        match channel {
            PredicateChannel::Red => self.red,
            PredicateChannel::Green => self.green,
            PredicateChannel::Blue => self.blue,
            PredicateChannel::RedGreen => self.red_green,
            PredicateChannel::RedBlue => self.red_blue,
            PredicateChannel::GreenBlue => self.green_blue,
        }
    }

    fn range_mut(&mut self, channel: PredicateChannel) -> &mut ChannelRange {
        match channel {
            PredicateChannel::Red => &mut self.red,
            PredicateChannel::Green => &mut self.green,
            PredicateChannel::Blue => &mut self.blue,
            PredicateChannel::RedGreen => &mut self.red_green,
            PredicateChannel::RedBlue => &mut self.red_blue,
            PredicateChannel::GreenBlue => &mut self.green_blue,
        }
    }

    /// Merges slider edits into the predicate.
    ///
    /// Values are clamped into the channel domain. An edit that would cross the
    /// opposite bound is pulled back onto it; when both bounds are supplied
    /// crossed, `min` collapses onto `max`.
    pub fn set_bounds(&mut self, updates: &[BoundsUpdate]) {
        for update in updates {
            let domain = update.channel.domain();
            let range = self.range_mut(update.channel);
            let mut next = *range;

            if let Some(max) = update.max {
                next.max = ChannelRange::clamp_into(max, domain);
            }
            if let Some(min) = update.min {
                next.min = ChannelRange::clamp_into(min, domain);
            }
            if next.min > next.max {
                if update.min.is_some() {
                    next.min = next.max;
                } else {
                    next.max = next.min;
                }
            }
            *range = next;
        }
    }

    /// Folds one sampled pixel into the predicate.
    pub fn extend(&mut self, pixel: &Pixel) -> ExtendMode {
        if self.is_at_reset() {
            for channel in PredicateChannel::ALL {
                *self.range_mut(channel) = ChannelRange::singleton(channel.value_of(pixel));
            }
            ExtendMode::Seeded
        } else {
            for channel in PredicateChannel::ALL {
                let value = channel.value_of(pixel);
                self.range_mut(channel).widen(value);
            }
            ExtendMode::Widened
        }
    }

    /// Per-pixel match test. Derived ranges are only consulted when asked for.
    #[inline]
    pub fn contains(&self, pixel: &Pixel, use_derived_channels: bool) -> bool {
        let primary = self.red.contains(pixel.red as Color)
            && self.green.contains(pixel.green as Color)
            && self.blue.contains(pixel.blue as Color);
        if !primary || !use_derived_channels {
            return primary;
        }
        self.red_green.contains(pixel.red_green())
            && self.red_blue.contains(pixel.red_blue())
            && self.green_blue.contains(pixel.green_blue())
    }
}

// THEORY:
// The `Pixel` module is the most fundamental unit of the vision system. It is a
// "dumb" data container for a single RGBA pixel plus the handful of single-pixel
// quantities the rest of the engine needs. Nothing in here looks at neighbours or
// at other frames.
//
// Key architectural principles:
// 1.  **Data Purity**: It holds the raw `u8` channel values without interpretation.
// 2.  **Derived Channels**: The signed pairwise differences (`red - green`,
//     `red - blue`, `green - blue`) are the extra discriminating dimensions used by
//     color predicates. They live here because they depend on this pixel alone.
// 3.  **Luminance**: Rec. 601 luma, the same weighting a cascade classifier's
//     grayscale input is traditionally built with.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    /// A signed channel difference in `[-255, 255]`.
    pub type Color = i16;
    pub type Luminance = f64;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel { red, green, blue, alpha }
        }

        /// An opaque pixel.
        pub fn rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel::new(red, green, blue, 255)
        }

        pub fn red_green(&self) -> Color {
            self.red as Color - self.green as Color
        }

        pub fn red_blue(&self) -> Color {
            self.red as Color - self.blue as Color
        }

        pub fn green_blue(&self) -> Color {
            self.green as Color - self.blue as Color
        }

        /// Luminance estimate (Rec. 601 luma).
        pub fn luminance(&self) -> Luminance {
            0.299_f64 * self.red as f64 + 0.587_f64 * self.green as f64 + 0.114_f64 * self.blue as f64
        }

        /// Luma rounded into a single gray byte.
        pub fn gray(&self) -> Byte {
            self.luminance().round().clamp(0.0, 255.0) as Byte
        }

        pub fn to_bytes(self) -> [Byte; CHANNELS] {
            [self.red, self.green, self.blue, self.alpha]
        }
    }

    impl TryFrom<&[Byte]> for Pixel {
        type Error = usize;

        /// Fails with the offending length when the slice is not exactly one RGBA pixel.
        fn try_from(bytes: &[Byte]) -> Result<Self, Self::Error> {
            match bytes {
                [r, g, b, a] => Ok(Pixel::new(*r, *g, *b, *a)),
                _ => Err(bytes.len()),
            }
        }
    }

    impl From<Pixel> for image::Rgba<Byte> {
        fn from(pixel: Pixel) -> Self {
            image::Rgba(pixel.to_bytes())
        }
    }
}

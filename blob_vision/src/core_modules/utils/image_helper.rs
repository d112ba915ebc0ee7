pub mod image_helper {
    use image::error::{ImageError, ParameterError, ParameterErrorKind};
    use image::{ImageEncoder, RgbaImage};
    use std::path::Path;

    /// Writes an RGBA buffer as PNG.
    pub fn save(path: impl AsRef<Path>, width: u32, height: u32, buffer: &[u8]) -> Result<(), ImageError> {
        if buffer.len() != width as usize * height as usize * 4 {
            return Err(ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch)));
        }
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgba8)?;

        Ok(())
    }

    /// Decodes any supported still image into RGBA8.
    pub fn load(path: impl AsRef<Path>) -> Result<RgbaImage, ImageError> {
        Ok(image::open(path)?.to_rgba8())
    }
}

//! Generic raster decoding (PNG, JPEG, TIFF, BMP) into 2D images.

use std::io::Cursor;

use image::{DynamicImage, ImageReader};

use crate::data::{Image, PixelData};
use crate::error::DecodeError;

/// Decode a raster image, guessing the format from its content.
///
/// The sample type follows the decoded buffer: 8-bit, 16-bit or 32-bit float
/// samples, with one to four interleaved components.
pub fn read_raster(name: &str, bytes: &[u8]) -> Result<Image, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::unsupported(format!("{}: {}", name, e)))?;
    if reader.format().is_none() {
        return Err(DecodeError::unsupported(format!(
            "{}: unrecognized image content",
            name
        )));
    }

    let decoded = reader
        .decode()
        .map_err(|e| DecodeError::malformed("raster", e.to_string()))?;

    let size = vec![decoded.width() as usize, decoded.height() as usize];
    let (components, data) = match decoded {
        DynamicImage::ImageLuma8(buf) => (1, PixelData::UInt8(buf.into_raw())),
        DynamicImage::ImageLumaA8(buf) => (2, PixelData::UInt8(buf.into_raw())),
        DynamicImage::ImageRgb8(buf) => (3, PixelData::UInt8(buf.into_raw())),
        DynamicImage::ImageRgba8(buf) => (4, PixelData::UInt8(buf.into_raw())),
        DynamicImage::ImageLuma16(buf) => (1, PixelData::UInt16(buf.into_raw())),
        DynamicImage::ImageLumaA16(buf) => (2, PixelData::UInt16(buf.into_raw())),
        DynamicImage::ImageRgb16(buf) => (3, PixelData::UInt16(buf.into_raw())),
        DynamicImage::ImageRgba16(buf) => (4, PixelData::UInt16(buf.into_raw())),
        DynamicImage::ImageRgb32F(buf) => (3, PixelData::Float32(buf.into_raw())),
        DynamicImage::ImageRgba32F(buf) => (4, PixelData::Float32(buf.into_raw())),
        other => (4, PixelData::UInt8(other.to_rgba8().into_raw())),
    };

    Ok(Image::new(name, size, components, data))
}

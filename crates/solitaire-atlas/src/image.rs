use std::io::Cursor;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use crate::error::{AtlasError, Result};

/// A decoded sprite sheet: tightly packed, row-major, 8 bits per channel.
///
/// Invariant: `pixels.len() == width * height * channels`, enforced by every
/// constructor. The value is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    channels: u32,
}

impl DecodedImage {
    /// Wraps an existing pixel buffer.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, channels: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AtlasError::InvalidImage(format!(
                "image has zero size ({width}x{height})"
            )));
        }
        if !(1..=4).contains(&channels) {
            return Err(AtlasError::InvalidImage(format!(
                "unsupported channel count {channels}"
            )));
        }

        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(AtlasError::InvalidImage(format!(
                "buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                pixels.len()
            )));
        }

        Ok(Self { pixels, width, height, channels })
    }

    /// Creates an image filled with a single pixel value.
    ///
    /// The channel count is the length of `pixel`.
    pub fn filled(width: u32, height: u32, pixel: &[u8]) -> Result<Self> {
        let count = width as usize * height as usize;
        let pixels = pixel.repeat(count);
        Self::new(pixels, width, height, pixel.len() as u32)
    }

    /// Decodes PNG bytes. The result is always RGBA.
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| AtlasError::Decode(e.to_string()))?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(rgba.into_raw(), width, height, 4)
    }

    /// Reads and decodes a PNG file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| AtlasError::io(path, e))?;
        let image = Self::from_png_bytes(&bytes).map_err(|e| match e {
            AtlasError::Decode(msg) => AtlasError::Decode(format!("{}: {msg}", path.display())),
            other => other,
        })?;

        log::debug!(
            "decoded {} ({}x{}, {} channels)",
            path.display(),
            image.width,
            image.height,
            image.channels
        );
        Ok(image)
    }

    /// Encodes the image as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let color = match self.channels {
            1 => ExtendedColorType::L8,
            2 => ExtendedColorType::La8,
            3 => ExtendedColorType::Rgb8,
            _ => ExtendedColorType::Rgba8,
        };

        let mut out = Cursor::new(Vec::new());
        PngEncoder::new(&mut out)
            .write_image(&self.pixels, self.width, self.height, color)
            .map_err(|e| AtlasError::Decode(format!("png encode failed: {e}")))?;
        Ok(out.into_inner())
    }

    /// Encodes the image as PNG and writes it to `path`.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes).map_err(|e| AtlasError::io(path, e))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes between the starts of two consecutive rows.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Byte offset of pixel `(x, y)`.
    #[inline]
    pub fn offset_of(&self, x: u32, y: u32) -> usize {
        y as usize * self.row_stride() + x as usize * self.channels as usize
    }

    /// The `w` pixels of row `y` starting at column `x`.
    ///
    /// Callers are expected to have bounds-checked the span; out-of-range
    /// spans panic like any slice index.
    #[inline]
    pub fn row_span(&self, x: u32, y: u32, w: u32) -> &[u8] {
        let start = self.offset_of(x, y);
        &self.pixels[start..start + w as usize * self.channels as usize]
    }

    /// Copies every row of `src` into this image with its top-left at `(x, y)`.
    ///
    /// Used by the packer; `src` must have the same channel count and fit.
    pub(crate) fn blit(&mut self, src: &DecodedImage, x: u32, y: u32) {
        debug_assert_eq!(self.channels, src.channels);
        debug_assert!(x + src.width <= self.width && y + src.height <= self.height);

        let row_bytes = src.row_stride();
        for row in 0..src.height {
            let dst = self.offset_of(x, y + row);
            let from = src.offset_of(0, row);
            self.pixels[dst..dst + row_bytes].copy_from_slice(&src.pixels[from..from + row_bytes]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        let err = DecodedImage::new(vec![0; 15], 2, 2, 4).unwrap_err();
        assert!(matches!(err, AtlasError::InvalidImage(_)));
    }

    #[test]
    fn rejects_zero_size() {
        assert!(DecodedImage::new(Vec::new(), 0, 4, 4).is_err());
    }

    #[test]
    fn rejects_bad_channel_count() {
        assert!(DecodedImage::new(vec![0; 10], 1, 2, 5).is_err());
    }

    #[test]
    fn offsets_follow_row_stride() {
        let img = DecodedImage::filled(10, 4, &[0, 0, 0, 255]).unwrap();
        assert_eq!(img.row_stride(), 40);
        assert_eq!(img.offset_of(3, 2), 2 * 40 + 3 * 4);
    }

    #[test]
    fn row_span_reads_only_the_requested_pixels() {
        let pixels: Vec<u8> = (0..24).collect();
        let img = DecodedImage::new(pixels, 4, 2, 3).unwrap();
        assert_eq!(img.row_span(1, 1, 2), &[15, 16, 17, 18, 19, 20]);
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let mut pixels = Vec::new();
        for i in 0..(3 * 2) {
            pixels.extend_from_slice(&[i * 10, i * 20, i * 30, 255]);
        }
        let img = DecodedImage::new(pixels, 3, 2, 4).unwrap();

        let decoded = DecodedImage::from_png_bytes(&img.encode_png().unwrap()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn rgb_png_decodes_to_rgba() {
        let img = DecodedImage::filled(2, 2, &[1, 2, 3]).unwrap();
        let decoded = DecodedImage::from_png_bytes(&img.encode_png().unwrap()).unwrap();
        assert_eq!(decoded.channels(), 4);
        assert_eq!(&decoded.pixels()[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = DecodedImage::from_png_bytes(b"not a png").unwrap_err();
        assert!(matches!(err, AtlasError::Decode(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = DecodedImage::open("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, AtlasError::Io { .. }));
    }
}

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder as _, ImageError, ImageReader, Limits};

use crate::decoding::domain::image_decoder::{DecodeError, ImageDecoder};
use crate::shared::constants::DEFAULT_MAX_IMAGE_PIXELS;
use crate::shared::frame::Frame;

/// Decodes any container the `image` crate recognises (JPEG, PNG, BMP,
/// TIFF, WebP, ...) by sniffing the payload, then converts to luminance.
///
/// Dimensions are read from the header and checked against `max_pixels`
/// before any pixel buffer is allocated, so a tiny payload declaring a huge
/// canvas is refused up front.
///
/// Colour images use the BT.601 weights cascade models are trained with,
/// rather than the BT.709 weights of `DynamicImage::to_luma8`.
#[derive(Clone, Copy, Debug)]
pub struct CodecImageDecoder {
    max_pixels: u64,
}

impl CodecImageDecoder {
    pub fn new() -> Self {
        Self::with_max_pixels(DEFAULT_MAX_IMAGE_PIXELS)
    }

    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self {
            max_pixels: max_pixels.max(1),
        }
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    fn limits(&self) -> Limits {
        let side = u32::try_from(self.max_pixels).unwrap_or(u32::MAX);
        let mut limits = Limits::default();
        limits.max_image_width = Some(side);
        limits.max_image_height = Some(side);
        limits
    }
}

impl Default for CodecImageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for CodecImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(ImageError::IoError)?;
        reader.limits(self.limits());
        let decoder = reader.into_decoder()?;

        let (width, height) = decoder.dimensions();
        if width as u64 * height as u64 > self.max_pixels {
            return Err(DecodeError::TooLarge {
                width,
                height,
                max_pixels: self.max_pixels,
            });
        }

        let img = DynamicImage::from_decoder(decoder)?;
        Ok(to_luminance(img))
    }
}

fn to_luminance(img: DynamicImage) -> Frame {
    match img {
        DynamicImage::ImageLuma8(gray) => Frame::from(gray),
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => Frame::from(img.to_luma8()),
        other => {
            let rgb = other.into_rgb8();
            let (width, height) = rgb.dimensions();
            let data = rgb
                .pixels()
                .map(|p| bt601_luma(p[0], p[1], p[2]))
                .collect();
            Frame::new(data, width, height)
        }
    }
}

/// Fixed-point `0.299 R + 0.587 G + 0.114 B`, rounded.
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899; // 0.299 * 2^14
    const G: u32 = 9617; // 0.587 * 2^14
    const B: u32 = 1868; // 0.114 * 2^14
    let y = (r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14;
    y.min(255) as u8
}

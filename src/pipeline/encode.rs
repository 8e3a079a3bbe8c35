//! Image encoding: uploaded image bytes → base64 [`InlineImage`].
//!
//! Multimodal APIs (Gemini, OpenAI, Anthropic) accept PNG, JPEG, GIF and WebP
//! as base64 data embedded in the JSON request body. Those formats are passed
//! through byte-for-byte; anything else the `image` crate can decode (BMP,
//! TIFF, ICO…) is re-encoded to lossless PNG first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// An image carried inline in a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    pub data_base64: String,
}

const PASSTHROUGH: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Encode raw image bytes for the model.
///
/// The format is sniffed from the bytes; a declared media type is only a
/// hint and never overrides what the bytes say.
pub fn encode_image(bytes: &[u8]) -> Result<InlineImage, image::ImageError> {
    let format = image::guess_format(bytes)?;

    if PASSTHROUGH.contains(&format) {
        let data_base64 = STANDARD.encode(bytes);
        debug!("Inlined {:?} image → {} bytes base64", format, data_base64.len());
        return Ok(InlineImage {
            mime_type: format.to_mime_type().to_string(),
            data_base64,
        });
    }

    let img = image::load_from_memory_with_format(bytes, format)?;
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    let data_base64 = STANDARD.encode(&buf);
    debug!("Re-encoded {:?} image as PNG → {} bytes base64", format, data_base64.len());

    Ok(InlineImage {
        mime_type: "image/png".to_string(),
        data_base64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn sample(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn png_passes_through() {
        let bytes = sample(ImageFormat::Png);
        let inline = encode_image(&bytes).expect("encode should succeed");
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&inline.data_base64).unwrap(), bytes);
    }

    #[test]
    fn jpeg_keeps_its_mime_type() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
        assert_eq!(encode_image(&buf).unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(encode_image(b"definitely not an image").is_err());
    }
}

//! services/portal/src/adapters/avatar.rs
//!
//! Implements the `ImageService` port with the `image` crate. Decoding and
//! resizing run on the blocking pool so request tasks are not stalled.

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage};
use portfolio_core::ports::{ImageService, PortError, PortResult};

/// JPEG quality used for stored avatars.
const JPEG_QUALITY: u8 = 85;

#[derive(Clone, Copy, Default)]
pub struct AvatarImageAdapter;

impl AvatarImageAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageService for AvatarImageAdapter {
    async fn square_thumbnail(&self, image: Vec<u8>, edge: u32) -> PortResult<Vec<u8>> {
        tokio::task::spawn_blocking(move || crop_and_encode(&image, edge))
            .await
            .map_err(|e| PortError::Unexpected(format!("image task failed: {}", e)))?
    }
}

/// Centre-crops to the largest square, scales to `edge`, encodes as JPEG.
fn crop_and_encode(bytes: &[u8], edge: u32) -> PortResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PortError::Validation(format!("not a readable image: {}", e)))?;

    let (width, height) = (decoded.width(), decoded.height());
    let side = width.min(height);
    let square = decoded.crop_imm((width - side) / 2, (height - side) / 2, side, side);
    let resized = square.resize_exact(edge, edge, FilterType::Lanczos3);
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(rgb.as_bytes(), edge, edge, ColorType::Rgb8)
        .map_err(|e| PortError::Unexpected(format!("jpeg encoding failed: {}", e)))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([108, 99, 255, 255]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn wide_images_become_square_jpegs() {
        let jpeg = AvatarImageAdapter::new()
            .square_thumbnail(png(900, 300), 400)
            .await
            .unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 400));
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn undecodable_bytes_are_rejected() {
        let err = AvatarImageAdapter::new()
            .square_thumbnail(b"plain text".to_vec(), 400)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }
}

//! Image decoding: raw bytes in, opaque `RgbImage` out.
//!
//! Accepts whatever the `image` crate can decode (PNG, JPEG, BMP, WebP).
//! Transparent pixels are composited over white so that a logo on a
//! transparent background segments the same way as one on paper.
//!
//! This is the first step in the pipeline.

use image::{DynamicImage, RgbImage};

use crate::types::PipelineError;

/// Decode raw image bytes into an opaque RGB image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(flatten_on_white(&img))
}

/// Composite an image over a white background and drop the alpha channel.
#[must_use]
pub fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| -> u8 {
            let value = (u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255;
            u8::try_from(value).unwrap_or(u8::MAX)
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGBA image as a PNG byte buffer.
    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = image::RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let rgb = decode(&encode_png(&img)).unwrap();
        assert_eq!(rgb.width(), 17);
        assert_eq!(rgb.height(), 31);
        assert_eq!(rgb.get_pixel(3, 3).0, [128, 64, 32]);
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = image::RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgba([0, 0, 0, 0])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        let rgb = decode(&encode_png(&img)).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn half_alpha_blends_towards_white() {
        let img = image::RgbaImage::from_fn(1, 1, |_, _| image::Rgba([0, 0, 0, 128]));
        let rgb = flatten_on_white(&DynamicImage::ImageRgba8(img));
        let v = rgb.get_pixel(0, 0).0[0];
        assert!((126..=128).contains(&v), "got {v}");
    }
}

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageResult};

/// Decode a captured image, shrink it to fit `max_dim` on its longest side
/// (aspect preserved, never upscaled) and re-encode it as JPEG.
pub fn fit_jpeg(encoded: &[u8], max_dim: u32, quality: u8) -> ImageResult<Vec<u8>> {
    let mut img = image::load_from_memory(encoded)?;
    if img.width() > max_dim || img.height() > max_dim {
        img = img.thumbnail(max_dim, max_dim);
    }
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn large_frames_are_downscaled_with_aspect_ratio() {
        let jpeg = fit_jpeg(&png(2000, 1000), 1024, 80).expect("fit");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).expect("decode jpeg");
        assert_eq!((decoded.width(), decoded.height()), (1024, 512));
    }

    #[test]
    fn small_frames_keep_their_size() {
        let jpeg = fit_jpeg(&png(320, 240), 1024, 80).expect("fit");
        let decoded = image::load_from_memory(&jpeg).expect("decode jpeg");
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(fit_jpeg(b"not an image", 1024, 80).is_err());
    }
}

use std::path::Path;

use image::DynamicImage;

use crate::error::DecodeError;
use crate::loader::ImageData;

/// Decodes an encoded image (PNG or JPEG) into 8-bit pixels.
///
/// Channel count follows the source: gray stays one or two channels, color without alpha stays
/// RGB. Everything else is expanded to RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<ImageData, DecodeError> {
    let img = image::load_from_memory(bytes)?;
    Ok(from_dynamic(img))
}

pub fn load_image(path: impl AsRef<Path>) -> Result<ImageData, DecodeError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let image = decode_image(&bytes)?;
    log::debug!(
        "decoded {} ({}x{}, {} channel(s))",
        path.display(),
        image.width,
        image.height,
        image.channels
    );
    Ok(image)
}

fn from_dynamic(img: DynamicImage) -> ImageData {
    let (width, height) = (img.width(), img.height());
    match img {
        DynamicImage::ImageLuma8(buf) => ImageData::new(width, height, 1, buf.into_raw()),
        DynamicImage::ImageLumaA8(buf) => ImageData::new(width, height, 2, buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => ImageData::new(width, height, 3, buf.into_raw()),
        other if !other.color().has_alpha() => {
            ImageData::new(width, height, 3, other.to_rgb8().into_raw())
        }
        other => ImageData::new(width, height, 4, other.to_rgba8().into_raw()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(img: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn keeps_rgb_without_alpha() {
        let src = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let decoded = decode_image(&png(DynamicImage::ImageRgb8(src))).unwrap();
        assert_eq!((decoded.width, decoded.height, decoded.channels), (3, 2, 3));
        assert_eq!(&decoded.pixels[..3], &[10, 20, 30]);
        decoded.validate().unwrap();
    }

    #[test]
    fn alpha_images_become_rgba() {
        let src = image::RgbaImage::from_pixel(1, 1, image::Rgba([1, 2, 3, 4]));
        let decoded = decode_image(&png(DynamicImage::ImageRgba8(src))).unwrap();
        assert_eq!(decoded.channels, 4);
        assert_eq!(decoded.pixels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_image(b"not an image"), Err(DecodeError::Image(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_image("/definitely/not/here.png"),
            Err(DecodeError::Io(_))
        ));
    }
}

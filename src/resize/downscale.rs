use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::error::{EncodingError, ImageFormatHint};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat};

use super::error::DecodeError;
use super::{exif, heic};

/// Output of [`downscale`]. When `resized` is false, `bytes` is the input.
#[derive(Debug)]
pub struct Downscaled {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Encoder used for a file extension (with or without the leading dot).
/// HEIC and anything unrecognized are written as JPEG.
pub fn output_format(ext: &str) -> ImageFormat {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => ImageFormat::Png,
        "webp" => ImageFormat::WebP,
        "bmp" => ImageFormat::Bmp,
        "tif" | "tiff" => ImageFormat::Tiff,
        _ => ImageFormat::Jpeg,
    }
}

/// Dimensions with the longer edge scaled to exactly `max_edge`.
fn target_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let scale = |short: u32, long: u32| {
        let v = (short as f64 * max_edge as f64 / long as f64).round() as u32;
        v.max(1)
    };
    if width >= height {
        (max_edge, scale(height, width))
    } else {
        (scale(width, height), max_edge)
    }
}

/// Decode to an upright image. HEIF goes through libheif when available.
fn decode(input: &[u8]) -> Result<DynamicImage, DecodeError> {
    if heic::is_heif(input) {
        #[cfg(feature = "heic")]
        {
            return heic::decode(input);
        }
        #[cfg(not(feature = "heic"))]
        {
            return Err(DecodeError::HeifUnsupported);
        }
    }
    let img = image::load_from_memory(input).map_err(DecodeError::Unreadable)?;
    Ok(match exif::orientation(input) {
        Some(o) if o != 1 => exif::apply_orientation(img, o),
        _ => img,
    })
}

/// Decode, correct orientation and, when the longer edge exceeds
/// `max_edge`, resize with Lanczos3 and re-encode in the format implied by
/// `ext`. `quality` applies to the lossy encoders (JPEG and WebP).
pub fn downscale(
    input: &[u8],
    max_edge: u32,
    ext: &str,
    quality: u8,
) -> Result<Downscaled, DecodeError> {
    let img = decode(input)?;

    let (width, height) = img.dimensions();
    if width.max(height) <= max_edge {
        return Ok(Downscaled {
            bytes: input.to_vec(),
            width,
            height,
            resized: false,
        });
    }

    let (new_width, new_height) = target_size(width, height, max_edge);
    let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);
    let format = output_format(ext);
    let bytes = encode(resized, format, quality)
        .map_err(|source| DecodeError::Encode { format, source })?;

    Ok(Downscaled {
        bytes,
        width: new_width,
        height: new_height,
        resized: true,
    })
}

/// 8-bit RGB or RGBA, the layouts every encoder accepts.
fn normalize(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn encode(img: DynamicImage, format: ImageFormat, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        }
        ImageFormat::WebP => {
            // image's own WebP encoder is lossless only.
            let normalized = normalize(img);
            let encoder = webp::Encoder::from_image(&normalized).map_err(|e| {
                ImageError::Encoding(EncodingError::new(
                    ImageFormatHint::Exact(ImageFormat::WebP),
                    e.to_string(),
                ))
            })?;
            buf.extend_from_slice(&encoder.encode(f32::from(quality)));
        }
        _ => {
            normalize(img).write_to(&mut Cursor::new(&mut buf), format)?;
        }
    }
    Ok(buf)
}

//! HEIF/HEIC detection, and decoding through libheif when built with the
//! `heic` feature.

#[cfg(feature = "heic")]
use image::error::{DecodingError, ImageFormatHint};
#[cfg(feature = "heic")]
use image::{DynamicImage, ImageError, RgbImage};

#[cfg(feature = "heic")]
use super::error::DecodeError;

/// `ftyp` major brands of HEIF stills and sequences.
const HEIF_BRANDS: [&[u8; 4]; 8] = [
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

/// Whether `bytes` start with an ISO-BMFF `ftyp` box naming a HEIF brand.
pub fn is_heif(bytes: &[u8]) -> bool {
    bytes.len() >= 12
        && &bytes[4..8] == b"ftyp"
        && HEIF_BRANDS.iter().any(|brand| bytes[8..12] == brand[..])
}

#[cfg(feature = "heic")]
fn layout_error(reason: &'static str) -> DecodeError {
    DecodeError::Unreadable(ImageError::Decoding(DecodingError::new(
        ImageFormatHint::Name("HEIF".into()),
        reason,
    )))
}

/// Decode the primary image to 8-bit RGB.
///
/// libheif applies the container's rotation and mirror properties, so the
/// result is already upright.
#[cfg(feature = "heic")]
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib = LibHeif::new();
    let context = HeifContext::read_from_bytes(bytes)?;
    let handle = context.primary_image_handle()?;
    let image = lib.decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)?;

    let planes = image.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| layout_error("no interleaved RGB plane"))?;
    let (width, height) = (plane.width, plane.height);
    let row = width as usize * 3;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * plane.stride;
        let line = plane
            .data
            .get(start..start + row)
            .ok_or_else(|| layout_error("plane shorter than its dimensions"))?;
        pixels.extend_from_slice(line);
    }
    let rgb = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| layout_error("pixel buffer size mismatch"))?;
    Ok(DynamicImage::ImageRgb8(rgb))
}

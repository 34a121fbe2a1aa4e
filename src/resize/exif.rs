use std::io::Cursor;

use image::DynamicImage;

/// Read the EXIF `Orientation` tag (1..=8) from encoded image bytes.
///
/// Returns `None` when the container has no EXIF block or the tag is
/// missing or out of range.
pub fn orientation(bytes: &[u8]) -> Option<u32> {
    let exif_reader = exif::Reader::new();
    match exif_reader.read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .filter(|o| (1..=8).contains(o)),
        Err(e) => {
            tracing::debug!("No EXIF orientation: {}", e);
            None
        }
    }
}

/// Rotate/flip a decoded image so it displays upright.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

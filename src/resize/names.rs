use crate::graph::RemoteItem;

/// Extensions treated as raster images regardless of the reported MIME type.
const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".bmp", ".tif", ".tiff", ".webp", ".heic",
];

const RESIZED_SUFFIX: &str = "_2k";
const ORIGINAL_SUFFIX: &str = "_original";

/// Split `name` into base and extension (extension keeps its dot).
/// A leading dot does not start an extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if name[..pos].trim_start_matches('.').is_empty() => (name, ""),
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    }
}

/// Target names for one original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNames {
    /// `<base>_original<ext>`, used by the preserve flow.
    pub original: String,
    /// `<base>_2k<ext>`.
    pub resized: String,
}

pub fn plan_names(name: &str) -> PlannedNames {
    let (base, ext) = split_name(name);
    PlannedNames {
        original: format!("{}{}{}", base, ORIGINAL_SUFFIX, ext),
        resized: format!("{}{}{}", base, RESIZED_SUFFIX, ext),
    }
}

pub fn is_image(item: &RemoteItem) -> bool {
    if item.is_folder {
        return false;
    }
    let mime_is_image = item
        .mime_type
        .as_deref()
        .is_some_and(|m| m.to_ascii_lowercase().starts_with("image/"));
    let name = item.name.to_ascii_lowercase();
    mime_is_image || IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Outputs of an earlier run (`*_2k.*`, `*_original.*`) are never reprocessed.
pub fn is_already_processed(name: &str) -> bool {
    let (base, _) = split_name(name);
    base.ends_with(RESIZED_SUFFIX) || base.ends_with(ORIGINAL_SUFFIX)
}

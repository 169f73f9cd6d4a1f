use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fs;
use std::path::Path;
use tutor::models::message::Attachment;

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

fn image_mime(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Read a file into an attachment: images as data URIs, anything else as text
pub fn load_attachment(path: &Path) -> Result<Attachment> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match image_mime(path) {
        Some(mime) => {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let payload = format!("data:{};base64,{}", mime, STANDARD.encode(bytes));
            Ok(Attachment::image(name, payload))
        }
        None => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("{} is not a readable text file", path.display()))?;
            Ok(Attachment::text(name, text))
        }
    }
}

//! File upload path.
//!
//! Mime type is sniffed from content first and only falls back to the file
//! extension when the content is not recognised. Anything that is not an
//! image is rejected before it reaches the identification client.

use super::{CaptureError, ImageOrigin, RawImage};
use std::path::Path;

/// Inline image payloads above this size are rejected by the Gemini API.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Read an image file from disk.
pub fn load_upload(path: &Path, max_bytes: u64) -> Result<RawImage, CaptureError> {
    let display = path.display().to_string();
    let io_err = |source| CaptureError::Io {
        path: display.clone(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > max_bytes {
        return Err(CaptureError::TooLarge {
            name: display.clone(),
            size,
            limit: max_bytes,
        });
    }

    let start = std::time::Instant::now();
    let bytes = std::fs::read(path).map_err(io_err)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| display.clone());

    let image = image_from_bytes(bytes, &file_name, None)?;
    log::info!(
        "[CAPTURE] Loaded {} ({}, {} bytes) in {}ms",
        file_name,
        image.mime_type,
        image.bytes.len(),
        start.elapsed().as_millis()
    );
    Ok(image)
}

/// Wrap bytes that arrived from a file picker as an upload `RawImage`.
///
/// `declared_mime` is what the picker reported, if anything. Sniffed
/// content always takes precedence over it.
pub fn image_from_bytes(
    bytes: Vec<u8>,
    file_name: &str,
    declared_mime: Option<&str>,
) -> Result<RawImage, CaptureError> {
    if bytes.is_empty() {
        return Err(CaptureError::Empty(file_name.to_string()));
    }

    let mime_type = match infer::get(&bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            kind.mime_type().to_string()
        }
        Some(kind) => {
            log::warn!(
                "[CAPTURE] Rejected {}: content is {}",
                file_name,
                kind.mime_type()
            );
            return Err(CaptureError::NotAnImage(file_name.to_string()));
        }
        None => declared_mime
            .filter(|m| m.starts_with("image/"))
            .map(str::to_string)
            .or_else(|| mime_from_extension(file_name).map(str::to_string))
            .ok_or_else(|| CaptureError::NotAnImage(file_name.to_string()))?,
    };

    Ok(RawImage {
        bytes,
        mime_type,
        origin: ImageOrigin::Upload {
            file_name: file_name.to_string(),
        },
    })
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

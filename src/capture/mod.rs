//! Image capture domain: public API.
//!
//! Produces a `RawImage` from one of two sources:
//!   - upload.rs  - a user-selected file, restricted to image content
//!   - camera.rs  - a still frame from a live camera session
//!
//! The camera backend (ffmpeg.rs) is one implementation of `CameraDevice`;
//! everything above it only sees `CameraSession`.

mod camera;
mod ffmpeg;
mod mjpeg;
mod upload;

pub use camera::{
    wait_for_shutter, CameraDevice, CameraSession, CameraSlot, CameraViewport, FeedState, Facing,
    Frame, ShutterAction, StreamTracks,
};
pub use ffmpeg::FfmpegCamera;
pub use upload::{image_from_bytes, load_upload, DEFAULT_MAX_UPLOAD_BYTES};

use base64::Engine;
use serde::Serialize;
use std::io::Cursor;

/// File name given to camera snapshots, matching what a browser upload of
/// the same frame would carry.
pub const SNAPSHOT_FILE_NAME: &str = "captured_image.jpg";

/// Where a `RawImage` came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
    Upload { file_name: String },
    Camera,
}

/// In-memory image bytes plus mime type, prior to upload.
///
/// Created once per capture/upload event and dropped once the
/// identification request completes.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub origin: ImageOrigin,
}

/// What the preview panel shows for the current image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePreview {
    pub label: String,
    pub mime_type: String,
    pub byte_len: usize,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl RawImage {
    /// Base64 payload for inline image data in provider requests.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Build the preview descriptor. Dimensions are read from the image
    /// header only; a header the `image` crate cannot read leaves them empty.
    pub fn preview(&self) -> ImagePreview {
        let dimensions = image::ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());

        let label = match &self.origin {
            ImageOrigin::Upload { file_name } => file_name.clone(),
            ImageOrigin::Camera => SNAPSHOT_FILE_NAME.to_string(),
        };

        ImagePreview {
            label,
            mime_type: self.mime_type.clone(),
            byte_len: self.bytes.len(),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        }
    }
}

/// Upload-path failures.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not an image file")]
    NotAnImage(String),

    #[error("{name} is {size} bytes, above the {limit} byte upload limit")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("{0} is empty")]
    Empty(String),
}

/// Camera failures. Always recoverable: the upload path stays usable.
#[derive(Debug, thiserror::Error)]
pub enum CameraAccessError {
    #[error("camera capture is not supported here: {0}")]
    Unsupported(String),

    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("no camera device found: {0}")]
    DeviceNotFound(String),

    #[error("camera produced no frame within {0}ms")]
    NoFrame(u128),

    #[error("camera stream ended: {0}")]
    StreamEnded(String),

    #[error("could not rasterize camera frame: {0}")]
    Frame(String),

    #[error("camera process failed to start: {0}")]
    Spawn(#[from] std::io::Error),
}

impl CameraAccessError {
    /// Classify the diagnostic text a camera backend printed before exiting.
    pub fn from_backend_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("permission denied") || lower.contains("not authorized") {
            CameraAccessError::PermissionDenied(message.trim().to_string())
        } else if lower.contains("no such file")
            || lower.contains("no such device")
            || lower.contains("could not find video device")
        {
            CameraAccessError::DeviceNotFound(message.trim().to_string())
        } else {
            CameraAccessError::StreamEnded(message.trim().to_string())
        }
    }
}

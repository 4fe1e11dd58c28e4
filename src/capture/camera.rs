//! Camera session lifecycle.
//!
//! A `CameraSession` owns one live stream. The stream's tracks are released
//! exactly once: on `snapshot`, on an explicit `release`, or on drop,
//! whichever happens first. `CameraSlot` keeps at most one session alive.

use super::{CameraAccessError, ImageOrigin, RawImage};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

/// Which physical camera to prefer. A hint: backends that cannot tell
/// cameras apart fall back to their default device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    /// Rear camera, pointed away from the user.
    #[default]
    Environment,
    User,
}

/// One encoded frame pulled off the stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub jpeg: Vec<u8>,
}

/// What the stream reader publishes to the session.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub latest: Option<Arc<Frame>>,
    /// Set once the stream stops producing frames, with the backend's reason.
    pub ended: Option<String>,
}

/// Handle to the hardware side of a stream. `stop` must tolerate being
/// called on a stream that already died on its own.
pub trait StreamTracks: Send {
    fn stop(&mut self);
}

/// Something that can open a camera stream.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, facing: Facing) -> Result<CameraSession, CameraAccessError>;
}

/// Live viewport info for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraViewport {
    pub label: String,
    pub frames_seen: u64,
    pub last_frame_bytes: usize,
    pub active: bool,
}

pub struct CameraSession {
    label: String,
    feed: watch::Receiver<FeedState>,
    tracks: Option<Box<dyn StreamTracks>>,
    opened_at: Instant,
}

impl CameraSession {
    pub fn new(
        label: impl Into<String>,
        feed: watch::Receiver<FeedState>,
        tracks: Box<dyn StreamTracks>,
    ) -> Self {
        let label = label.into();
        log::info!("[CAMERA] Stream acquired: {}", label);
        Self {
            label,
            feed,
            tracks: Some(tracks),
            opened_at: Instant::now(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.tracks.is_some()
    }

    pub fn viewport(&self) -> CameraViewport {
        let state = self.feed.borrow();
        CameraViewport {
            label: self.label.clone(),
            frames_seen: state.latest.as_ref().map(|f| f.seq).unwrap_or(0),
            last_frame_bytes: state.latest.as_ref().map(|f| f.jpeg.len()).unwrap_or(0),
            active: self.tracks.is_some(),
        }
    }

    /// Wait until the stream has produced at least `min_frames` frames
    /// (at least one). Early frames from some sensors are dark while
    /// auto-exposure settles.
    ///
    /// A stream that dies first is classified from the backend's message
    /// (permission denied, missing device, ...).
    pub async fn wait_for_frame(
        &mut self,
        min_frames: u64,
        timeout: Duration,
    ) -> Result<(), CameraAccessError> {
        let min_frames = min_frames.max(1);
        let enough = move |state: &FeedState| {
            state.latest.as_ref().is_some_and(|f| f.seq >= min_frames)
        };
        let outcome: Result<(), Option<String>> = {
            let waited = tokio::time::timeout(
                timeout,
                self.feed
                    .wait_for(|state| enough(state) || state.ended.is_some()),
            )
            .await;
            match waited {
                Ok(Ok(state)) if enough(&*state) => Ok(()),
                Ok(Ok(state)) => Err(Some(state.ended.clone().unwrap_or_default())),
                Ok(Err(_)) => Err(Some("stream reader stopped".to_string())),
                Err(_) => Err(None),
            }
        };

        match outcome {
            Ok(()) => {
                log::info!(
                    "[CAMERA] Stream ready after {}ms ({} warm-up frames)",
                    self.opened_at.elapsed().as_millis(),
                    min_frames
                );
                Ok(())
            }
            Err(Some(reason)) => {
                self.release();
                Err(CameraAccessError::from_backend_message(&reason))
            }
            Err(None) => {
                self.release();
                Err(CameraAccessError::NoFrame(timeout.as_millis()))
            }
        }
    }

    /// Take the current frame as a JPEG `RawImage` and release the stream.
    ///
    /// The stream is released before the frame is rasterized, so it is
    /// freed even when rasterizing fails.
    pub fn snapshot(mut self) -> Result<RawImage, CameraAccessError> {
        let frame = self.feed.borrow().latest.clone();
        self.release();

        let frame = frame.ok_or_else(|| {
            CameraAccessError::StreamEnded("no frame captured before snapshot".to_string())
        })?;

        let start = Instant::now();
        let decoded = image::load_from_memory(&frame.jpeg)
            .map_err(|e| CameraAccessError::Frame(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());

        // The JPEG encoder rejects alpha; flatten to RGB first.
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(decoded.to_rgb8())
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .map_err(|e| CameraAccessError::Frame(e.to_string()))?;

        log::info!(
            "[CAMERA] Snapshot #{} rasterized: {}x{}, {} bytes in {}ms",
            frame.seq,
            width,
            height,
            bytes.len(),
            start.elapsed().as_millis()
        );

        Ok(RawImage {
            bytes,
            mime_type: "image/jpeg".to_string(),
            origin: ImageOrigin::Camera,
        })
    }

    /// Stop the stream's tracks. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut tracks) = self.tracks.take() {
            tracks.stop();
            log::info!(
                "[CAMERA] Stream released: {} (open {}ms)",
                self.label,
                self.opened_at.elapsed().as_millis()
            );
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Holds the single active camera session.
#[derive(Debug, Default)]
pub struct CameraSlot {
    session: Option<CameraSession>,
}

impl CameraSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, releasing whichever one was active before.
    pub fn install(&mut self, session: CameraSession) {
        if let Some(mut previous) = self.session.replace(session) {
            log::info!("[CAMERA] Replacing active stream: {}", previous.label());
            previous.release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active())
    }

    pub fn viewport(&self) -> Option<CameraViewport> {
        self.session.as_ref().map(|s| s.viewport())
    }

    pub fn session_mut(&mut self) -> Option<&mut CameraSession> {
        self.session.as_mut()
    }

    /// Hand the session to the caller, typically to take a snapshot.
    pub fn take(&mut self) -> Option<CameraSession> {
        self.session.take()
    }

    /// Close the camera UI without taking a photo.
    pub fn dismiss(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }
}

/// What the user chose at the shutter prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterAction {
    Take,
    Cancel,
}

/// Wait for the user to press Enter (take) or type `q` (cancel), calling
/// `on_tick` every `tick` to refresh the viewport.
///
/// `cancel` is polled as one future for the whole wait, so a signal that
/// fires between ticks is not lost. End of input counts as cancel.
pub async fn wait_for_shutter<R, C>(
    input: R,
    cancel: C,
    tick: Duration,
    mut on_tick: impl FnMut(),
) -> std::io::Result<ShutterAction>
where
    R: AsyncBufRead + Unpin,
    C: Future,
{
    let mut lines = input.lines();
    let mut ticker = tokio::time::interval(tick);
    tokio::pin!(cancel);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                return Ok(match line? {
                    Some(line) if !line.trim().eq_ignore_ascii_case("q") => ShutterAction::Take,
                    _ => ShutterAction::Cancel,
                });
            }
            _ = &mut cancel => return Ok(ShutterAction::Cancel),
            _ = ticker.tick() => on_tick(),
        }
    }
}

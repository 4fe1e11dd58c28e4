//! Camera backend that drives a local `ffmpeg` binary.
//!
//! ffmpeg opens the platform video device and writes an MJPEG pipe to
//! stdout. A reader task splits the pipe into frames and publishes the most
//! recent one through a watch channel. Releasing the session kills ffmpeg,
//! which frees the device.

use super::camera::{CameraDevice, CameraSession, FeedState, Facing, Frame, StreamTracks};
use super::mjpeg::FrameSplitter;
use super::CameraAccessError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const READ_CHUNK_BYTES: usize = 64 * 1024;

pub struct FfmpegCamera {
    device: Option<String>,
    framerate: u32,
}

impl FfmpegCamera {
    /// `device` overrides the platform default (`/dev/video0`, `0`, ...).
    pub fn new(device: Option<String>) -> Self {
        Self {
            device,
            framerate: 15,
        }
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate.max(1);
        self
    }

    fn locate_ffmpeg() -> Result<PathBuf, CameraAccessError> {
        which::which("ffmpeg")
            .map_err(|e| CameraAccessError::Unsupported(format!("ffmpeg not found on PATH: {}", e)))
    }

    /// Pick the device to open. An explicit device always wins; otherwise
    /// the facing hint is only logged, since video device nodes carry no
    /// facing information.
    fn resolve_device(&self, facing: Facing) -> Result<String, CameraAccessError> {
        if let Some(device) = &self.device {
            return Ok(device.clone());
        }
        log::info!(
            "[CAMERA] No device configured; using platform default ({:?} preferred)",
            facing
        );
        default_device()
    }

    fn input_args(&self, device: &str) -> Vec<String> {
        let rate = self.framerate.to_string();
        let format = if cfg!(target_os = "macos") {
            "avfoundation"
        } else if cfg!(target_os = "windows") {
            "dshow"
        } else {
            "v4l2"
        };
        let input = if cfg!(target_os = "windows") && !device.starts_with("video=") {
            format!("video={}", device)
        } else {
            device.to_string()
        };
        vec![
            "-f".to_string(),
            format.to_string(),
            "-framerate".to_string(),
            rate,
            "-i".to_string(),
            input,
        ]
    }
}

#[cfg(target_os = "linux")]
fn default_device() -> Result<String, CameraAccessError> {
    (0..8)
        .map(|n| format!("/dev/video{}", n))
        .find(|path| std::path::Path::new(path).exists())
        .ok_or_else(|| CameraAccessError::DeviceNotFound("no /dev/video* nodes".to_string()))
}

#[cfg(target_os = "macos")]
fn default_device() -> Result<String, CameraAccessError> {
    Ok("0".to_string())
}

#[cfg(target_os = "windows")]
fn default_device() -> Result<String, CameraAccessError> {
    Err(CameraAccessError::DeviceNotFound(
        "set a camera device name (PLANTSNAP_CAMERA_DEVICE) for dshow".to_string(),
    ))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn default_device() -> Result<String, CameraAccessError> {
    Err(CameraAccessError::Unsupported(
        "no default camera device on this platform".to_string(),
    ))
}

#[async_trait]
impl CameraDevice for FfmpegCamera {
    async fn open(&self, facing: Facing) -> Result<CameraSession, CameraAccessError> {
        let ffmpeg = Self::locate_ffmpeg()?;
        let device = self.resolve_device(facing)?;

        let mut child = Command::new(&ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(self.input_args(&device))
            .args(["-f", "image2pipe", "-vcodec", "mjpeg", "-q:v", "3", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        log::info!(
            "[CAMERA] Spawned {} for {} (pid {:?})",
            ffmpeg.display(),
            device,
            child.id()
        );

        let stdout = child.stdout.take().ok_or_else(|| {
            CameraAccessError::StreamEnded("ffmpeg stdout was not captured".to_string())
        })?;
        let stderr = child.stderr.take();

        let (tx, rx) = watch::channel(FeedState::default());
        let reader = tokio::spawn(read_frames(stdout, stderr, tx));

        Ok(CameraSession::new(
            format!("ffmpeg:{}", device),
            rx,
            Box::new(FfmpegTracks { child, reader }),
        ))
    }
}

async fn read_frames(
    mut stdout: tokio::process::ChildStdout,
    stderr: Option<tokio::process::ChildStderr>,
    tx: watch::Sender<FeedState>,
) {
    // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
    let diagnostics = tokio::spawn(async move {
        let mut text = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut text).await;
        }
        text
    });

    let mut splitter = FrameSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut seq: u64 = 0;
    let mut read_error = None;

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for jpeg in splitter.push(&buf[..n]) {
                    seq += 1;
                    let frame = Arc::new(Frame { seq, jpeg });
                    tx.send_modify(|state| state.latest = Some(frame));
                }
            }
            Err(e) => {
                read_error = Some(e.to_string());
                break;
            }
        }
    }

    let stderr_text = diagnostics.await.unwrap_or_default();
    let reason = match (read_error, stderr_text.trim()) {
        (Some(err), "") => err,
        (_, text) if !text.is_empty() => text.to_string(),
        _ => "ffmpeg exited".to_string(),
    };
    log::info!("[CAMERA] Stream ended after {} frames: {}", seq, reason);
    tx.send_modify(|state| state.ended = Some(reason));
}

struct FfmpegTracks {
    child: Child,
    reader: JoinHandle<()>,
}

impl StreamTracks for FfmpegTracks {
    fn stop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            // Already exited on its own.
            log::debug!("[CAMERA] ffmpeg kill: {}", e);
        }
        self.reader.abort();
    }
}

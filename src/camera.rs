// GPhoto2-based camera for the booth.
// Live view is streamed with the gphoto2 CLI and painted straight onto the
// framebuffer with any active overlays blended in; stills are captured with
// gphoto2 and scaled to the configured resolution.

use async_trait::async_trait;
use image::RgbaImage;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::display::fit_to_canvas;
use crate::errors::CameraError;
use crate::framebuffer::Framebuffer;
use crate::mjpeg::MjpegSplitter;
use crate::overlay::{Overlay, OverlayHandle};

/// Time gphoto2 needs to release the USB device after live view stops.
const RELEASE_DELAY: Duration = Duration::from_millis(500);

#[async_trait]
pub trait Camera: Send {
    async fn start_preview(&mut self) -> Result<(), CameraError>;
    async fn stop_preview(&mut self) -> Result<(), CameraError>;
    async fn capture(&mut self, path: &Path) -> Result<(), CameraError>;
    async fn set_overlay(&mut self, overlay: Overlay) -> Result<OverlayHandle, CameraError>;
    async fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<(), CameraError>;
    async fn close(&mut self) -> Result<(), CameraError>;
    fn is_previewing(&self) -> bool;
}

type OverlayMap = Arc<Mutex<BTreeMap<OverlayHandle, Arc<Overlay>>>>;

/// Lets live view paint the framebuffer only while it is open.
///
/// A paint holds the gate's lock for the whole framebuffer write, so once
/// `close` returns no preview frame reaches the screen until the next `open`.
#[derive(Debug, Clone, Default)]
pub struct PreviewGate {
    open: Arc<StdMutex<bool>>,
}

impl PreviewGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        *self.lock() = true;
    }

    /// Blocks until a paint in progress has finished.
    pub fn close(&self) {
        *self.lock() = false;
    }

    pub fn is_open(&self) -> bool {
        *self.lock()
    }

    /// Run `paint` if the gate is open.
    pub fn paint<T>(&self, paint: impl FnOnce() -> T) -> Option<T> {
        let open = self.lock();
        if *open {
            Some(paint())
        } else {
            None
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct GPhotoCamera {
    config: CameraConfig,
    framebuffer: Arc<Framebuffer>,
    screen: (u32, u32),
    overlays: OverlayMap,
    next_overlay: u64,
    gate: PreviewGate,
    preview_task: Option<JoinHandle<()>>,
}

impl GPhotoCamera {
    pub fn new(config: CameraConfig, framebuffer: Arc<Framebuffer>, screen: (u32, u32)) -> Self {
        GPhotoCamera {
            config,
            framebuffer,
            screen,
            overlays: Arc::new(Mutex::new(BTreeMap::new())),
            next_overlay: 1,
            gate: PreviewGate::new(),
            preview_task: None,
        }
    }

    /// Kill any gphoto2 process still holding the camera
    fn kill_gphoto_processes() {
        let _ = std::process::Command::new("pkill")
            .args(["-f", "gphoto2"])
            .output();
    }

    /// Check that a camera is attached over USB.
    pub async fn initialize(&self) -> Result<(), CameraError> {
        info!("Initializing camera via gphoto2...");
        Self::kill_gphoto_processes();
        tokio::time::sleep(RELEASE_DELAY).await;

        let output = Command::new("gphoto2")
            .arg("--auto-detect")
            .output()
            .await
            .map_err(|source| CameraError::CommandFailed {
                command: "gphoto2 --auto-detect".to_string(),
                source,
            })?;

        let output_str = String::from_utf8_lossy(&output.stdout);
        debug!("Camera detection output: {}", output_str);

        if !output_str.contains("usb:") {
            return Err(CameraError::NotDetected);
        }

        info!(
            "Camera ready, stills at {}x{}",
            self.config.width, self.config.height
        );
        Ok(())
    }

    fn spawn_live_view() -> Result<Child, CameraError> {
        Command::new("gphoto2")
            .args(["--stdout", "--capture-movie"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CameraError::PreviewStart(format!("Failed to start gphoto2: {}", e)))
    }
}

#[async_trait]
impl Camera for GPhotoCamera {
    async fn start_preview(&mut self) -> Result<(), CameraError> {
        if self.is_previewing() {
            warn!("Preview already running");
            return Ok(());
        }

        info!("Starting camera preview");
        let child = Self::spawn_live_view()?;
        self.gate.open();
        let task = tokio::spawn(preview_loop(
            child,
            self.gate.clone(),
            self.overlays.clone(),
            self.framebuffer.clone(),
            self.screen,
        ));
        self.preview_task = Some(task);
        Ok(())
    }

    async fn stop_preview(&mut self) -> Result<(), CameraError> {
        // Closed before the abort: a render already handed to the blocking
        // pool is not cancelled by it.
        self.gate.close();
        if let Some(task) = self.preview_task.take() {
            info!("Stopping camera preview");
            // Dropping the task drops the child, which kills gphoto2.
            task.abort();
            let _ = task.await;
            tokio::time::sleep(RELEASE_DELAY).await;
        }
        Ok(())
    }

    async fn capture(&mut self, path: &Path) -> Result<(), CameraError> {
        info!("Capturing photo to: {:?}", path);

        if self.is_previewing() {
            self.stop_preview().await?;
        }

        let output = Command::new("gphoto2")
            .arg("--capture-image-and-download")
            .arg("--filename")
            .arg(path)
            .arg("--force-overwrite")
            .output()
            .await
            .map_err(|source| CameraError::CommandFailed {
                command: "gphoto2 --capture-image-and-download".to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CameraError::CaptureError(stderr.trim().to_string()));
        }

        let (width, height) = (self.config.width, self.config.height);
        let path_owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), CameraError> {
            let photo = image::open(&path_owned)?;
            photo.resize_exact(width, height, image::imageops::FilterType::Triangle)
                .save(&path_owned)?;
            Ok(())
        })
        .await
        .map_err(|e| CameraError::CaptureError(format!("Resize task failed: {}", e)))??;

        info!("Photo captured successfully: {:?}", path);
        Ok(())
    }

    async fn set_overlay(&mut self, overlay: Overlay) -> Result<OverlayHandle, CameraError> {
        let handle = OverlayHandle(self.next_overlay);
        self.next_overlay += 1;
        self.overlays.lock().await.insert(handle, Arc::new(overlay));
        Ok(handle)
    }

    async fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<(), CameraError> {
        self.overlays
            .lock()
            .await
            .remove(&handle)
            .map(|_| ())
            .ok_or(CameraError::UnknownOverlay(handle.0))
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        info!("Cleaning up camera resources...");
        self.stop_preview().await?;
        self.overlays.lock().await.clear();
        Self::kill_gphoto_processes();
        info!("Camera cleanup completed");
        Ok(())
    }

    fn is_previewing(&self) -> bool {
        self.preview_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for GPhotoCamera {
    fn drop(&mut self) {
        self.gate.close();
        if let Some(task) = self.preview_task.take() {
            task.abort();
        }
    }
}

/// Read live view frames until the stream ends or the task is aborted.
async fn preview_loop(
    mut child: Child,
    gate: PreviewGate,
    overlays: OverlayMap,
    framebuffer: Arc<Framebuffer>,
    screen: (u32, u32),
) {
    let Some(mut stdout) = child.stdout.take() else {
        warn!("gphoto2 live view has no stdout");
        return;
    };

    let mut splitter = MjpegSplitter::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut frame_count = 0u64;

    loop {
        let n = match stdout.read(&mut chunk).await {
            Ok(0) => {
                warn!("Preview stream ended");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Preview stream error: {}", e);
                break;
            }
        };

        // Only the newest frame is worth drawing.
        let Some(jpeg) = splitter.push(&chunk[..n]).pop() else {
            continue;
        };

        let layers: Vec<Arc<Overlay>> = {
            let map = overlays.lock().await;
            let mut layers: Vec<Arc<Overlay>> = map.values().cloned().collect();
            layers.sort_by_key(|o| o.layer);
            layers
        };

        let fb = framebuffer.clone();
        let gate = gate.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            let mut frame = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg)
                .map_err(|e| e.to_string())?
                .to_rgba8();
            for layer in &layers {
                layer.blend_onto(&mut frame);
            }
            let canvas: RgbaImage = fit_to_canvas(&frame, screen);
            gate.paint(|| fb.present(&canvas).map(|()| true).map_err(|e| e.to_string()))
                .unwrap_or(Ok(false))
        })
        .await;

        match rendered {
            Ok(Ok(false)) => {
                debug!("Preview stopped, dropping frame");
                break;
            }
            Ok(Ok(true)) => {
                frame_count += 1;
                if frame_count % 100 == 0 {
                    debug!("Painted {} preview frames", frame_count);
                }
            }
            Ok(Err(e)) => debug!("Skipping preview frame: {}", e),
            Err(e) => {
                warn!("Preview render task failed: {}", e);
                break;
            }
        }
    }

    info!("Preview loop ended after {} frames", frame_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;

    #[test]
    fn test_closed_gate_skips_paint() {
        let gate = PreviewGate::new();
        assert!(!gate.is_open());
        assert_eq!(gate.paint(|| 1), None);

        gate.open();
        assert_eq!(gate.paint(|| 1), Some(1));

        gate.close();
        assert_eq!(gate.paint(|| 1), None);
    }

    #[test]
    fn test_close_waits_for_paint_in_progress() {
        let gate = PreviewGate::new();
        gate.open();
        let painted = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let worker = {
            let gate = gate.clone();
            let painted = painted.clone();
            std::thread::spawn(move || {
                gate.paint(|| {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(100));
                    painted.store(true, Ordering::SeqCst);
                });
            })
        };

        started_rx.recv().unwrap();
        gate.close();

        // The frame that was already being written finished first.
        assert!(painted.load(Ordering::SeqCst));
        assert_eq!(gate.paint(|| ()), None);
        worker.join().unwrap();
    }
}

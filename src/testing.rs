// Test doubles for the controller's collaborators.

use async_trait::async_trait;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;

use crate::camera::Camera;
use crate::compositor::{Compositor, Layout, MontageJob, PendingComposite};
use crate::display::{Caption, Display, Screen};
use crate::errors::{CameraError, ComposeError, DisplayError, InputError, PrinterError};
use crate::input::{ButtonLevels, ButtonSource};
use crate::overlay::{Overlay, OverlayHandle};
use crate::printers::{PrintJob, PrintOutcome, Printer};

#[derive(Debug, Clone, Copy)]
pub enum Button {
    Green,
    Red,
}

/// One full press cycle: the button down for one sample, then both up.
pub fn press(button: Button) -> Vec<ButtonLevels> {
    let down = match button {
        Button::Green => ButtonLevels { green: 0, red: 1 },
        Button::Red => ButtonLevels { green: 1, red: 0 },
    };
    vec![down, ButtonLevels::IDLE]
}

/// Replays a fixed list of samples, then fails so a runaway loop ends.
pub struct ScriptedButtons {
    samples: VecDeque<ButtonLevels>,
}

impl ScriptedButtons {
    pub fn new(samples: Vec<ButtonLevels>) -> Self {
        ScriptedButtons {
            samples: samples.into(),
        }
    }

    pub fn presses(buttons: &[Button]) -> Self {
        Self::new(buttons.iter().flat_map(|b| press(*b)).collect())
    }
}

impl ButtonSource for ScriptedButtons {
    fn read_levels(&mut self) -> Result<ButtonLevels, InputError> {
        self.samples.pop_front().ok_or(InputError::Exhausted)
    }
}

#[derive(Debug, Clone)]
pub struct Shown {
    pub screen: Screen,
    pub caption: Option<Caption>,
    /// Whether the watched camera's live view was running at the time.
    pub over_preview: bool,
}

#[derive(Clone, Default)]
pub struct RecordingDisplay {
    shown: Arc<Mutex<Vec<Shown>>>,
    closed: Arc<Mutex<bool>>,
    camera: Option<FakeCamera>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also note, for every screen, whether `camera` was previewing.
    pub fn watching(camera: FakeCamera) -> Self {
        RecordingDisplay {
            camera: Some(camera),
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn screens(&self) -> Vec<Screen> {
        self.shown().into_iter().map(|s| s.screen).collect()
    }

    pub fn captions(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .filter_map(|s| s.caption.map(|c| c.text))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl Display for RecordingDisplay {
    fn show(&mut self, screen: &Screen, caption: Option<&Caption>) -> Result<(), DisplayError> {
        let over_preview = self
            .camera
            .as_ref()
            .map(|camera| camera.is_previewing())
            .unwrap_or(false);
        self.shown.lock().unwrap().push(Shown {
            screen: screen.clone(),
            caption: caption.cloned(),
            over_preview,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), DisplayError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

#[derive(Default)]
struct CameraState {
    previewing: bool,
    overlays: BTreeSet<OverlayHandle>,
    next_handle: u64,
    captures: Vec<PathBuf>,
    preview_starts: usize,
    closed: bool,
}

/// Camera that writes a placeholder file per capture and tracks overlays.
#[derive(Clone, Default)]
pub struct FakeCamera {
    state: Arc<Mutex<CameraState>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_overlays(&self) -> Vec<OverlayHandle> {
        self.state.lock().unwrap().overlays.iter().copied().collect()
    }

    pub fn captures(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().captures.clone()
    }

    pub fn preview_starts(&self) -> usize {
        self.state.lock().unwrap().preview_starts
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn start_preview(&mut self) -> Result<(), CameraError> {
        let mut state = self.state.lock().unwrap();
        state.previewing = true;
        state.preview_starts += 1;
        Ok(())
    }

    async fn stop_preview(&mut self) -> Result<(), CameraError> {
        self.state.lock().unwrap().previewing = false;
        Ok(())
    }

    async fn capture(&mut self, path: &Path) -> Result<(), CameraError> {
        std::fs::write(path, b"frame")?;
        self.state.lock().unwrap().captures.push(path.to_path_buf());
        Ok(())
    }

    async fn set_overlay(&mut self, _overlay: Overlay) -> Result<OverlayHandle, CameraError> {
        let mut state = self.state.lock().unwrap();
        state.next_handle += 1;
        let handle = OverlayHandle(state.next_handle);
        state.overlays.insert(handle);
        Ok(handle)
    }

    async fn remove_overlay(&mut self, handle: OverlayHandle) -> Result<(), CameraError> {
        if self.state.lock().unwrap().overlays.remove(&handle) {
            Ok(())
        } else {
            Err(CameraError::UnknownOverlay(handle.0))
        }
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        let mut state = self.state.lock().unwrap();
        state.previewing = false;
        state.closed = true;
        Ok(())
    }

    fn is_previewing(&self) -> bool {
        self.state.lock().unwrap().previewing
    }
}

/// Records every job. Jobs finish at once unless a print delay is set, in
/// which case the print strip is written by a child that sleeps first.
#[derive(Clone, Default)]
pub struct FakeCompositor {
    jobs: Arc<Mutex<Vec<MontageJob>>>,
    print_delay: Option<Duration>,
}

impl FakeCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_print_delay(delay: Duration) -> Self {
        FakeCompositor {
            print_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<MontageJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Compositor for FakeCompositor {
    fn start(&self, job: &MontageJob) -> Result<PendingComposite, ComposeError> {
        self.jobs.lock().unwrap().push(job.clone());
        match self.print_delay {
            Some(delay) if job.layout == Layout::PRINT_STRIP => {
                let child = Command::new("sh")
                    .arg("-c")
                    .arg("sleep \"$0\" && echo strip > \"$1\"")
                    .arg(format!("{:.3}", delay.as_secs_f64()))
                    .arg(&job.output)
                    .spawn()
                    .map_err(|source| ComposeError::Spawn {
                        program: "sh".to_string(),
                        source,
                    })?;
                Ok(PendingComposite::running("sh", child, job.output.clone()))
            }
            _ => Ok(PendingComposite::ready(job.output.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PrinterBehavior {
    Accept,
    Missing,
    Fail,
}

#[derive(Clone)]
pub struct RecordingPrinter {
    behavior: PrinterBehavior,
    jobs: Arc<Mutex<Vec<(PathBuf, bool)>>>,
}

impl RecordingPrinter {
    pub fn new(behavior: PrinterBehavior) -> Self {
        RecordingPrinter {
            behavior,
            jobs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn printed(&self) -> Vec<PathBuf> {
        self.jobs.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    /// For each job, whether its file was on disk when it was submitted.
    pub fn files_present(&self) -> Vec<bool> {
        self.jobs.lock().unwrap().iter().map(|(_, e)| *e).collect()
    }
}

#[async_trait]
impl Printer for RecordingPrinter {
    async fn print_photo(&self, job: PrintJob) -> Result<PrintOutcome, PrinterError> {
        let exists = job.file_path.exists();
        self.jobs.lock().unwrap().push((job.file_path.clone(), exists));
        match self.behavior {
            PrinterBehavior::Accept => Ok(PrintOutcome::Submitted {
                job_id: "test-1".to_string(),
            }),
            PrinterBehavior::Missing => Ok(PrintOutcome::DeviceNotFound {
                name: "Canon_SELPHY_CP1300".to_string(),
            }),
            PrinterBehavior::Fail => Err(PrinterError::PrintFailed("paper jam".to_string())),
        }
    }

    fn type_name(&self) -> &'static str {
        "Recording"
    }
}

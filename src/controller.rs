// The kiosk session state machine.

use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::camera::Camera;
use crate::cloud_sync::CloudSync;
use crate::compositor::{Compositor, Layout, MontageJob, PendingComposite};
use crate::config::Config;
use crate::display::{Caption, Display, Screen};
use crate::errors::{AppError, AppResult, StorageError};
use crate::input::{EdgeEvent, InputReader};
use crate::overlay::{OverlayPainter, OverlaySlot};
use crate::printers::{PrintJob, PrintOutcome, Printer};
use crate::session::{CaptureSet, SessionPaths, SessionState, FRAMES_PER_SESSION};

/// Everything the controller drives, acquired by the caller.
pub struct Devices {
    pub input: InputReader,
    pub display: Box<dyn Display>,
    pub camera: Box<dyn Camera>,
    pub compositor: Box<dyn Compositor>,
    pub printer: Arc<dyn Printer + Send + Sync>,
    pub painter: OverlayPainter,
    pub sync: Option<CloudSync>,
}

/// Running totals since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoothStats {
    pub sessions: u64,
    pub prints_submitted: u64,
    pub printer_missing: u64,
    pub print_failures: u64,
}

/// State carried from the first capture to the end screen.
struct ActiveSession {
    captures: CaptureSet,
    paths: SessionPaths,
    pending_print: Option<PendingComposite>,
}

pub struct SessionController {
    config: Config,
    input: InputReader,
    display: Box<dyn Display>,
    camera: Box<dyn Camera>,
    compositor: Box<dyn Compositor>,
    printer: Arc<dyn Printer + Send + Sync>,
    painter: OverlayPainter,
    sync: Option<CloudSync>,
    overlay: OverlaySlot,
    state: SessionState,
    session: Option<ActiveSession>,
    stats: BoothStats,
}

impl SessionController {
    pub fn new(config: Config, devices: Devices) -> Self {
        info!(
            "Booth ready: printer {}, printing {}, overlays {}",
            devices.printer.type_name(),
            config.booth.profile.printing,
            config.booth.profile.rich_overlays
        );
        SessionController {
            config,
            input: devices.input,
            display: devices.display,
            camera: devices.camera,
            compositor: devices.compositor,
            printer: devices.printer,
            painter: devices.painter,
            sync: devices.sync,
            overlay: OverlaySlot::new(),
            state: SessionState::Idle,
            session: None,
            stats: BoothStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> BoothStats {
        self.stats
    }

    /// Run the current state to completion and move to its successor.
    pub async fn step(&mut self) -> AppResult<SessionState> {
        let next = match self.state {
            SessionState::Idle => self.idle().await?,
            SessionState::ArmedForCapture => self.armed().await?,
            SessionState::Capturing => self.capturing().await?,
            SessionState::Composing => self.composing().await?,
            SessionState::ReviewingPrint => self.reviewing().await?,
            SessionState::Ending => self.ending().await?,
        };
        self.transition(next)?;
        Ok(next)
    }

    fn transition(&mut self, next: SessionState) -> AppResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        info!("{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// One visitor, from the home screen back to the home screen.
    pub async fn run_cycle(&mut self) -> AppResult<()> {
        let span = info_span!("session", id = %Uuid::new_v4());
        async {
            loop {
                if self.step().await? == SessionState::Idle {
                    return Ok::<(), AppError>(());
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Serve visitors until something fails.
    pub async fn run(&mut self) -> AppResult<()> {
        loop {
            self.run_cycle().await?;
        }
    }

    /// Release the camera and blank the screen. Failures are logged only.
    pub async fn teardown(&mut self) {
        info!("close everything");
        if let Err(e) = self.overlay.clear(self.camera.as_mut()).await {
            warn!("Failed to remove overlay: {}", e);
        }
        release_devices(self.camera.as_mut(), self.display.as_mut()).await;
    }

    async fn idle(&mut self) -> AppResult<SessionState> {
        self.display.show(&Screen::Home, None)?;
        self.input.wait_for_green().await?;
        info!("new cycle");
        Ok(SessionState::ArmedForCapture)
    }

    async fn armed(&mut self) -> AppResult<SessionState> {
        self.camera.start_preview().await?;
        if self.config.booth.profile.rich_overlays {
            let overlay = self.painter.instructions();
            self.overlay.replace(self.camera.as_mut(), overlay).await?;
        }
        self.input.wait_for_green().await?;
        Ok(SessionState::Capturing)
    }

    async fn capturing(&mut self) -> AppResult<SessionState> {
        let paths = SessionPaths::new(
            &self.config.photos_dir(),
            &self.config.toprint_dir(),
            Local::now(),
        );
        let mut captures = CaptureSet::new(&self.config.booth.working_dir);
        self.display.show(&Screen::Smile, None)?;

        while let Some((number, path)) = captures.next_frame() {
            let path = path.to_path_buf();
            self.countdown().await?;
            let caption = self
                .config
                .booth
                .profile
                .rich_overlays
                .then(|| Caption::large(format!("photo {} / {} !", number, FRAMES_PER_SESSION)));
            self.take_picture(&path, caption.as_ref()).await?;
            captures.mark_captured();
            debug!("Frame {} saved to {:?}", number, path);
            tokio::time::sleep(self.config.timing.capture_pause).await;
        }

        self.stop_preview().await?;
        let caption = if self.config.booth.profile.rich_overlays {
            Some(Caption::small("One moment please..."))
        } else {
            None
        };
        self.display.show(&Screen::Smile, caption.as_ref())?;

        self.session = Some(ActiveSession {
            captures,
            paths,
            pending_print: None,
        });
        Ok(SessionState::Composing)
    }

    async fn countdown(&mut self) -> AppResult<()> {
        for remaining in (1..=self.config.booth.countdown).rev() {
            let overlay = self.painter.countdown(remaining);
            self.overlay.replace(self.camera.as_mut(), overlay).await?;
            tokio::time::sleep(self.config.timing.countdown_tick).await;
        }
        Ok(())
    }

    /// The caption goes up once live view has stopped painting, so it stays
    /// on screen for the whole exposure.
    async fn take_picture(&mut self, path: &Path, caption: Option<&Caption>) -> AppResult<()> {
        self.stop_preview().await?;
        if caption.is_some() {
            self.display.show(&Screen::Smile, caption)?;
        }
        self.camera.capture(path).await?;
        self.camera.start_preview().await?;
        Ok(())
    }

    async fn stop_preview(&mut self) -> AppResult<()> {
        self.overlay.clear(self.camera.as_mut()).await?;
        self.camera.stop_preview().await?;
        Ok(())
    }

    async fn composing(&mut self) -> AppResult<SessionState> {
        let session = self
            .session
            .as_mut()
            .ok_or(AppError::NoActiveSession { state: self.state })?;
        let frames = session.captures.complete()?.to_vec();

        for dir in [self.config.photos_dir(), self.config.toprint_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|source| StorageError::CreateDirectoryFailed { path: dir, source })?;
        }

        let print_job = MontageJob::new(&frames, Layout::PRINT_STRIP, &session.paths.print);
        session.pending_print = Some(self.compositor.start(&print_job)?);

        let review_job = MontageJob::new(&frames, Layout::REVIEW_GRID, &session.paths.photo);
        let review = self.compositor.compose(&review_job).await?;
        info!("Images have been merged into {:?}", review);

        if let Some(sync) = &self.sync {
            sync.start(&review);
        }
        Ok(SessionState::ReviewingPrint)
    }

    async fn reviewing(&mut self) -> AppResult<SessionState> {
        let review = self
            .session
            .as_ref()
            .map(|s| s.paths.photo.clone())
            .ok_or(AppError::NoActiveSession { state: self.state })?;
        let printing = self.config.booth.profile.printing;
        self.display.show(&Screen::ShowToPrint { review, printing }, None)?;

        match self.input.next_event().await? {
            EdgeEvent::GreenReleased if printing => self.print().await?,
            EdgeEvent::GreenReleased => info!("Printing disabled, skipping print"),
            _ => info!("do not print the picture"),
        }
        Ok(SessionState::Ending)
    }

    async fn print(&mut self) -> AppResult<()> {
        info!("PRINT");
        self.display.show(&Screen::Printing, None)?;

        let session = self
            .session
            .as_mut()
            .ok_or(AppError::NoActiveSession { state: self.state })?;
        let pending = session
            .pending_print
            .take()
            .unwrap_or_else(|| PendingComposite::ready(session.paths.print.clone()));
        let strip = pending.wait().await?;

        match self.printer.print_photo(PrintJob::new(strip)).await {
            Ok(PrintOutcome::Submitted { job_id }) => {
                info!("Print job {} submitted", job_id);
                self.stats.prints_submitted += 1;
            }
            Ok(PrintOutcome::DeviceNotFound { name }) => {
                info!("Printer {} not found, nothing printed", name);
                self.stats.printer_missing += 1;
            }
            Err(e) => {
                warn!("Print failed: {}", e);
                self.stats.print_failures += 1;
            }
        }

        tokio::time::sleep(self.config.timing.print_hold).await;
        Ok(())
    }

    async fn ending(&mut self) -> AppResult<SessionState> {
        self.display.show(&Screen::End, None)?;
        self.input.wait_for_green().await?;
        self.session = None;
        self.stats.sessions += 1;
        Ok(SessionState::Idle)
    }
}

/// Stop and close the camera, then blank the display. Used on every exit
/// path, including a startup that failed halfway. Failures are logged only.
pub async fn release_devices(camera: &mut dyn Camera, display: &mut dyn Display) {
    if camera.is_previewing() {
        if let Err(e) = camera.stop_preview().await {
            warn!("Failed to stop preview: {}", e);
        }
    }
    if let Err(e) = camera.close().await {
        warn!("Failed to close camera: {}", e);
    }
    if let Err(e) = display.close() {
        warn!("Failed to close display: {}", e);
    }
}

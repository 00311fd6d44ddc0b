use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

/// Number of frames taken per session.
pub const FRAMES_PER_SESSION: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    ArmedForCapture,
    Capturing,
    Composing,
    ReviewingPrint,
    Ending,
}

impl SessionState {
    /// The only edges a session may take. Every state has exactly one
    /// successor; printing or skipping both lead from review to the end screen.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Idle, SessionState::ArmedForCapture)
                | (SessionState::ArmedForCapture, SessionState::Capturing)
                | (SessionState::Capturing, SessionState::Composing)
                | (SessionState::Composing, SessionState::ReviewingPrint)
                | (SessionState::ReviewingPrint, SessionState::Ending)
                | (SessionState::Ending, SessionState::Idle)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::ArmedForCapture => "armed",
            SessionState::Capturing => "capturing",
            SessionState::Composing => "composing",
            SessionState::ReviewingPrint => "reviewing",
            SessionState::Ending => "ending",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four frame files of one session, `1.jpg` to `4.jpg`.
///
/// Paths are fixed up front and overwritten by every session; the set only
/// tracks how many of them have been captured so far.
#[derive(Debug, Clone)]
pub struct CaptureSet {
    frames: [PathBuf; FRAMES_PER_SESSION],
    captured: usize,
}

impl CaptureSet {
    pub fn new(dir: &Path) -> Self {
        CaptureSet {
            frames: std::array::from_fn(|i| dir.join(format!("{}.jpg", i + 1))),
            captured: 0,
        }
    }

    /// Path of the next frame to capture, numbered from 1.
    pub fn next_frame(&self) -> Option<(usize, &Path)> {
        self.frames
            .get(self.captured)
            .map(|path| (self.captured + 1, path.as_path()))
    }

    pub fn mark_captured(&mut self) {
        if self.captured < FRAMES_PER_SESSION {
            self.captured += 1;
        }
    }

    pub fn captured(&self) -> usize {
        self.captured
    }

    pub fn is_complete(&self) -> bool {
        self.captured == FRAMES_PER_SESSION
    }

    /// All frame paths in capture order, once every frame exists.
    pub fn complete(&self) -> AppResult<&[PathBuf; FRAMES_PER_SESSION]> {
        if self.is_complete() {
            Ok(&self.frames)
        } else {
            Err(AppError::IncompleteCaptureSet {
                captured: self.captured,
            })
        }
    }
}

/// Where one session's composites end up.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub photo: PathBuf,
    pub print: PathBuf,
}

impl SessionPaths {
    pub fn new(photos_dir: &Path, toprint_dir: &Path, started_at: DateTime<Local>) -> Self {
        let file_name = Self::file_name(started_at);
        SessionPaths {
            photo: photos_dir.join(&file_name),
            print: toprint_dir.join(&file_name),
        }
    }

    pub fn file_name(started_at: DateTime<Local>) -> String {
        format!("{}.jpg", started_at.format("%Y%m%d-%H%M%S"))
    }
}

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionState;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Compositor error: {0}")]
    Compose(#[from] ComposeError),

    #[error("Printer error: {0}")]
    Printer(#[from] PrinterError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Capture set incomplete: {captured} of 4 frames captured")]
    IncompleteCaptureSet { captured: usize },

    #[error("No active session in state {state:?}")]
    NoActiveSession { state: SessionState },
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to export GPIO {pin}: {source}")]
    Export { pin: u32, source: io::Error },

    #[error("Failed to configure GPIO {pin}: {source}")]
    Configure { pin: u32, source: io::Error },

    #[error("Failed to read GPIO {pin}: {source}")]
    Read { pin: u32, source: io::Error },

    #[error("Unexpected GPIO level on pin {pin}: {value:?}")]
    InvalidLevel { pin: u32, value: String },

    #[error("Button source exhausted")]
    Exhausted,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("No camera detected")]
    NotDetected,

    #[error("Failed to run {command}: {source}")]
    CommandFailed { command: String, source: io::Error },

    #[error("Failed to start camera preview: {0}")]
    PreviewStart(String),

    #[error("Failed to capture frame: {0}")]
    CaptureError(String),

    #[error("Failed to process captured frame: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unknown overlay handle: {0}")]
    UnknownOverlay(u64),

    #[error("Camera I/O error: {0}")]
    IoError(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Failed to open framebuffer {device}: {source}")]
    FramebufferOpen { device: String, source: io::Error },

    #[error("Unsupported framebuffer depth: {bits} bits per pixel")]
    UnsupportedDepth { bits: u32 },

    #[error("Failed to read framebuffer attribute {attribute}: {details}")]
    Attribute { attribute: String, details: String },

    #[error("Failed to write framebuffer: {0}")]
    Write(#[from] io::Error),

    #[error("Failed to load review image {path}: {source}")]
    ReviewImage {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to load image {path}: {source}")]
    ImageLoadError {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Font loading error: {0}")]
    FontError(String),
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("Failed to wait for {program}: {source}")]
    Wait { program: String, source: io::Error },

    #[error("Montage needs at least one frame")]
    NoFrames,
}

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("Print job failed: {0}")]
    PrintFailed(String),

    #[error("Print file not found: {path}")]
    FileNotFound { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid dimensions for {name}: {width}x{height}")]
    InvalidDimensions {
        name: &'static str,
        width: u32,
        height: u32,
    },

    #[error("Countdown must start at 1 or more")]
    InvalidCountdown,

    #[error("Green and red buttons share GPIO {pin}")]
    DuplicatePin { pin: u32 },

    #[error("Unknown booth profile: {0}")]
    UnknownProfile(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed { path: PathBuf, source: io::Error },

    #[error("Failed to create log directory {path}: {source}")]
    LogDirectory { path: PathBuf, source: io::Error },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Hardware errors are the ones an attendant fixes by checking cables.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            AppError::Input(_) | AppError::Camera(_) | AppError::Display(_)
        )
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Input(_) => "input_error",
            AppError::Camera(_) => "camera_error",
            AppError::Display(_) => "display_error",
            AppError::Asset(_) => "asset_error",
            AppError::Compose(_) => "compose_error",
            AppError::Printer(_) => "printer_error",
            AppError::Config(_) => "config_error",
            AppError::Storage(_) => "storage_error",
            AppError::InvalidTransition { .. } => "transition_error",
            AppError::IncompleteCaptureSet { .. } => "capture_error",
            AppError::NoActiveSession { .. } => "session_error",
        }
    }
}

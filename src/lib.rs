// Library module organization

pub mod assets;
pub mod camera;
pub mod cloud_sync;
pub mod compositor;
pub mod config;
pub mod controller;
pub mod display;
pub mod errors;
pub mod framebuffer;
pub mod input;
pub mod logging;
pub mod mjpeg;
pub mod overlay;
pub mod printers;
pub mod session;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use config::Config;
pub use controller::{Devices, SessionController};
pub use errors::{AppError, AppResult};
pub use session::SessionState;

#[cfg(feature = "printer-cups")]
pub use printers::CupsPrinter;
pub use printers::{new_printer, MockPrinter, PrintJob, PrintOutcome, Printer, PrinterError};

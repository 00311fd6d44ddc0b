use async_trait::async_trait;
#[cfg(feature = "printer-cups")]
use printers::{common::base::job::PrinterJobOptions, get_printers};
use std::path::PathBuf;
#[cfg(feature = "printer-cups")]
use tracing::warn;
use tracing::info;

pub use crate::errors::PrinterError;

/// Job title shown in the CUPS queue.
pub const JOB_NAME: &str = "boothy";

#[derive(Debug, Clone)]
pub struct PrintJob {
    pub file_path: PathBuf,
    pub fit_to_page: bool,
}

impl PrintJob {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        PrintJob {
            file_path: file_path.into(),
            fit_to_page: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Submitted { job_id: String },
    /// The configured device is not installed; nothing was printed.
    DeviceNotFound { name: String },
}

// Printer trait
#[async_trait]
pub trait Printer: Send + Sync {
    async fn print_photo(&self, job: PrintJob) -> Result<PrintOutcome, PrinterError>;
    fn type_name(&self) -> &'static str;
}

/// A named CUPS queue, looked up again for every job so a printer plugged
/// in after startup is picked up.
#[cfg(feature = "printer-cups")]
pub struct CupsPrinter {
    printer_name: String,
}

#[cfg(feature = "printer-cups")]
impl CupsPrinter {
    /// Jobs are submitted under `user`; libcups reads it from `CUPS_USER`.
    pub fn new(printer_name: &str, user: &str) -> Self {
        info!(
            "Using CUPS printer '{}' as user '{}'",
            printer_name, user
        );
        std::env::set_var("CUPS_USER", user);
        CupsPrinter {
            printer_name: printer_name.to_string(),
        }
    }

    fn job_options(job: &PrintJob) -> Vec<(&'static str, String)> {
        let mut raw_properties = vec![("job-name", JOB_NAME.to_string())];
        if job.fit_to_page {
            raw_properties.push(("fit-to-page", "True".to_string()));
        }
        raw_properties
    }
}

#[cfg(feature = "printer-cups")]
#[async_trait]
impl Printer for CupsPrinter {
    async fn print_photo(&self, job: PrintJob) -> Result<PrintOutcome, PrinterError> {
        info!("Starting print job for {:?}", job.file_path);

        let printers = get_printers();
        let Some(printer) = printers
            .iter()
            .find(|p| p.name == self.printer_name || p.system_name == self.printer_name)
        else {
            info!("Printer not found: {}", self.printer_name);
            return Ok(PrintOutcome::DeviceNotFound {
                name: self.printer_name.clone(),
            });
        };

        if !job.file_path.exists() {
            return Err(PrinterError::FileNotFound {
                path: job.file_path.clone(),
            });
        }

        // Set proper permissions on the file for CUPS access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(mut perms) = std::fs::metadata(&job.file_path).map(|m| m.permissions()) {
                perms.set_mode(0o644);
                let _ = std::fs::set_permissions(&job.file_path, perms);
            }
        }

        let raw_properties = Self::job_options(&job);
        let raw_props: Vec<(&str, &str)> = raw_properties
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();

        let options = PrinterJobOptions {
            name: Some(JOB_NAME),
            raw_properties: &raw_props,
        };

        let file_path = job.file_path.to_string_lossy().to_string();

        // Success only means CUPS accepted the job, not that paper came out.
        match printer.print_file(&file_path, options) {
            Ok(job_id) => {
                info!("Print job submitted successfully with ID: {}", job_id);
                Ok(PrintOutcome::Submitted {
                    job_id: job_id.to_string(),
                })
            }
            Err(e) => {
                warn!("Print job failed: {}", e);
                Err(PrinterError::PrintFailed(format!("CUPS print error: {}", e)))
            }
        }
    }

    fn type_name(&self) -> &'static str {
        "CUPS"
    }
}

// Mock printer for bench testing without a printer attached
pub struct MockPrinter;

#[async_trait]
impl Printer for MockPrinter {
    async fn print_photo(&self, job: PrintJob) -> Result<PrintOutcome, PrinterError> {
        info!("Mock printing {:?}", job.file_path);
        let job_id = format!("mock-job-{}", chrono::Utc::now().timestamp());
        Ok(PrintOutcome::Submitted { job_id })
    }

    fn type_name(&self) -> &'static str {
        "Mock Printer"
    }
}

// Factory function to create appropriate printer instance
#[cfg(feature = "printer-cups")]
pub fn new_printer(
    config: &crate::config::PrinterConfig,
) -> std::sync::Arc<dyn Printer + Send + Sync> {
    if config.use_mock {
        info!("Using mock printer");
        return std::sync::Arc::new(MockPrinter);
    }
    std::sync::Arc::new(CupsPrinter::new(&config.name, &config.user))
}

#[cfg(not(feature = "printer-cups"))]
pub fn new_printer(
    _config: &crate::config::PrinterConfig,
) -> std::sync::Arc<dyn Printer + Send + Sync> {
    // When CUPS feature is not enabled, always use mock printer
    info!("CUPS support not compiled in, using mock printer");
    std::sync::Arc::new(MockPrinter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_printer_submits() {
        let outcome = MockPrinter
            .print_photo(PrintJob::new("toprint/a.jpg"))
            .await
            .unwrap();
        assert!(matches!(outcome, PrintOutcome::Submitted { .. }));
    }

    #[test]
    fn test_jobs_fit_to_page_by_default() {
        assert!(PrintJob::new("a.jpg").fit_to_page);
    }

    #[cfg(feature = "printer-cups")]
    #[test]
    fn test_job_options() {
        let options = CupsPrinter::job_options(&PrintJob::new("a.jpg"));
        assert!(options.contains(&("job-name", "boothy".to_string())));
        assert!(options.contains(&("fit-to-page", "True".to_string())));
    }
}

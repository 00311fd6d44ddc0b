use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::StorageError;

/// Console output plus two files per day under `dir`: everything at debug
/// level, and errors only.
///
/// The returned guards flush the file writers and must be held until exit.
pub fn init_logging(dir: &Path) -> Result<Vec<WorkerGuard>, StorageError> {
    std::fs::create_dir_all(dir).map_err(|source| StorageError::LogDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let day = chrono::Local::now().format("%Y%m%d").to_string();
    let (debug_writer, debug_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, format!("{}_debug.log", day)));
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, format!("{}_error.log", day)));

    let console = fmt::layer().with_target(false).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    let debug_file = fmt::layer()
        .with_ansi(false)
        .with_writer(debug_writer)
        .with_filter(LevelFilter::DEBUG);
    let error_file = fmt::layer()
        .with_ansi(false)
        .with_writer(error_writer)
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console)
        .with(debug_file)
        .with(error_file)
        .init();

    Ok(vec![debug_guard, error_guard])
}

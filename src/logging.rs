use std::path::Path;

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;

const LOG_FILE_BASENAME: &str = "classroomd";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

static LOGGER: OnceCell<LoggerHandle> = OnceCell::new();

/// Starts rolling file logs under `<workspace>/logs`. Best-effort and
/// idempotent: a second call (or a failure to start) must not prevent the
/// workspace from opening. stdout stays reserved for the IPC protocol.
pub fn init(workspace: &Path) {
    if LOGGER.get().is_some() {
        return;
    }
    let log_dir = workspace.join("logs");
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    let started = Logger::try_with_env_or_str("info").and_then(|logger| {
        logger
            .log_to_file(
                FileSpec::default()
                    .directory(&log_dir)
                    .basename(LOG_FILE_BASENAME),
            )
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .start()
    });
    if let Ok(handle) = started {
        if LOGGER.set(handle).is_ok() {
            info!(
                "classroomd {} logging to {}",
                env!("CARGO_PKG_VERSION"),
                log_dir.display()
            );
        }
    }
}

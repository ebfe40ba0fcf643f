//! Logging initialization and startup diagnostics.
//!
//! The core logs through the `log` facade; this module wires up the
//! default console + file backend for callers that don't bring their own.

use anyhow::Result;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;

use crate::core::config::SupervisorConfig;
use crate::download::cookies::CookieStore;
use crate::download::platform::Browser;

/// Initialize logging to both the console and a file.
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file =
        File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Log the resolved tool paths and cookie availability at startup.
///
/// Purely informational; missing binaries are reported again, as typed
/// errors, when a download is actually submitted.
pub fn log_startup_diagnostics(config: &SupervisorConfig, cookies: &dyn CookieStore) {
    log::info!("Binary directory: {}", config.bin_dir.display());
    log::info!("Downloader: {}", config.tool_bin.display());
    log::info!("Encoder: {}", config.ffmpeg_bin.display());

    if !config.tool_bin.exists() {
        log::error!("Downloader binary not found at {}", config.tool_bin.display());
    }
    if !config.ffmpeg_bin.exists() {
        log::warn!("Encoder binary not found at {}", config.ffmpeg_bin.display());
    }

    if cookies.is_available(Browser::Firefox) {
        log::info!("✅ Firefox cookies found; login-gated platforms should work");
    } else {
        log::warn!("⚠️  No Firefox cookies found; login-gated platforms will be rejected");
    }
}

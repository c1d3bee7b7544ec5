// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway configuration, loaded from the environment once at startup.
//!
//! All components receive the loaded [`Config`] by reference and treat it
//! as immutable. Malformed values are a startup error, never a silent
//! fallback to the default.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Immutable gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP surface listens on.
    pub webserver_port: u16,
    /// Maximum accepted upload size in bytes (input plus resources).
    pub max_file_size: usize,
    /// Maximum simultaneous conversions; also the office worker count.
    pub max_concurrent_jobs: usize,
    /// Maximum jobs admitted but not yet dispatched.
    pub max_queued_jobs: usize,
    /// Maximum `resources` files per request.
    pub max_resource_count: usize,
    /// Restart attempts before a subsystem fails permanently.
    pub max_restarts: u32,
    /// Pause between a backend exit and the next start attempt.
    pub restart_delay: Duration,
    /// Hard deadline for a single conversion, any backend.
    pub pdf_render_timeout: Duration,
    /// Deadline for the browser to come up.
    pub browser_launch_timeout: Duration,
    /// Interval between scheduled browser restarts.
    pub browser_restart_interval: Duration,
    /// Deadline for an office worker's pid file and profile dir to appear.
    pub office_launch_timeout: Duration,
    /// First office worker port; workers occupy a contiguous range above it.
    pub unoserver_base_port: u16,
    /// Explicit Chromium executable; autodetected when unset.
    pub chromium_bin: Option<PathBuf>,
    /// Office worker daemon executable.
    pub unoserver_bin: PathBuf,
    /// Per-request office transport executable.
    pub unoconvert_bin: PathBuf,
    /// Markup converter executable; markup conversion is disabled when unset.
    pub pandoc_bin: Option<PathBuf>,
    /// PDF engine handed to the markup converter.
    pub pandoc_pdf_engine: String,
    /// Temp root for worker pid files, profile dirs, and browser data dirs.
    pub tmp_dir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// The uptime a backend must survive before its restart count resets.
    pub fn restart_window(&self) -> Duration {
        self.restart_delay * (self.max_restarts * 2)
    }

    /// Office worker ports, in stable dispatch order.
    pub fn office_ports(&self) -> Vec<u16> {
        (0..self.max_concurrent_jobs as u16)
            .map(|i| self.unoserver_base_port + i)
            .collect()
    }

    /// Whether markup conversion is configured.
    pub fn markup_enabled(&self) -> bool {
        self.pandoc_bin.is_some()
    }

    /// Build a config from an arbitrary variable lookup (injectable for tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            webserver_port: parse_or(&get, "WEBSERVER_PORT", 8080)?,
            max_file_size: parse_or(&get, "MAX_FILE_SIZE", 128 * 1024 * 1024)?,
            max_concurrent_jobs: parse_or(&get, "MAX_CONCURRENT_JOBS", 6)?,
            max_queued_jobs: parse_or(&get, "MAX_QUEUED_JOBS", 128)?,
            max_resource_count: parse_or(&get, "MAX_RESOURCE_COUNT", 16)?,
            max_restarts: parse_or(&get, "MAX_RESTARTS", 3)?,
            restart_delay: millis_or(&get, "RESTART_DELAY", 5_000)?,
            pdf_render_timeout: millis_or(&get, "PDF_RENDER_TIMEOUT", 150_000)?,
            browser_launch_timeout: millis_or(&get, "BROWSER_LAUNCH_TIMEOUT", 30_000)?,
            browser_restart_interval: millis_or(&get, "BROWSER_RESTART_INTERVAL", 86_400_000)?,
            office_launch_timeout: millis_or(&get, "OFFICE_LAUNCH_TIMEOUT", 30_000)?,
            unoserver_base_port: parse_or(&get, "UNOSERVER_BASE_PORT", 2003)?,
            chromium_bin: get("CHROMIUM_BIN").map(PathBuf::from),
            unoserver_bin: get("UNOSERVER_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("unoserver")),
            unoconvert_bin: get("UNOCONVERT_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("unoconvert")),
            pandoc_bin: get("PANDOC_BIN").map(PathBuf::from),
            pandoc_pdf_engine: get("PANDOC_PDF_ENGINE")
                .unwrap_or_else(|| "weasyprint".to_string()),
            tmp_dir: get("TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

fn millis_or(
    get: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    parse_or(get, name, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

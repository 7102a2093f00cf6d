// Shared utility functions for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use wayback_fallback::Settings;

/// Build settings from the environment, an optional settings file, and CLI overrides
///
/// Precedence: CLI flags > environment > settings file.
pub fn load_settings(file: Option<&Path>, archive_url: Option<String>) -> Result<Settings> {
    let from_file = match file {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let from_env = Settings::from_env().context("Invalid WAYBACK_MACHINE_* environment")?;

    let mut settings = from_file.merge(from_env);
    if archive_url.is_some() {
        settings.url = archive_url;
    }

    log::debug!("Effective settings: {:?}", settings);
    Ok(settings)
}

/// Create a tokio runtime for async operations
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create tokio runtime")
}

/// Format a capture time for humans
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "-".to_string(),
    }
}

/// Shorten long text for single-line display
pub fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

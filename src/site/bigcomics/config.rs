//! BigComics module configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationError, ensure_not_blank, ensure_positive};

/// Default directory that receives downloaded episodes.
pub const DEFAULT_OUTPUT_DIR: &str = "output/bigcomics";

/// Default browser profile directory, relative to the cache directory.
pub const DEFAULT_USER_DATA_DIR: &str = "chromium_profile";

/// Default page-load and element wait timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default viewport width in CSS pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 400;

/// Default viewport height in CSS pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 800;

/// Default desktop Chrome user agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

/// `[bigcomics]` table as written in the config file.
///
/// Every key is optional and numeric keys are signed so that negative values
/// reach validation instead of failing as a type error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BigComicsSection {
    pub output_dir: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub timeout_ms: Option<i64>,
    pub viewport_width: Option<i64>,
    pub viewport_height: Option<i64>,
    pub user_agent: Option<String>,
}

/// Validated BigComics configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BigComicsConfig {
    /// Directory receiving `<series>/<date>_<title>/NNN.png`.
    pub output_dir: PathBuf,
    /// Browser profile directory; relative paths live under the cache directory.
    pub user_data_dir: PathBuf,
    /// Page-load and element wait timeout in milliseconds.
    pub timeout_ms: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
}

impl Default for BigComicsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            user_data_dir: PathBuf::from(DEFAULT_USER_DATA_DIR),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl BigComicsConfig {
    /// Applies defaults to absent keys and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for non-positive timeout or viewport
    /// dimensions and for a blank user agent.
    pub fn from_section(section: BigComicsSection) -> Result<Self, ValidationError> {
        let defaults = Self::default();

        let timeout_ms = positive_u64(
            "bigcomics.timeout_ms",
            section.timeout_ms,
            defaults.timeout_ms,
        )?;
        let viewport_width = positive_u32(
            "bigcomics.viewport_width",
            section.viewport_width,
            defaults.viewport_width,
        )?;
        let viewport_height = positive_u32(
            "bigcomics.viewport_height",
            section.viewport_height,
            defaults.viewport_height,
        )?;

        let user_agent = section.user_agent.unwrap_or(defaults.user_agent);
        ensure_not_blank("bigcomics.user_agent", &user_agent)?;

        Ok(Self {
            output_dir: section.output_dir.unwrap_or(defaults.output_dir),
            user_data_dir: section.user_data_dir.unwrap_or(defaults.user_data_dir),
            timeout_ms,
            viewport_width,
            viewport_height,
            user_agent,
        })
    }

    /// Returns the timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn positive_u64(field: &str, value: Option<i64>, default: u64) -> Result<u64, ValidationError> {
    let Some(value) = value else {
        return Ok(default);
    };
    ensure_positive(field, value)?;
    u64::try_from(value).map_err(|_| ValidationError::not_positive(field, value))
}

fn positive_u32(field: &str, value: Option<i64>, default: u32) -> Result<u32, ValidationError> {
    let Some(value) = value else {
        return Ok(default);
    };
    ensure_positive(field, value)?;
    u32::try_from(value).map_err(|_| ValidationError::NotAllowed {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("1..={}", u32::MAX),
    })
}

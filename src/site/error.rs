//! Error types for site downloads.

use std::path::PathBuf;

use thiserror::Error;

use crate::browser::BrowserError;
use crate::db::DbError;

use super::DownloadPhase;

/// Errors that can occur while downloading from a site.
///
/// Every variant knows the [`DownloadPhase`] it was raised in.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The page or an expected element did not load within the configured timeout.
    #[error("timed out after {timeout_ms}ms during {phase} for '{url}'")]
    Timeout {
        /// Phase that timed out.
        phase: DownloadPhase,
        /// Page being loaded.
        url: String,
        /// Budget that was exceeded.
        timeout_ms: u64,
    },

    /// The browser layer failed.
    #[error("browser failure during {phase}: {source}")]
    Browser {
        /// Phase in which the browser failed.
        phase: DownloadPhase,
        /// Underlying browser error.
        #[source]
        source: BrowserError,
    },

    /// The page loaded but expected content was absent.
    #[error("missing {what} on '{url}'")]
    ContentMissing {
        /// Page that lacked the content.
        url: String,
        /// What was expected (e.g. `series title`).
        what: String,
    },

    /// The site showed its rate-limit page.
    #[error("rate limit reached on '{url}'\n  Suggestion: wait a few minutes and try again")]
    RateLimited {
        /// Page that was rate limited.
        url: String,
    },

    /// The content requires a signed-in session.
    #[error("authentication required for '{url}'\n  Suggestion: run `grabber ebook login` and sign in")]
    AuthRequired {
        /// Page that asked for sign-in.
        url: String,
    },

    /// The URL belongs to the site but does not point at downloadable content.
    #[error("unrecognized path in '{url}': {reason}")]
    UnrecognizedPath {
        /// Offending URL.
        url: String,
        /// Why it was not recognized.
        reason: String,
    },

    /// Writing output failed.
    #[error("failed to write '{}': {source}", path.display())]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing persisted session state failed.
    #[error("session store failure during {phase}: {source}")]
    Store {
        /// Phase in which the store failed.
        phase: DownloadPhase,
        /// Underlying database error.
        #[source]
        source: DbError,
    },
}

impl DownloadError {
    /// Maps a browser error, turning element-wait timeouts into [`DownloadError::Timeout`].
    #[must_use]
    pub fn from_browser(phase: DownloadPhase, url: &str, source: BrowserError) -> Self {
        match source {
            BrowserError::Timeout { timeout, .. } => Self::Timeout {
                phase,
                url: url.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            source => Self::Browser { phase, source },
        }
    }

    /// Creates a `ContentMissing` error.
    #[must_use]
    pub fn content_missing(url: &str, what: &str) -> Self {
        Self::ContentMissing {
            url: url.to_string(),
            what: what.to_string(),
        }
    }

    /// Returns the phase the download was in when this error was raised.
    #[must_use]
    pub fn phase(&self) -> DownloadPhase {
        match self {
            Self::Timeout { phase, .. } | Self::Browser { phase, .. } | Self::Store { phase, .. } => {
                *phase
            }
            Self::ContentMissing { .. } => DownloadPhase::ContentExtracting,
            Self::RateLimited { .. } | Self::AuthRequired { .. } => DownloadPhase::PageLoading,
            Self::UnrecognizedPath { .. } => DownloadPhase::Idle,
            Self::Io { .. } => DownloadPhase::Writing,
        }
    }
}

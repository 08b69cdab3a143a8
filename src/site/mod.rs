//! Site-specific downloaders and their dispatch registry.
//!
//! # Architecture
//!
//! - [`SiteDownloader`] - Async trait each site module implements
//! - [`SiteRegistry`] - Ordered collection; the first site accepting a URL wins
//! - [`DownloadPhase`] - Per-download state machine shared by site modules
//! - [`DownloadError`] - Failures surfaced to the caller, tagged with their phase
//! - [`bigcomics`] - BigComics episode and series downloader

pub mod bigcomics;
mod error;
mod filename;
mod registry;

pub use error::DownloadError;
pub use registry::SiteRegistry;

use std::fmt;

use async_trait::async_trait;

/// Stage of a single download.
///
/// `Idle → SessionStarting → PageLoading → ContentExtracting → Writing → Done`,
/// with `Failed` reachable from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadPhase {
    Idle,
    SessionStarting,
    PageLoading,
    ContentExtracting,
    Writing,
    Done,
    Failed,
}

impl DownloadPhase {
    /// Returns the stable label used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SessionStarting => "session_starting",
            Self::PageLoading => "page_loading",
            Self::ContentExtracting => "content_extracting",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if `next` is a legal transition from `self`.
    #[must_use]
    pub fn can_advance_to(self, next: DownloadPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        matches!(
            (self, next),
            (Self::Idle, Self::SessionStarting)
                | (Self::SessionStarting, Self::PageLoading)
                | (Self::PageLoading, Self::ContentExtracting)
                | (Self::ContentExtracting, Self::Writing)
                | (Self::Writing, Self::Done)
        )
    }
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloader for one source website.
///
/// # Object Safety
///
/// Uses `async_trait` so registries can hold `Box<dyn SiteDownloader>`.
#[async_trait]
pub trait SiteDownloader: Send + Sync {
    /// Short module name as used in `ebook.sites` (e.g. `"bigcomics"`).
    fn name(&self) -> &str;

    /// Returns true if this site can handle `url`. Pure.
    fn validate_url(&self, url: &str) -> bool;

    /// Downloads everything `url` points at into the configured output directory.
    async fn download(&self, url: &str) -> Result<(), DownloadError>;
}

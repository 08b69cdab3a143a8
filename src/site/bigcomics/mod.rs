//! BigComics (bigcomics.jp) downloader.
//!
//! Episodes are rendered into `<canvas>` elements by the site's viewer, so
//! pages are captured from a real browser rather than fetched over HTTP.
//!
//! - `/episodes/{id}` downloads one episode
//! - `/series/{id}` downloads every listed episode in order

mod config;
mod parse;
mod repository;

pub use config::{
    BigComicsConfig, BigComicsSection, DEFAULT_OUTPUT_DIR, DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT,
    DEFAULT_USER_DATA_DIR, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
};
pub use repository::{BigComicsRepository, EpisodeReport, episode_url, series_page_url};

use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use url::Url;

use parse::{ContentPath, classify_path};

use super::{DownloadError, SiteDownloader};

/// Host accepted by [`BigComicsUseCase::validate_url`].
pub const HOST: &str = "bigcomics.jp";

/// Module name used in `ebook.sites`.
pub const SITE_NAME: &str = "bigcomics";

/// Pause between consecutive episodes of a series.
pub const DEFAULT_EPISODE_PAUSE: Duration = Duration::from_secs(1);

/// Site use case for bigcomics.jp.
pub struct BigComicsUseCase {
    repo: BigComicsRepository,
    episode_pause: Duration,
}

impl BigComicsUseCase {
    /// Creates the use case around its repository.
    #[must_use]
    pub fn new(repo: BigComicsRepository) -> Self {
        Self {
            repo,
            episode_pause: DEFAULT_EPISODE_PAUSE,
        }
    }

    /// Overrides the pause between series episodes.
    #[must_use]
    pub fn with_episode_pause(mut self, pause: Duration) -> Self {
        self.episode_pause = pause;
        self
    }

    /// The underlying repository.
    #[must_use]
    pub fn repository(&self) -> &BigComicsRepository {
        &self.repo
    }

    /// Opens a visible browser for interactive sign-in and saves the session.
    ///
    /// # Errors
    ///
    /// See [`BigComicsRepository::login`].
    pub async fn login(&self) -> Result<(), DownloadError> {
        self.repo.login().await
    }

    async fn download_series(&self, series_id: &str) -> Result<(), DownloadError> {
        let episode_ids = self.repo.fetch_series(series_id).await?;
        let total = episode_ids.len();
        info!(series_id, episodes = total, "Downloading series");

        let progress = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
        progress.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        for (index, episode_id) in episode_ids.iter().enumerate() {
            progress.set_message(episode_id.clone());
            let result = self.repo.fetch_episode(episode_id).await;
            progress.inc(1);
            if let Err(err) = result {
                progress.abandon();
                return Err(err);
            }
            if index + 1 < total && !self.episode_pause.is_zero() {
                tokio::time::sleep(self.episode_pause).await;
            }
        }
        progress.finish_and_clear();
        Ok(())
    }
}

#[async_trait]
impl SiteDownloader for BigComicsUseCase {
    fn name(&self) -> &str {
        SITE_NAME
    }

    fn validate_url(&self, url: &str) -> bool {
        let valid = Url::parse(url)
            .ok()
            .is_some_and(|parsed| parsed.host_str() == Some(HOST));
        if valid {
            info!(url, "URL accepted by bigcomics");
        } else {
            debug!(url, "URL rejected by bigcomics");
        }
        valid
    }

    async fn download(&self, url: &str) -> Result<(), DownloadError> {
        info!(url, "Starting bigcomics download");
        let parsed = Url::parse(url).map_err(|err| DownloadError::UnrecognizedPath {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        match classify_path(parsed.path()) {
            Some(ContentPath::Episode(episode_id)) => {
                self.repo.fetch_episode(&episode_id).await?;
                Ok(())
            }
            Some(ContentPath::Series(series_id)) => self.download_series(&series_id).await,
            None => Err(DownloadError::UnrecognizedPath {
                url: url.to_string(),
                reason: "expected /episodes/{id} or /series/{id}".to_string(),
            }),
        }
    }
}

//! Browser-driven access to bigcomics.jp.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::auth::CookieStore;
use crate::browser::{BrowserError, BrowserLauncher, BrowserPage, LaunchSettings};
use crate::db::{DATABASE_FILE, Database, DbError};
use crate::site::filename::{page_file_name, sanitize_path_component};
use crate::site::{DownloadError, DownloadPhase};

use super::config::BigComicsConfig;
use super::parse::{decode_data_url, episode_id_from_href, parse_page_number, parse_publish_date};

const SITE_ROOT: &str = "https://bigcomics.jp/";
const SIGNIN_URL: &str = "https://bigcomics.jp/signin";

/// Chromium renders canvases at twice the CSS size so captured pages stay sharp.
const DEVICE_SCALE_FACTOR: f64 = 2.0;

/// Stop following `a.next-page` after this many listing pages.
const MAX_SERIES_PAGES: usize = 200;

const SERIES_TITLE: &str = ".series-h-title span";
const RATE_LIMIT_BANNER: &str = ".error-title";
const TITLE_OR_RATE_LIMIT: &str = ".series-h-title span, .error-title";
const PURCHASE_BOX: &str = ".charge-box-inner";
const PAGE_TOTAL: &str = "#sliderTooltip .-cv-f-page-total";
const PAGE_CURRENT: &str = ".-cv-f-page-current";
const ARTICLE_TITLE: &str = ".article-title";
const PUBLISH_DATE: &str = ".publish-date";
const VIEWER_PAGES: &str = "#xCVPages";
const VIEWER_PAGE: &str = "#xCVPages .-cv-page";
const EPISODE_LIST: &str = ".series-ep-list";
const EPISODE_LINK: &str = "a.article-ep-list-item-img-link";
const NEXT_PAGE: &str = "a.next-page";
const BOOKSHELF_ICON: &str = ".g-icon-bookshelf";

/// Viewer key that moves towards page 1 (right-to-left reading order).
const KEY_PREVIOUS: &str = "ArrowRight";
const KEY_NEXT: &str = "ArrowLeft";

/// Returns the viewer URL for an episode.
#[must_use]
pub fn episode_url(episode_id: &str) -> String {
    format!("https://bigcomics.jp/episodes/{episode_id}/")
}

/// Returns the URL of one page of a series' episode listing (0-based).
#[must_use]
pub fn series_page_url(series_id: &str, page: usize) -> String {
    format!("https://bigcomics.jp/series/{series_id}/pagingList?s=2&page={page}&limit=50")
}

/// Outcome of one episode download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeReport {
    /// `<output_dir>/<series>/<YYYY-MM-DD>_<article>`.
    pub directory: PathBuf,
    /// Pages written by this run.
    pub written: usize,
    /// Pages already present on disk.
    pub skipped: usize,
}

/// Everything captured from the viewer before anything touches the disk.
struct EpisodeContent {
    directory: PathBuf,
    pages: BTreeMap<usize, Vec<u8>>,
}

/// Tracks and logs the phase of one episode download.
struct PhaseTracker<'a> {
    episode_id: &'a str,
    phase: DownloadPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(episode_id: &'a str) -> Self {
        Self {
            episode_id,
            phase: DownloadPhase::Idle,
        }
    }

    fn advance(&mut self, next: DownloadPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal phase transition {} -> {next}",
            self.phase
        );
        debug!(
            episode_id = self.episode_id,
            from = %self.phase,
            to = %next,
            "Download phase changed"
        );
        self.phase = next;
    }
}

/// Fetches episodes and series listings from bigcomics.jp.
///
/// Every operation runs in its own browser session. Persisted cookies are
/// replayed when a session starts and written back when it ends, on success
/// and on failure alike.
pub struct BigComicsRepository {
    launcher: Arc<dyn BrowserLauncher>,
    settings: LaunchSettings,
    output_dir: PathBuf,
    db_path: PathBuf,
    store: OnceCell<CookieStore>,
}

impl BigComicsRepository {
    /// Creates a repository; the browser profile and cookie database live
    /// under `cache_dir`. Nothing is opened until the first operation.
    #[must_use]
    pub fn new(config: &BigComicsConfig, cache_dir: &Path, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            settings: LaunchSettings {
                user_data_dir: cache_dir.join(&config.user_data_dir),
                viewport_width: config.viewport_width,
                viewport_height: config.viewport_height,
                user_agent: config.user_agent.clone(),
                timeout: config.timeout(),
                device_scale_factor: DEVICE_SCALE_FACTOR,
                headless: true,
            },
            output_dir: config.output_dir.clone(),
            db_path: cache_dir.join(DATABASE_FILE),
            store: OnceCell::new(),
        }
    }

    /// Settings used for headless sessions.
    #[must_use]
    pub fn launch_settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Root directory for downloaded episodes.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Location of the cookie database.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Downloads every page of one episode.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] tagged with the phase that failed. Nothing is
    /// written unless extraction completed.
    #[instrument(skip(self), fields(url = %episode_url(episode_id)))]
    pub async fn fetch_episode(&self, episode_id: &str) -> Result<EpisodeReport, DownloadError> {
        let url = episode_url(episode_id);
        let mut tracker = PhaseTracker::new(episode_id);

        let result = self.run_episode(&url, &mut tracker).await;
        match &result {
            Ok(report) => {
                tracker.advance(DownloadPhase::Done);
                info!(
                    directory = %report.directory.display(),
                    written = report.written,
                    skipped = report.skipped,
                    "Episode downloaded"
                );
            }
            Err(err) => {
                tracker.advance(DownloadPhase::Failed);
                warn!(phase = %err.phase(), error = %err, "Episode download failed");
            }
        }
        result
    }

    /// Lists a series' episode ids in listing order, following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the session cannot start or a listing
    /// page does not load.
    #[instrument(skip(self))]
    pub async fn fetch_series(&self, series_id: &str) -> Result<Vec<String>, DownloadError> {
        let mut page = self.open_session(true).await?;
        let listed = self.list_episodes(page.as_mut(), series_id).await;
        let closed = self.close_session(page, DownloadPhase::PageLoading).await;
        let ids = finish_session(listed, closed)?;
        info!(episodes = ids.len(), "Series listing complete");
        Ok(ids)
    }

    /// Opens a visible browser at the sign-in page and waits, without a
    /// timeout, until the signed-in bookshelf icon appears.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the browser cannot start, the sign-in
    /// page does not load, or cookies cannot be persisted.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<(), DownloadError> {
        let mut page = self.open_session(false).await?;
        info!(url = SIGNIN_URL, "Sign in using the opened browser window");
        let signed_in = self.wait_for_sign_in(page.as_mut()).await;
        let closed = self.close_session(page, DownloadPhase::PageLoading).await;
        finish_session(signed_in, closed)?;
        info!("Sign-in complete; session cookies saved");
        Ok(())
    }

    async fn run_episode(
        &self,
        url: &str,
        tracker: &mut PhaseTracker<'_>,
    ) -> Result<EpisodeReport, DownloadError> {
        tracker.advance(DownloadPhase::SessionStarting);
        let mut page = self.open_session(true).await?;

        let extracted = self.extract_episode(page.as_mut(), url, tracker).await;
        let closed = self.close_session(page, tracker.phase).await;
        let content = finish_session(extracted, closed)?;

        tracker.advance(DownloadPhase::Writing);
        write_pages(&content).await
    }

    async fn extract_episode(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        tracker: &mut PhaseTracker<'_>,
    ) -> Result<EpisodeContent, DownloadError> {
        tracker.advance(DownloadPhase::PageLoading);
        let phase = DownloadPhase::PageLoading;
        self.bounded(phase, url, page.goto(url)).await?;
        page.wait_for(TITLE_OR_RATE_LIMIT, Some(self.settings.timeout))
            .await
            .map_err(|e| DownloadError::from_browser(phase, url, e))?;
        if self.bounded(phase, url, page.is_visible(RATE_LIMIT_BANNER)).await? {
            return Err(DownloadError::RateLimited {
                url: url.to_string(),
            });
        }
        if self
            .bounded(phase, url, page.inner_text(PURCHASE_BOX))
            .await?
            .is_some()
        {
            return Err(DownloadError::AuthRequired {
                url: url.to_string(),
            });
        }

        tracker.advance(DownloadPhase::ContentExtracting);
        let series_title = self.required_text(page, url, SERIES_TITLE, "series title").await?;
        let page_total = self
            .required_text(page, url, PAGE_TOTAL, "page total")
            .await
            .and_then(|text| {
                parse_page_number(&text)
                    .filter(|total| *total > 0)
                    .ok_or_else(|| DownloadError::content_missing(url, "page total"))
            })?;
        let article_title = self.required_text(page, url, ARTICLE_TITLE, "article title").await?;
        let publish_date = self
            .required_text(page, url, PUBLISH_DATE, "publish date")
            .await
            .and_then(|text| {
                parse_publish_date(&text).ok_or_else(|| DownloadError::content_missing(url, "publish date"))
            })?;

        let directory = self
            .output_dir
            .join(sanitize_path_component(&series_title, "untitled"))
            .join(format!(
                "{publish_date}_{}",
                sanitize_path_component(&article_title, "untitled")
            ));
        debug!(
            series = %series_title,
            article = %article_title,
            page_total,
            "Episode metadata read"
        );

        self.rewind_viewer(page, url, page_total).await?;
        let pages = self.capture_pages(page, url, page_total).await?;
        if let Some(missing) = first_missing_page(&pages, page_total) {
            warn!(page = missing, captured = pages.len(), page_total, "Viewer page never rendered");
            return Err(DownloadError::content_missing(url, &format!("page {missing}")));
        }
        Ok(EpisodeContent { directory, pages })
    }

    /// Waits for `selector` and returns its non-blank text.
    async fn required_text(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        selector: &str,
        what: &str,
    ) -> Result<String, DownloadError> {
        let phase = DownloadPhase::ContentExtracting;
        page.wait_for(selector, Some(self.settings.timeout))
            .await
            .map_err(|e| DownloadError::from_browser(phase, url, e))?;
        self.bounded(phase, url, page.inner_text(selector))
            .await?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| DownloadError::content_missing(url, what))
    }

    async fn current_page(&self, page: &mut dyn BrowserPage, url: &str) -> Result<Option<usize>, DownloadError> {
        let phase = DownloadPhase::ContentExtracting;
        page.wait_for(PAGE_CURRENT, Some(self.settings.timeout))
            .await
            .map_err(|e| DownloadError::from_browser(phase, url, e))?;
        Ok(self
            .bounded(phase, url, page.inner_text(PAGE_CURRENT))
            .await?
            .as_deref()
            .and_then(parse_page_number))
    }

    /// Moves the viewer back to page 1; it may open at a bookmarked page.
    async fn rewind_viewer(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        page_total: usize,
    ) -> Result<(), DownloadError> {
        for _ in 1..page_total {
            self.bounded(DownloadPhase::ContentExtracting, url, page.press_key(KEY_PREVIOUS))
                .await?;
            if self.current_page(page, url).await? == Some(1) {
                break;
            }
        }
        Ok(())
    }

    /// Pages forward to the last page, keeping the first capture of every canvas.
    async fn capture_pages(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        page_total: usize,
    ) -> Result<BTreeMap<usize, Vec<u8>>, DownloadError> {
        let phase = DownloadPhase::ContentExtracting;
        let mut pages = BTreeMap::new();
        self.collect_canvases(page, url, &mut pages).await?;

        for _ in 1..page_total {
            self.bounded(phase, url, page.press_key(KEY_NEXT)).await?;
            page.wait_for(VIEWER_PAGES, Some(self.settings.timeout))
                .await
                .map_err(|e| DownloadError::from_browser(phase, url, e))?;
            self.collect_canvases(page, url, &mut pages).await?;
            if self.current_page(page, url).await? == Some(page_total) {
                break;
            }
        }
        debug!(captured = pages.len(), page_total, "Viewer pages captured");
        Ok(pages)
    }

    async fn collect_canvases(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        pages: &mut BTreeMap<usize, Vec<u8>>,
    ) -> Result<(), DownloadError> {
        let data_urls = self
            .bounded(DownloadPhase::ContentExtracting, url, page.canvas_data_urls(VIEWER_PAGE))
            .await?;
        for (offset, data_url) in data_urls.into_iter().enumerate() {
            let index = offset + 1;
            if pages.contains_key(&index) {
                continue;
            }
            let Some(data_url) = data_url else {
                continue;
            };
            match decode_data_url(&data_url) {
                Some(bytes) => {
                    debug!(page = index, bytes = bytes.len(), "Captured viewer page");
                    pages.insert(index, bytes);
                }
                None => warn!(page = index, "Canvas returned an unreadable data URL"),
            }
        }
        Ok(())
    }

    async fn list_episodes(
        &self,
        page: &mut dyn BrowserPage,
        series_id: &str,
    ) -> Result<Vec<String>, DownloadError> {
        let phase = DownloadPhase::PageLoading;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for page_num in 0..MAX_SERIES_PAGES {
            let url = series_page_url(series_id, page_num);
            info!(page = page_num, "Fetching series listing page");
            self.bounded(phase, &url, page.goto(&url)).await?;
            page.wait_for(EPISODE_LIST, Some(self.settings.timeout))
                .await
                .map_err(|e| DownloadError::from_browser(phase, &url, e))?;

            let hrefs = self
                .bounded(phase, &url, page.attribute_values(EPISODE_LINK, "href"))
                .await?;
            for (index, href) in hrefs.into_iter().enumerate() {
                let Some(href) = href else {
                    warn!(page = page_num, index, "Episode link without href");
                    continue;
                };
                let Some(id) = episode_id_from_href(&href) else {
                    warn!(page = page_num, href = %href, "Episode id not found in link");
                    continue;
                };
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }

            let has_next = self.bounded(phase, &url, page.is_visible(NEXT_PAGE)).await?;
            if !has_next {
                return Ok(ids);
            }
        }

        warn!(max_pages = MAX_SERIES_PAGES, "Series listing did not end; stopping");
        Ok(ids)
    }

    async fn wait_for_sign_in(&self, page: &mut dyn BrowserPage) -> Result<(), DownloadError> {
        let phase = DownloadPhase::PageLoading;
        self.bounded(phase, SIGNIN_URL, page.goto(SIGNIN_URL)).await?;
        page.wait_for(BOOKSHELF_ICON, None)
            .await
            .map_err(|e| DownloadError::from_browser(phase, SIGNIN_URL, e))
    }

    /// Bounds a page operation by the configured timeout.
    async fn bounded<T>(
        &self,
        phase: DownloadPhase,
        url: &str,
        operation: impl Future<Output = Result<T, BrowserError>>,
    ) -> Result<T, DownloadError> {
        match tokio::time::timeout(self.settings.timeout, operation).await {
            Ok(result) => result.map_err(|e| DownloadError::from_browser(phase, url, e)),
            Err(_) => Err(DownloadError::Timeout {
                phase,
                url: url.to_string(),
                timeout_ms: duration_ms(self.settings.timeout),
            }),
        }
    }

    async fn cookie_store(&self, phase: DownloadPhase) -> Result<&CookieStore, DownloadError> {
        self.store
            .get_or_try_init(|| async {
                let db = Database::new(&self.db_path).await?;
                Ok::<_, DbError>(CookieStore::new(db))
            })
            .await
            .map_err(|source| DownloadError::Store { phase, source })
    }

    /// Launches a browser and replays unexpired persisted cookies into it.
    async fn open_session(&self, headless: bool) -> Result<Box<dyn BrowserPage>, DownloadError> {
        let phase = DownloadPhase::SessionStarting;
        let store = self.cookie_store(phase).await?;
        let now = unix_now();
        let cookies: Vec<_> = store
            .load_all()
            .await
            .map_err(|source| DownloadError::Store { phase, source })?
            .into_iter()
            .filter(|cookie| cookie.is_live_at(now))
            .collect();

        let settings = LaunchSettings {
            headless,
            ..self.settings.clone()
        };
        let mut page = self
            .launcher
            .launch(&settings)
            .await
            .map_err(|e| DownloadError::from_browser(phase, SITE_ROOT, e))?;

        if !cookies.is_empty() {
            if let Err(err) = page.add_cookies(&cookies).await {
                if let Err(close_err) = page.close().await {
                    warn!(error = %close_err, "Failed to close browser after cookie replay error");
                }
                return Err(DownloadError::from_browser(phase, SITE_ROOT, err));
            }
        }
        debug!(cookies = cookies.len(), headless, "Browser session started");
        Ok(page)
    }

    /// Persists the session's cookies, then closes it. Closing is attempted
    /// even when persisting fails.
    async fn close_session(
        &self,
        mut page: Box<dyn BrowserPage>,
        phase: DownloadPhase,
    ) -> Result<(), DownloadError> {
        let persisted = match page.cookies().await {
            Ok(cookies) => match self.cookie_store(phase).await {
                Ok(store) => store
                    .save_all(&cookies)
                    .await
                    .map(|()| cookies.len())
                    .map_err(|source| DownloadError::Store { phase, source }),
                Err(err) => Err(err),
            },
            Err(err) => Err(DownloadError::from_browser(phase, SITE_ROOT, err)),
        };
        let closed = page
            .close()
            .await
            .map_err(|e| DownloadError::from_browser(phase, SITE_ROOT, e));

        let saved = persisted?;
        debug!(cookies = saved, "Session cookies persisted");
        closed
    }
}

/// Combines an in-session result with the outcome of closing the session.
/// The in-session error wins; a close error alone fails the operation.
fn finish_session<T>(
    result: Result<T, DownloadError>,
    closed: Result<(), DownloadError>,
) -> Result<T, DownloadError> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "Failed to close browser session cleanly");
            Err(err)
        }
    }
}

/// Returns the lowest page in `1..=page_total` that was never captured.
fn first_missing_page(pages: &BTreeMap<usize, Vec<u8>>, page_total: usize) -> Option<usize> {
    (1..=page_total).find(|index| !pages.contains_key(index))
}

/// Writes captured pages, skipping files that already exist. Each file goes
/// through a `.part` sibling so an interrupted run leaves no truncated page.
async fn write_pages(content: &EpisodeContent) -> Result<EpisodeReport, DownloadError> {
    let directory = &content.directory;
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|source| DownloadError::Io {
            path: directory.clone(),
            source,
        })?;

    let mut written = 0;
    let mut skipped = 0;
    for (index, bytes) in &content.pages {
        let name = page_file_name(*index);
        let path = directory.join(&name);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| DownloadError::Io {
                path: path.clone(),
                source,
            })?;
        if exists {
            debug!(path = %path.display(), "Page already exists, skipping");
            skipped += 1;
            continue;
        }

        let part = directory.join(format!("{name}.part"));
        tokio::fs::write(&part, bytes)
            .await
            .map_err(|source| DownloadError::Io {
                path: part.clone(),
                source,
            })?;
        tokio::fs::rename(&part, &path)
            .await
            .map_err(|source| DownloadError::Io {
                path: path.clone(),
                source,
            })?;
        written += 1;
    }

    Ok(EpisodeReport {
        directory: directory.clone(),
        written,
        skipped,
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs() as f64)
}

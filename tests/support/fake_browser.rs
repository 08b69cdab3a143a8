//! Scripted stand-in for the Chromium launcher.
//!
//! [`FakeSite`] describes what bigcomics.jp shows: one episode viewer and an
//! optional paged series listing. The viewer only renders canvases for the
//! current page and its neighbours, so the downloader has to page through it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use grabber_core::{BrowserError, BrowserLauncher, BrowserPage, Cookie, LaunchSettings, SameSite};

/// What the fake site serves.
#[derive(Debug, Clone)]
pub struct FakeSite {
    pub series_title: Option<String>,
    pub article_title: String,
    pub publish_date: String,
    /// Bytes behind each page canvas, in reading order.
    pub pages: Vec<Vec<u8>>,
    /// Page the viewer opens at (1-based).
    pub start_page: usize,
    pub rate_limited: bool,
    pub purchase_required: bool,
    /// Pages (1-based) whose canvas never renders.
    pub unrendered_pages: Vec<usize>,
    /// Delay applied to every navigation.
    pub goto_delay: Option<Duration>,
    /// Delay applied to every canvas read.
    pub canvas_delay: Option<Duration>,
    /// Episode links per listing page.
    pub listing: Vec<Vec<String>>,
    /// Cookies the browser reports when asked.
    pub session_cookies: Vec<Cookie>,
}

impl Default for FakeSite {
    fn default() -> Self {
        Self {
            series_title: Some("サンプル作品".to_string()),
            article_title: "第1話".to_string(),
            publish_date: "2024年3月5日".to_string(),
            pages: vec![b"page-1".to_vec(), b"page-2".to_vec(), b"page-3".to_vec()],
            start_page: 2,
            rate_limited: false,
            purchase_required: false,
            unrendered_pages: Vec::new(),
            goto_delay: None,
            canvas_delay: None,
            listing: Vec::new(),
            session_cookies: Vec::new(),
        }
    }
}

/// Everything the fake observed.
#[derive(Debug, Default, Clone)]
pub struct Recording {
    pub launches: Vec<LaunchSettings>,
    pub visited: Vec<String>,
    pub keys: Vec<String>,
    pub replayed_cookies: Vec<Cookie>,
    pub closed: usize,
}

/// Launcher handing out [`FakePage`]s over a shared [`FakeSite`].
#[derive(Clone)]
pub struct FakeLauncher {
    site: Arc<FakeSite>,
    recording: Arc<Mutex<Recording>>,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            recording: Arc::new(Mutex::new(Recording::default())),
        }
    }

    pub fn recording(&self) -> Recording {
        self.recording.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, settings: &LaunchSettings) -> Result<Box<dyn BrowserPage>, BrowserError> {
        self.recording.lock().unwrap().launches.push(settings.clone());
        Ok(Box::new(FakePage {
            site: Arc::clone(&self.site),
            recording: Arc::clone(&self.recording),
            current_page: self.site.start_page,
            listing_page: None,
        }))
    }
}

pub struct FakePage {
    site: Arc<FakeSite>,
    recording: Arc<Mutex<Recording>>,
    current_page: usize,
    listing_page: Option<usize>,
}

impl FakePage {
    fn page_total(&self) -> usize {
        self.site.pages.len()
    }

    fn exists(&self, selector: &str) -> bool {
        match selector {
            ".series-h-title span, .error-title" => {
                self.site.rate_limited || self.site.series_title.is_some()
            }
            ".series-h-title span" => self.site.series_title.is_some(),
            ".error-title" => self.site.rate_limited,
            ".series-ep-list" => self.listing_page.is_some(),
            _ => true,
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.recording.lock().unwrap().visited.push(url.to_string());
        if let Some(delay) = self.site.goto_delay {
            tokio::time::sleep(delay).await;
        }
        self.listing_page = url
            .split_once("page=")
            .and_then(|(_, rest)| rest.split('&').next())
            .and_then(|page| page.parse().ok());
        self.current_page = self.site.start_page;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Option<Duration>) -> Result<(), BrowserError> {
        if self.exists(selector) {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                selector: selector.to_string(),
                timeout: timeout.unwrap_or(Duration::ZERO),
            })
        }
    }

    async fn inner_text(&mut self, selector: &str) -> Result<Option<String>, BrowserError> {
        Ok(match selector {
            ".series-h-title span" => self.site.series_title.clone(),
            ".charge-box-inner" => self
                .site
                .purchase_required
                .then(|| "この話を購入する".to_string()),
            "#sliderTooltip .-cv-f-page-total" => Some(self.page_total().to_string()),
            ".-cv-f-page-current" => Some(self.current_page.to_string()),
            ".article-title" => Some(self.site.article_title.clone()),
            ".publish-date" => Some(self.site.publish_date.clone()),
            _ => None,
        })
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError> {
        Ok(match selector {
            ".error-title" => self.site.rate_limited,
            "a.next-page" => self
                .listing_page
                .is_some_and(|page| page + 1 < self.site.listing.len()),
            _ => false,
        })
    }

    async fn attribute_values(
        &mut self,
        _selector: &str,
        _attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError> {
        let links = self
            .listing_page
            .and_then(|page| self.site.listing.get(page))
            .cloned()
            .unwrap_or_default();
        Ok(links.into_iter().map(Some).collect())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BrowserError> {
        self.recording.lock().unwrap().keys.push(key.to_string());
        match key {
            "ArrowRight" => self.current_page = self.current_page.saturating_sub(1).max(1),
            "ArrowLeft" => self.current_page = (self.current_page + 1).min(self.page_total()),
            _ => {}
        }
        Ok(())
    }

    async fn canvas_data_urls(&mut self, _selector: &str) -> Result<Vec<Option<String>>, BrowserError> {
        if let Some(delay) = self.site.canvas_delay {
            tokio::time::sleep(delay).await;
        }
        let current = self.current_page;
        Ok(self
            .site
            .pages
            .iter()
            .enumerate()
            .map(|(offset, bytes)| {
                let index = offset + 1;
                (index.abs_diff(current) <= 1 && !self.site.unrendered_pages.contains(&index))
                    .then(|| format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
            })
            .collect())
    }

    async fn cookies(&mut self) -> Result<Vec<Cookie>, BrowserError> {
        Ok(self.site.session_cookies.clone())
    }

    async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        self.recording
            .lock()
            .unwrap()
            .replayed_cookies
            .extend_from_slice(cookies);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.recording.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// A persistent login cookie for bigcomics.jp.
pub fn session_cookie(value: &str) -> Cookie {
    Cookie {
        name: "session".to_string(),
        value: value.to_string(),
        domain: ".bigcomics.jp".to_string(),
        path: "/".to_string(),
        expires: 4_102_444_800.0,
        http_only: true,
        secure: true,
        same_site: SameSite::Lax,
        partition_key: None,
    }
}

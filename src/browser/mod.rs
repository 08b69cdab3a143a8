//! Browser automation seam.
//!
//! Site use cases drive pages through [`BrowserPage`] and obtain them from a
//! [`BrowserLauncher`]. [`ChromeLauncher`] is the production implementation;
//! tests substitute scripted pages.
//!
//! # Object Safety
//!
//! Both traits use `async_trait` so the composition root can hand out
//! `Arc<dyn BrowserLauncher>` and launchers can return `Box<dyn BrowserPage>`.

mod chrome;

pub use chrome::ChromeLauncher;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Cookie;

/// How a browser session is started.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSettings {
    /// Persistent profile directory reused across invocations.
    pub user_data_dir: PathBuf,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    /// Default timeout for navigation and element waits.
    pub timeout: Duration,
    pub device_scale_factor: f64,
    pub headless: bool,
}

/// Errors raised by the browser layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be started.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation failed.
    #[error("failed to navigate to '{url}': {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// A selector did not appear within the allotted time.
    #[error("timed out after {}ms waiting for '{selector}'", timeout.as_millis())]
    Timeout {
        /// CSS selector waited on.
        selector: String,
        /// The wait budget.
        timeout: Duration,
    },

    /// Page script evaluation or element access failed.
    #[error("page script failed: {0}")]
    Script(String),

    /// Cookie exchange with the browser failed.
    #[error("cookie exchange failed: {0}")]
    Cookies(String),

    /// The blocking browser task panicked or was cancelled.
    #[error("browser task aborted: {0}")]
    TaskAborted(String),
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a session and opens one page.
    async fn launch(&self, settings: &LaunchSettings) -> Result<Box<dyn BrowserPage>, BrowserError>;
}

/// One open page inside a browser session.
#[async_trait]
pub trait BrowserPage: Send {
    /// Navigates and waits for the load to settle.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits until `selector` matches an element, or fails with
    /// [`BrowserError::Timeout`]. `None` waits without limit.
    async fn wait_for(&mut self, selector: &str, timeout: Option<Duration>) -> Result<(), BrowserError>;

    /// Returns the inner text of the first element matching `selector`.
    async fn inner_text(&mut self, selector: &str) -> Result<Option<String>, BrowserError>;

    /// Returns true if `selector` matches a rendered, visible element.
    async fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError>;

    /// Returns `attribute` for every element matching `selector`.
    async fn attribute_values(
        &mut self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError>;

    /// Dispatches a key press (e.g. `ArrowLeft`) to the page.
    async fn press_key(&mut self, key: &str) -> Result<(), BrowserError>;

    /// For every element matching `selector`, returns the PNG data URL of its
    /// first `<canvas>` descendant, or `None` if it has none yet.
    async fn canvas_data_urls(&mut self, selector: &str) -> Result<Vec<Option<String>>, BrowserError>;

    /// Reads the session's cookies.
    async fn cookies(&mut self) -> Result<Vec<Cookie>, BrowserError>;

    /// Adds cookies to the session.
    async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError>;

    /// Closes the page and its browser session.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

//! Chromium-backed pages via `headless_chrome`.
//!
//! `headless_chrome` is synchronous; every call runs on tokio's blocking pool
//! so the async side stays responsive and can bound waits with timeouts.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, instrument};

use crate::auth::{Cookie, SameSite};

use super::{BrowserError, BrowserLauncher, BrowserPage, LaunchSettings};

/// Keeps the CDP connection open while a user signs in by hand.
const INTERACTIVE_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Headless sessions only idle between key presses and page loads.
const HEADLESS_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Effectively unbounded element wait.
const UNBOUNDED_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Launches local Chromium with a persistent profile.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    /// Creates a new `ChromeLauncher`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    #[instrument(skip(self, settings), fields(headless = settings.headless, profile = %settings.user_data_dir.display()))]
    async fn launch(&self, settings: &LaunchSettings) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let settings = settings.clone();
        let page = tokio::task::spawn_blocking(move || launch_blocking(&settings))
            .await
            .map_err(|e| BrowserError::TaskAborted(e.to_string()))??;
        Ok(Box::new(page))
    }
}

fn launch_blocking(settings: &LaunchSettings) -> Result<ChromePage, BrowserError> {
    std::fs::create_dir_all(&settings.user_data_dir)
        .map_err(|e| BrowserError::Launch(format!("cannot create profile dir: {e}")))?;

    let user_agent_arg = format!("--user-agent={}", settings.user_agent);
    let scale_arg = format!("--force-device-scale-factor={}", settings.device_scale_factor);
    let args: Vec<&OsStr> = vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new(&user_agent_arg),
        OsStr::new(&scale_arg),
    ];

    let idle_timeout = if settings.headless {
        HEADLESS_IDLE_TIMEOUT
    } else {
        INTERACTIVE_IDLE_TIMEOUT
    };

    let options = LaunchOptions::default_builder()
        .headless(settings.headless)
        .window_size(Some((settings.viewport_width, settings.viewport_height)))
        .user_data_dir(Some(settings.user_data_dir.clone()))
        .idle_browser_timeout(idle_timeout)
        .args(args)
        .build()
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
    let tab = browser
        .new_tab()
        .map_err(|e| BrowserError::Launch(e.to_string()))?;
    tab.set_default_timeout(settings.timeout);
    tab.set_user_agent(&settings.user_agent, None, None)
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    debug!("browser session started");
    Ok(ChromePage { browser, tab })
}

/// One Chromium tab plus the browser process that owns it.
pub struct ChromePage {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromePage {
    async fn run<T, F>(&self, f: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, BrowserError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| BrowserError::TaskAborted(e.to_string()))?
    }

    async fn evaluate(&self, expression: String) -> Result<Option<serde_json::Value>, BrowserError> {
        self.run(move |tab| {
            tab.evaluate(&expression, false)
                .map(|remote| remote.value)
                .map_err(|e| BrowserError::Script(e.to_string()))
        })
        .await
    }

    async fn evaluate_json<T: serde::de::DeserializeOwned>(
        &self,
        expression: String,
    ) -> Result<T, BrowserError> {
        let value = self.evaluate(expression).await?;
        let raw = value
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| BrowserError::Script("expected a JSON string result".to_string()))?;
        serde_json::from_str(raw).map_err(|e| BrowserError::Script(e.to_string()))
    }
}

/// Quotes `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl BrowserPage for ChromePage {
    #[instrument(level = "debug", skip(self))]
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let target = url.to_string();
        self.run(move |tab| {
            tab.navigate_to(&target)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| BrowserError::Navigation {
                    url: target.clone(),
                    reason: e.to_string(),
                })
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn wait_for(&mut self, selector: &str, timeout: Option<Duration>) -> Result<(), BrowserError> {
        let selector = selector.to_string();
        let budget = timeout.unwrap_or(UNBOUNDED_WAIT);
        self.run(move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, budget)
                .map(|_| ())
                .map_err(|_| BrowserError::Timeout {
                    selector: selector.clone(),
                    timeout: budget,
                })
        })
        .await
    }

    async fn inner_text(&mut self, selector: &str) -> Result<Option<String>, BrowserError> {
        let expression = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
            js_string(selector)
        );
        let value = self.evaluate(expression).await?;
        Ok(value.and_then(|v| v.as_str().map(ToString::to_string)))
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError> {
        let expression = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             const style = getComputedStyle(el); const rect = el.getBoundingClientRect(); \
             return style.display !== 'none' && style.visibility !== 'hidden' \
             && rect.width > 0 && rect.height > 0; }})()",
            js_string(selector)
        );
        let value = self.evaluate(expression).await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn attribute_values(
        &mut self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>, BrowserError> {
        let expression = format!(
            "JSON.stringify(Array.from(document.querySelectorAll({})).map(el => el.getAttribute({})))",
            js_string(selector),
            js_string(attribute)
        );
        self.evaluate_json(expression).await
    }

    #[instrument(level = "trace", skip(self))]
    async fn press_key(&mut self, key: &str) -> Result<(), BrowserError> {
        let key = key.to_string();
        self.run(move |tab| {
            tab.press_key(&key)
                .map(|_| ())
                .map_err(|e| BrowserError::Script(e.to_string()))
        })
        .await
    }

    async fn canvas_data_urls(&mut self, selector: &str) -> Result<Vec<Option<String>>, BrowserError> {
        let expression = format!(
            "JSON.stringify(Array.from(document.querySelectorAll({})).map(el => {{ \
             const canvas = el.querySelector('canvas'); \
             return canvas ? canvas.toDataURL('image/png') : null; }}))",
            js_string(selector)
        );
        self.evaluate_json(expression).await
    }

    async fn cookies(&mut self) -> Result<Vec<Cookie>, BrowserError> {
        let raw = self
            .run(|tab| tab.get_cookies().map_err(|e| BrowserError::Cookies(e.to_string())))
            .await?;

        let mut cookies = Vec::with_capacity(raw.len());
        for cdp_cookie in raw {
            let mut value = serde_json::to_value(&cdp_cookie)
                .map_err(|e| BrowserError::Cookies(e.to_string()))?;
            normalize_cdp_cookie(&mut value);
            match Cookie::from_value(value) {
                Ok(cookie) => cookies.push(cookie),
                Err(error) => debug!(error = %error, "skipping browser cookie"),
            }
        }
        Ok(cookies)
    }

    async fn add_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        let params = cookies
            .iter()
            .map(to_cookie_param)
            .collect::<Result<Vec<_>, _>>()?;
        if params.is_empty() {
            return Ok(());
        }
        self.run(move |tab| {
            tab.set_cookies(params)
                .map_err(|e| BrowserError::Cookies(e.to_string()))
        })
        .await
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let ChromePage { browser, tab } = *self;
        tokio::task::spawn_blocking(move || {
            let closed = tab
                .close(true)
                .map(|_| ())
                .map_err(|e| BrowserError::Script(e.to_string()));
            drop(browser);
            closed
        })
        .await
        .map_err(|e| BrowserError::TaskAborted(e.to_string()))?
    }
}

/// Fills in what the CDP cookie shape may omit or spell differently:
/// a missing `sameSite` is treated as `Lax` (Chromium's default), and an
/// object-shaped `partitionKey` is dropped.
fn normalize_cdp_cookie(value: &mut serde_json::Value) {
    let Some(map) = value.as_object_mut() else {
        return;
    };
    if map.get("sameSite").is_none_or(serde_json::Value::is_null) {
        map.insert(
            "sameSite".to_string(),
            serde_json::Value::String(SameSite::Lax.as_str().to_string()),
        );
    }
    if map.get("partitionKey").is_some_and(|v| !v.is_string()) {
        map.remove("partitionKey");
    }
}

/// Session cookies (`expires <= 0`) are sent without an expiry; partition keys
/// are not replayed.
fn to_cookie_param(cookie: &Cookie) -> Result<Network::CookieParam, BrowserError> {
    let mut value = cookie.to_value();
    if let Some(map) = value.as_object_mut() {
        map.remove("partitionKey");
        if cookie.expires <= 0.0 {
            map.remove("expires");
        }
    }
    serde_json::from_value(value).map_err(|e| BrowserError::Cookies(e.to_string()))
}

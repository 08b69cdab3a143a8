//! Pure helpers for BigComics URLs and viewer text.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

#[allow(clippy::expect_used)]
static EPISODE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/episodes/([^/]+)").expect("episode path regex is valid"));

#[allow(clippy::expect_used)]
static SERIES_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/series/([^/]+)").expect("series path regex is valid"));

// Listing links always carry the trailing slash.
#[allow(clippy::expect_used)]
static EPISODE_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/episodes/([^/]+)/").expect("episode href regex is valid"));

#[allow(clippy::expect_used)]
static PUBLISH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日").expect("publish date regex is valid")
});

/// What a BigComics URL path points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ContentPath {
    Episode(String),
    Series(String),
}

/// Classifies a URL path. Episode paths win over series paths.
pub(crate) fn classify_path(path: &str) -> Option<ContentPath> {
    if let Some(caps) = EPISODE_PATH.captures(path) {
        return Some(ContentPath::Episode(caps[1].to_string()));
    }
    SERIES_PATH
        .captures(path)
        .map(|caps| ContentPath::Series(caps[1].to_string()))
}

/// Extracts the episode id from a series listing link.
pub(crate) fn episode_id_from_href(href: &str) -> Option<String> {
    EPISODE_HREF.captures(href).map(|caps| caps[1].to_string())
}

/// Converts `YYYY年M月D日` into `YYYY-MM-DD`.
pub(crate) fn parse_publish_date(text: &str) -> Option<String> {
    let caps = PUBLISH_DATE.captures(text)?;
    let year: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

/// Parses a viewer page counter such as `" 24 "`.
pub(crate) fn parse_page_number(text: &str) -> Option<usize> {
    text.trim().parse().ok()
}

/// Decodes the payload of a `data:image/png;base64,...` URL.
pub(crate) fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let (header, payload) = data_url.split_once(',')?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return None;
    }
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    if bytes.is_empty() { None } else { Some(bytes) }
}

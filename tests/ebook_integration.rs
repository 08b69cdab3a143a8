//! Integration tests for the ebook download flow against a scripted browser.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use grabber_core::config::AppConfig;
use grabber_core::db::DATABASE_FILE;
use grabber_core::{
    ConstructionError, Container, CookieStore, Database, DownloadError, DownloadPhase, EbookError,
    SiteDownloader,
};

mod support;
use support::fake_browser::{FakeLauncher, FakeSite, session_cookie};

const EPISODE_URL: &str = "https://bigcomics.jp/episodes/abc123/";

struct Harness {
    _temp: TempDir,
    cache_dir: PathBuf,
    output_dir: PathBuf,
    launcher: FakeLauncher,
    container: Container,
}

fn harness(site: FakeSite, tweak: impl FnOnce(&mut AppConfig)) -> Harness {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let output_dir = temp.path().join("out");

    let mut config = AppConfig::default();
    config.common.cache_dir = Some(cache_dir.clone());
    config.bigcomics.output_dir = output_dir.clone();
    tweak(&mut config);

    let launcher = FakeLauncher::new(site);
    let container = Container::with_launcher(config, Arc::new(launcher.clone()));
    Harness {
        _temp: temp,
        cache_dir,
        output_dir,
        launcher,
        container,
    }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found.sort();
    found
}

async fn stored_cookies(cache_dir: &Path) -> Vec<grabber_core::Cookie> {
    let db = Database::new(&cache_dir.join(DATABASE_FILE)).await.unwrap();
    CookieStore::new(db).load_all().await.unwrap()
}

// ---- Episode download ----

#[tokio::test]
async fn test_episode_download_writes_every_page_in_order() {
    let h = harness(FakeSite::default(), |_| {});
    let use_case = h.container.ebook_download().unwrap();

    use_case.execute(EPISODE_URL).await.unwrap();

    let episode_dir = h.output_dir.join("サンプル作品").join("2024-03-05_第1話");
    assert_eq!(
        files_under(&h.output_dir),
        vec![
            episode_dir.join("001.png"),
            episode_dir.join("002.png"),
            episode_dir.join("003.png"),
        ]
    );
    assert_eq!(std::fs::read(episode_dir.join("001.png")).unwrap(), b"page-1");
    assert_eq!(std::fs::read(episode_dir.join("003.png")).unwrap(), b"page-3");

    let recording = h.launcher.recording();
    assert_eq!(recording.visited, vec![EPISODE_URL.to_string()]);
    assert_eq!(recording.launches.len(), 1);
    assert_eq!(recording.closed, 1);
}

#[tokio::test]
async fn test_session_uses_configured_browser_settings() {
    let h = harness(FakeSite::default(), |config| {
        config.bigcomics.viewport_width = 360;
        config.bigcomics.timeout_ms = 5000;
    });
    h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap();

    let settings = &h.launcher.recording().launches[0];
    assert!(settings.headless);
    assert_eq!(settings.viewport_width, 360);
    assert_eq!(settings.viewport_height, 800);
    assert_eq!(settings.timeout, Duration::from_millis(5000));
    assert_eq!(settings.user_data_dir, h.cache_dir.join("chromium_profile"));
    assert!((settings.device_scale_factor - 2.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_viewer_is_rewound_before_capture() {
    let site = FakeSite {
        pages: (1..=5).map(|n| format!("p{n}").into_bytes()).collect(),
        start_page: 4,
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap();

    let keys = h.launcher.recording().keys;
    let rewinds = keys.iter().take_while(|key| *key == "ArrowRight").count();
    assert_eq!(rewinds, 3);
    assert_eq!(files_under(&h.output_dir).len(), 5);
}

#[tokio::test]
async fn test_existing_pages_are_not_overwritten() {
    let h = harness(FakeSite::default(), |_| {});
    let episode_dir = h.output_dir.join("サンプル作品").join("2024-03-05_第1話");
    std::fs::create_dir_all(&episode_dir).unwrap();
    std::fs::write(episode_dir.join("002.png"), b"kept").unwrap();

    h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap();

    assert_eq!(std::fs::read(episode_dir.join("002.png")).unwrap(), b"kept");
    assert_eq!(std::fs::read(episode_dir.join("001.png")).unwrap(), b"page-1");
}

#[tokio::test]
async fn test_page_load_timeout_fails_without_writing() {
    let site = FakeSite {
        goto_delay: Some(Duration::from_millis(500)),
        ..FakeSite::default()
    };
    let h = harness(site, |config| config.bigcomics.timeout_ms = 50);

    let err = h
        .container
        .ebook_download()
        .unwrap()
        .execute(EPISODE_URL)
        .await
        .unwrap_err();

    match err {
        EbookError::Download(DownloadError::Timeout { phase, timeout_ms, .. }) => {
            assert_eq!(phase, DownloadPhase::PageLoading);
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(files_under(&h.output_dir).is_empty());
    assert_eq!(h.launcher.recording().closed, 1);
}

#[tokio::test]
async fn test_unrendered_page_fails_without_writing() {
    let site = FakeSite {
        pages: (1..=4).map(|n| format!("p{n}").into_bytes()).collect(),
        start_page: 1,
        unrendered_pages: vec![3],
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});

    let err = h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap_err();

    let EbookError::Download(inner) = err else {
        panic!("expected a download error");
    };
    assert_eq!(inner.phase(), DownloadPhase::ContentExtracting);
    match inner {
        DownloadError::ContentMissing { what, .. } => assert_eq!(what, "page 3"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(files_under(&h.output_dir).is_empty());
    assert_eq!(h.launcher.recording().closed, 1);
}

#[tokio::test]
async fn test_stalled_canvas_read_times_out() {
    let site = FakeSite {
        canvas_delay: Some(Duration::from_millis(500)),
        ..FakeSite::default()
    };
    let h = harness(site, |config| config.bigcomics.timeout_ms = 50);

    let err = h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap_err();

    match err {
        EbookError::Download(DownloadError::Timeout { phase, timeout_ms, .. }) => {
            assert_eq!(phase, DownloadPhase::ContentExtracting);
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(files_under(&h.output_dir).is_empty());
    assert_eq!(h.launcher.recording().closed, 1);
}

#[tokio::test]
async fn test_rate_limit_banner_is_reported() {
    let site = FakeSite {
        rate_limited: true,
        series_title: None,
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let err = h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap_err();
    assert!(matches!(
        err,
        EbookError::Download(DownloadError::RateLimited { .. })
    ));
    assert!(files_under(&h.output_dir).is_empty());
}

#[tokio::test]
async fn test_purchase_box_means_auth_required() {
    let site = FakeSite {
        purchase_required: true,
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let err = h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap_err();
    let EbookError::Download(inner) = err else {
        panic!("expected a download error");
    };
    assert!(matches!(inner, DownloadError::AuthRequired { .. }));
    assert_eq!(inner.phase(), DownloadPhase::PageLoading);
    assert!(inner.to_string().contains("grabber ebook login"));
    assert_eq!(h.launcher.recording().closed, 1);
}

#[tokio::test]
async fn test_missing_series_title_times_out_in_page_loading() {
    let site = FakeSite {
        series_title: None,
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let err = h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap_err();
    let EbookError::Download(inner) = err else {
        panic!("expected a download error");
    };
    assert!(matches!(inner, DownloadError::Timeout { .. }));
    assert_eq!(inner.phase(), DownloadPhase::PageLoading);
}

#[tokio::test]
async fn test_bad_publish_date_is_content_missing() {
    let site = FakeSite {
        publish_date: "近日公開".to_string(),
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let err = h.container.ebook_download().unwrap().execute(EPISODE_URL).await.unwrap_err();
    match err {
        EbookError::Download(DownloadError::ContentMissing { what, .. }) => {
            assert_eq!(what, "publish date");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ---- Routing ----

#[tokio::test]
async fn test_unsupported_url_never_launches_a_browser() {
    let h = harness(FakeSite::default(), |_| {});
    let err = h
        .container
        .ebook_download()
        .unwrap()
        .execute("https://example.com/x")
        .await
        .unwrap_err();
    assert!(matches!(err, EbookError::UnsupportedUrl { .. }));
    assert!(h.launcher.recording().launches.is_empty());
    assert!(!h.cache_dir.join(DATABASE_FILE).exists());
}

#[tokio::test]
async fn test_unrecognized_bigcomics_path_is_rejected() {
    let h = harness(FakeSite::default(), |_| {});
    let err = h
        .container
        .ebook_download()
        .unwrap()
        .execute("https://bigcomics.jp/ranking/")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EbookError::Download(DownloadError::UnrecognizedPath { .. })
    ));
    assert!(h.launcher.recording().launches.is_empty());
}

#[test]
fn test_unknown_site_binding_fails_construction() {
    let h = harness(FakeSite::default(), |config| {
        config.ebook.sites = vec!["nowhere".to_string()];
    });
    let err = h.container.ebook_download().unwrap_err();
    assert!(matches!(err, ConstructionError::UnknownBinding { .. }));
}

// ---- Series ----

#[tokio::test]
async fn test_series_downloads_listed_episodes_in_order() {
    let site = FakeSite {
        listing: vec![
            vec![
                "https://bigcomics.jp/episodes/e1/".to_string(),
                "https://bigcomics.jp/episodes/e2/".to_string(),
            ],
            vec![
                "/episodes/e3/".to_string(),
                "/episodes/e2/".to_string(),
                "/not-an-episode".to_string(),
            ],
        ],
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let use_case = h
        .container
        .bigcomics()
        .unwrap()
        .with_episode_pause(Duration::ZERO);

    use_case
        .download("https://bigcomics.jp/series/sample/")
        .await
        .unwrap();

    let recording = h.launcher.recording();
    assert_eq!(
        recording.visited,
        vec![
            "https://bigcomics.jp/series/sample/pagingList?s=2&page=0&limit=50".to_string(),
            "https://bigcomics.jp/series/sample/pagingList?s=2&page=1&limit=50".to_string(),
            "https://bigcomics.jp/episodes/e1/".to_string(),
            "https://bigcomics.jp/episodes/e2/".to_string(),
            "https://bigcomics.jp/episodes/e3/".to_string(),
        ]
    );
    // one session for the listing plus one per episode, all closed
    assert_eq!(recording.launches.len(), 4);
    assert_eq!(recording.closed, 4);
}

#[tokio::test]
async fn test_series_stops_at_first_failing_episode() {
    let site = FakeSite {
        listing: vec![vec!["/episodes/e1/".to_string(), "/episodes/e2/".to_string()]],
        purchase_required: true,
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let use_case = h
        .container
        .bigcomics()
        .unwrap()
        .with_episode_pause(Duration::ZERO);

    let err = use_case
        .download("https://bigcomics.jp/series/sample/")
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::AuthRequired { .. }));
    let visited = h.launcher.recording().visited;
    assert!(!visited.contains(&"https://bigcomics.jp/episodes/e2/".to_string()));
}

// ---- Session persistence ----

#[tokio::test]
async fn test_cookies_are_persisted_and_replayed() {
    let site = FakeSite {
        session_cookies: vec![session_cookie("token-1")],
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let use_case = h.container.ebook_download().unwrap();

    use_case.execute(EPISODE_URL).await.unwrap();
    let stored = stored_cookies(&h.cache_dir).await;
    assert_eq!(stored, vec![session_cookie("token-1")]);
    assert!(h.launcher.recording().replayed_cookies.is_empty());

    use_case.execute(EPISODE_URL).await.unwrap();
    assert_eq!(
        h.launcher.recording().replayed_cookies,
        vec![session_cookie("token-1")]
    );
}

#[tokio::test]
async fn test_expired_cookies_are_not_replayed() {
    let mut expired = session_cookie("old");
    expired.expires = 1_000.0;
    let site = FakeSite {
        session_cookies: vec![expired],
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let use_case = h.container.ebook_download().unwrap();

    use_case.execute(EPISODE_URL).await.unwrap();
    use_case.execute(EPISODE_URL).await.unwrap();
    assert!(h.launcher.recording().replayed_cookies.is_empty());
}

#[tokio::test]
async fn test_cookies_are_persisted_even_when_download_fails() {
    let site = FakeSite {
        purchase_required: true,
        session_cookies: vec![session_cookie("token-2")],
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});
    let _ = h.container.ebook_download().unwrap().execute(EPISODE_URL).await;

    assert_eq!(
        stored_cookies(&h.cache_dir).await,
        vec![session_cookie("token-2")]
    );
}

#[tokio::test]
async fn test_login_opens_visible_browser_and_saves_session() {
    let site = FakeSite {
        session_cookies: vec![session_cookie("signed-in")],
        ..FakeSite::default()
    };
    let h = harness(site, |_| {});

    h.container.bigcomics().unwrap().login().await.unwrap();

    let recording = h.launcher.recording();
    assert!(!recording.launches[0].headless);
    assert_eq!(recording.visited, vec!["https://bigcomics.jp/signin".to_string()]);
    assert_eq!(recording.closed, 1);
    assert_eq!(
        stored_cookies(&h.cache_dir).await,
        vec![session_cookie("signed-in")]
    );
}

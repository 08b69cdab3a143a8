//! Ebook command handlers: download, login and logout.

use anyhow::{Context, Result};
use tracing::info;

use grabber_core::config::AppConfig;
use grabber_core::db::DATABASE_FILE;
use grabber_core::{Container, CookieStore, Database};

/// Downloads `url` through the first configured site that accepts it.
pub async fn run_ebook_download_command(config: AppConfig, url: &str) -> Result<()> {
    let container = Container::new(config);
    let use_case = container.ebook_download()?;
    use_case.execute(url).await?;
    info!(url, "Download finished");
    Ok(())
}

/// Opens a visible browser for sign-in and stores the resulting session.
pub async fn run_ebook_login_command(config: AppConfig) -> Result<()> {
    let container = Container::new(config);
    container.bigcomics()?.login().await?;
    println!("Signed in; session saved.");
    Ok(())
}

/// Deletes every stored session cookie.
pub async fn run_ebook_logout_command(config: AppConfig) -> Result<()> {
    let container = Container::new(config);
    let db_path = container.cache_dir()?.join(DATABASE_FILE);
    if !db_path.exists() {
        println!("No saved session.");
        return Ok(());
    }
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("failed to open session store at {}", db_path.display()))?;
    let removed = CookieStore::new(db.clone()).clear().await?;
    db.close().await;
    println!("Removed {removed} saved cookie(s).");
    Ok(())
}

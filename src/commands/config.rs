//! Config command handlers: show, init, validate and paths.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use grabber_core::config::{self, AppConfig, LoadedConfig};
use grabber_core::db::DATABASE_FILE;

/// Prints where the configuration came from followed by the effective values.
pub fn run_config_show_command(loaded: &LoadedConfig) -> Result<()> {
    let source = loaded.path.as_ref().map_or_else(
        || "not found (using defaults)".to_string(),
        |path| path.display().to_string(),
    );
    println!("# config_file = {source}");
    for key in &loaded.env_overrides {
        println!("# env_override = {key}");
    }
    if let Some(cache_dir) = loaded.config.common.resolve_cache_dir() {
        println!("# cache_dir = {}", cache_dir.display());
    }
    println!();
    print!("{}", loaded.config.to_toml_string()?);
    Ok(())
}

/// Writes a configuration file holding every default.
pub fn run_config_init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists\n  Suggestion: pass --force to overwrite it",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = AppConfig::default().to_toml_string()?;
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Loads and validates `path`, or the file that would normally be loaded.
pub fn run_config_validate_command(path: Option<&Path>) -> Result<()> {
    let loaded = config::load(path)?;
    match &loaded.path {
        Some(path) => println!("{}: ok", path.display()),
        None => println!("no config file found; defaults are valid"),
    }
    Ok(())
}

/// Lists configuration candidates and state locations.
pub fn run_config_paths_command(loaded: Option<&LoadedConfig>) -> Result<()> {
    for candidate in config::search_paths() {
        let marker = if candidate.is_file() { " (exists)" } else { "" };
        println!("config: {}{marker}", candidate.display());
    }

    let common = loaded.map(|loaded| loaded.config.common.clone()).unwrap_or_default();
    match common.resolve_cache_dir() {
        Some(cache_dir) => {
            println!("cache: {}", cache_dir.display());
            println!("database: {}", cache_dir.join(DATABASE_FILE).display());
            if let Some(loaded) = loaded {
                println!(
                    "browser_profile: {}",
                    cache_dir.join(&loaded.config.bigcomics.user_data_dir).display()
                );
                println!("output: {}", loaded.config.bigcomics.output_dir.display());
            }
        }
        None => println!("cache: <unresolved>"),
    }
    Ok(())
}

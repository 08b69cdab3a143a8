//! Application configuration: TOML file sections, environment overrides and
//! validated per-module settings.
//!
//! Resolution order for a run:
//! 1. explicit `--config PATH` (must exist)
//! 2. `./grabber.toml`
//! 3. `$XDG_CONFIG_HOME/grabber/config.toml`, else `$HOME/.config/grabber/config.toml`
//!
//! The first existing file is read, then `GRABBER_<SECTION>__<FIELD>`
//! environment variables override individual keys, then every section is
//! validated. With no file and no overrides every module still gets usable
//! defaults.

mod error;

pub use error::ConfigError;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::site::bigcomics::{BigComicsConfig, BigComicsSection};
use crate::validation::{ValidationError, ensure_not_blank, ensure_positive};

/// Application name used for config and cache directories.
pub const APP_NAME: &str = "grabber";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "GRABBER_";

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "grabber.toml";

/// Site modules consulted by the ebook use case when none are configured.
pub const DEFAULT_EBOOK_SITES: [&str; 1] = ["bigcomics"];

/// Default worker count reported by `config show`.
pub const DEFAULT_JOBS: u32 = 16;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Raw file layout. Unknown sections and keys are rejected so typos surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub common: CommonSection,
    #[serde(default)]
    pub ebook: EbookSection,
    #[serde(default)]
    pub bigcomics: BigComicsSection,
}

/// `[common]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommonSection {
    pub cache_dir: Option<PathBuf>,
    pub jobs: Option<i64>,
    pub log_level: Option<String>,
}

/// `[ebook]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EbookSection {
    pub sites: Option<Vec<String>>,
}

/// Settings shared by every module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonConfig {
    /// Base for browser profiles and the cookie database.
    /// Falls back to the platform cache directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Upper bound on parallel work.
    pub jobs: u32,
    /// Default log filter when neither `-v`/`-q` nor `RUST_LOG` is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            jobs: DEFAULT_JOBS,
            log_level: None,
        }
    }
}

impl CommonConfig {
    /// Returns the configured cache directory or `<platform cache>/grabber`.
    #[must_use]
    pub fn resolve_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_NAME)))
    }
}

/// Settings for the cross-cutting ebook use case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbookConfig {
    /// Site modules in the order they are asked to accept a URL.
    pub sites: Vec<String>,
}

impl Default for EbookConfig {
    fn default() -> Self {
        Self {
            sites: DEFAULT_EBOOK_SITES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Fully validated configuration handed to the composition root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub common: CommonConfig,
    pub ebook: EbookConfig,
    pub bigcomics: BigComicsConfig,
}

impl AppConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or wrongly typed keys,
    /// and [`ConfigError::Validation`] for constraint violations.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: "<inline>".to_string(),
            source,
        })?;
        Ok(Self::from_file_config(file)?)
    }

    /// Applies defaults to every absent key and validates the result.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn from_file_config(file: FileConfig) -> Result<Self, ValidationError> {
        let log_level = match file.common.log_level {
            Some(level) => Some(validate_log_level(&level)?),
            None => None,
        };

        let sites = file.ebook.sites.unwrap_or_else(|| EbookConfig::default().sites);
        if sites.is_empty() {
            return Err(ValidationError::empty("ebook.sites"));
        }
        for site in &sites {
            ensure_not_blank("ebook.sites", site)?;
        }

        let jobs = match file.common.jobs {
            Some(jobs) => {
                ensure_positive("common.jobs", jobs)?;
                u32::try_from(jobs).map_err(|_| ValidationError::NotAllowed {
                    field: "common.jobs".to_string(),
                    value: jobs.to_string(),
                    expected: format!("1..={}", u32::MAX),
                })?
            }
            None => DEFAULT_JOBS,
        };

        let config = Self {
            common: CommonConfig {
                cache_dir: file.common.cache_dir,
                jobs,
                log_level,
            },
            ebook: EbookConfig { sites },
            bigcomics: BigComicsConfig::from_section(file.bigcomics)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every constraint on an already built configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: non-positive timeout, viewport or
    /// job count, blank user agent, or an empty site list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.common.jobs == 0 {
            return Err(ValidationError::not_positive("common.jobs", 0));
        }
        if self.ebook.sites.is_empty() {
            return Err(ValidationError::empty("ebook.sites"));
        }
        for site in &self.ebook.sites {
            ensure_not_blank("ebook.sites", site)?;
        }
        let bigcomics = &self.bigcomics;
        if bigcomics.timeout_ms == 0 {
            return Err(ValidationError::not_positive("bigcomics.timeout_ms", 0));
        }
        if bigcomics.viewport_width == 0 {
            return Err(ValidationError::not_positive("bigcomics.viewport_width", 0));
        }
        if bigcomics.viewport_height == 0 {
            return Err(ValidationError::not_positive("bigcomics.viewport_height", 0));
        }
        ensure_not_blank("bigcomics.user_agent", &bigcomics.user_agent)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn validate_log_level(level: &str) -> Result<String, ValidationError> {
    let normalized = level.trim().to_ascii_lowercase();
    if LOG_LEVELS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(ValidationError::NotAllowed {
            field: "common.log_level".to_string(),
            value: level.to_string(),
            expected: LOG_LEVELS.join(", "),
        })
    }
}

/// Effective configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// The file that was read, if any.
    pub path: Option<PathBuf>,
    /// Environment keys that overrode file values, in application order.
    pub env_overrides: Vec<String>,
}

/// Config file candidates in lookup order (explicit `--config` excluded).
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(path) = user_config_path() {
        paths.push(path);
    }
    paths
}

/// Resolves the per-user config file path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/grabber/config.toml`
/// 2. `$HOME/.config/grabber/config.toml`
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_NAME).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads configuration for this process: file lookup plus `GRABBER_` overrides.
///
/// # Errors
///
/// See [`load_from`].
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    load_from(explicit, &search_paths(), env::vars())
}

/// Loads configuration from an explicit path or the first existing candidate,
/// then applies overrides from `env`.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if `explicit` does not exist,
/// [`ConfigError::Read`]/[`ConfigError::Parse`] for unreadable or malformed
/// files, [`ConfigError::EnvKey`] for malformed override names and
/// [`ConfigError::Validation`] for constraint violations.
#[instrument(level = "debug", skip(candidates, env))]
pub fn load_from(
    explicit: Option<&Path>,
    candidates: &[PathBuf],
    env: impl IntoIterator<Item = (String, String)>,
) -> Result<LoadedConfig, ConfigError> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Some(path) => Some(path.to_path_buf()),
        None => candidates.iter().find(|path| path.is_file()).cloned(),
    };

    let mut table = match &path {
        Some(path) => read_table(path)?,
        None => toml::Table::new(),
    };
    debug!(path = ?path, "Config source resolved");

    let env_overrides = apply_env_overrides(&mut table, env)?;

    let origin = path
        .as_ref()
        .map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string());
    let file: FileConfig = toml::Value::Table(table)
        .try_into()
        .map_err(|source| ConfigError::Parse { origin, source })?;

    Ok(LoadedConfig {
        config: AppConfig::from_file_config(file)?,
        path,
        env_overrides,
    })
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    raw.parse::<toml::Table>()
        .map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })
}

/// Merges `GRABBER_<SECTION>__<FIELD>=value` pairs into `table`.
///
/// Values for keys whose default is a number, boolean or array are read as
/// TOML literals. Everything else, including path and text keys, is taken
/// verbatim as a string.
fn apply_env_overrides(
    table: &mut toml::Table,
    env: impl IntoIterator<Item = (String, String)>,
) -> Result<Vec<String>, ConfigError> {
    let mut pairs: Vec<(String, String)> = env
        .into_iter()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect();
    pairs.sort();
    let defaults = toml::Table::try_from(AppConfig::default()).unwrap_or_default();

    let mut applied = Vec::with_capacity(pairs.len());
    for (key, raw_value) in pairs {
        let Some((section, field)) = key[ENV_PREFIX.len()..].split_once("__") else {
            return Err(ConfigError::EnvKey {
                key,
                prefix: ENV_PREFIX,
            });
        };
        if section.is_empty() || field.is_empty() {
            return Err(ConfigError::EnvKey {
                key,
                prefix: ENV_PREFIX,
            });
        }

        let section = section.to_ascii_lowercase();
        let field = field.to_ascii_lowercase();
        let entry = table
            .entry(section.clone())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(section_table) = entry else {
            return Err(ConfigError::EnvKey {
                key,
                prefix: ENV_PREFIX,
            });
        };
        let typed = defaults
            .get(&section)
            .and_then(toml::Value::as_table)
            .and_then(|table| table.get(&field))
            .is_some_and(|value| !value.is_str());
        let value = if typed {
            parse_env_value(&raw_value)
        } else {
            toml::Value::String(raw_value)
        };
        section_table.insert(field, value);
        debug!(key = %key, "Applied environment override");
        applied.push(key);
    }
    Ok(applied)
}

fn parse_env_value(raw: &str) -> toml::Value {
    format!("v = {raw}")
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut parsed| parsed.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

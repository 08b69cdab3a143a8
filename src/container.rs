//! Composition root.
//!
//! [`Container`] owns the validated [`AppConfig`] and the browser launcher and
//! builds use cases on demand. Every binding is spelled out here; there is no
//! global or reflective registry.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::browser::{BrowserLauncher, ChromeLauncher};
use crate::config::AppConfig;
use crate::site::bigcomics::{self, BigComicsRepository, BigComicsUseCase};
use crate::site::{SiteDownloader, SiteRegistry};
use crate::usecase::EbookDownloadUseCase;
use crate::validation::ValidationError;

/// Site modules the container knows how to build.
pub const KNOWN_SITES: [&str; 1] = [bigcomics::SITE_NAME];

/// Errors raised while wiring use cases.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// A configured site name has no binding.
    #[error("unknown site '{name}' in ebook.sites\n  Suggestion: use one of: {known}")]
    UnknownBinding {
        /// The configured name.
        name: String,
        /// Comma-separated known names.
        known: String,
    },

    /// A required binding list is empty.
    #[error("no {what} configured\n  Suggestion: set at least one entry, e.g. sites = [\"bigcomics\"]")]
    MissingBinding {
        /// What is missing.
        what: &'static str,
    },

    /// A dependency could not be resolved from the environment.
    #[error("cannot resolve {what}: {reason}\n  Suggestion: set [common] cache_dir in the config file")]
    Unresolvable {
        /// The dependency.
        what: &'static str,
        /// Why it could not be resolved.
        reason: String,
    },

    /// The configuration handed to the container violates a constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}

/// Builds use cases from configuration.
pub struct Container {
    config: AppConfig,
    launcher: Arc<dyn BrowserLauncher>,
}

impl Container {
    /// Creates a container that drives a real Chromium.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self::with_launcher(config, Arc::new(ChromeLauncher::new()))
    }

    /// Creates a container with a caller-supplied browser launcher.
    #[must_use]
    pub fn with_launcher(config: AppConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { config, launcher }
    }

    /// The configuration this container was built from.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Resolves the directory holding browser profiles and the cookie database.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::Unresolvable`] when no cache directory is
    /// configured and the platform has none.
    pub fn cache_dir(&self) -> Result<PathBuf, ConstructionError> {
        self.config
            .common
            .resolve_cache_dir()
            .ok_or_else(|| ConstructionError::Unresolvable {
                what: "cache directory",
                reason: "no platform cache directory is available".to_string(),
            })
    }

    /// Builds the BigComics use case.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError`] for an invalid configuration or an
    /// unresolvable cache directory.
    pub fn bigcomics(&self) -> Result<BigComicsUseCase, ConstructionError> {
        self.config.validate()?;
        let cache_dir = self.cache_dir()?;
        debug!(cache_dir = %cache_dir.display(), "Building bigcomics use case");
        let repo = BigComicsRepository::new(&self.config.bigcomics, &cache_dir, Arc::clone(&self.launcher));
        Ok(BigComicsUseCase::new(repo))
    }

    /// Builds a site module by its configured name.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnknownBinding`] for names not in
    /// [`KNOWN_SITES`], or the error of the site's own constructor.
    pub fn site(&self, name: &str) -> Result<Box<dyn SiteDownloader>, ConstructionError> {
        match name.trim().to_ascii_lowercase().as_str() {
            bigcomics::SITE_NAME => Ok(Box::new(self.bigcomics()?)),
            _ => Err(ConstructionError::UnknownBinding {
                name: name.to_string(),
                known: KNOWN_SITES.join(", "),
            }),
        }
    }

    /// Builds the ordered registry named by `ebook.sites`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::MissingBinding`] for an empty list, or
    /// the first failure from [`Container::site`].
    pub fn site_registry(&self) -> Result<SiteRegistry, ConstructionError> {
        let names = &self.config.ebook.sites;
        if names.is_empty() {
            return Err(ConstructionError::MissingBinding { what: "ebook sites" });
        }
        let mut registry = SiteRegistry::new();
        for name in names {
            registry.register(self.site(name)?);
        }
        Ok(registry)
    }

    /// Builds the ebook download use case with its site registry.
    ///
    /// # Errors
    ///
    /// See [`Container::site_registry`].
    pub fn ebook_download(&self) -> Result<EbookDownloadUseCase, ConstructionError> {
        Ok(EbookDownloadUseCase::new(self.site_registry()?))
    }
}

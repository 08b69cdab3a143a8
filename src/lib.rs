//! Grabber Core Library
//!
//! Downloads ebooks and other media from supported websites by driving a
//! headless browser, keeping the signed-in session between runs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - TOML configuration, environment overrides and validation
//! - [`container`] - Composition root that wires use cases from configuration
//! - [`usecase`] - Cross-cutting use cases (ebook download)
//! - [`site`] - Site downloaders, the ordered site registry and download phases
//! - [`browser`] - Browser automation seam and its Chromium implementation
//! - [`auth`] - Cookie record and its persistent store
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod browser;
pub mod config;
pub mod container;
pub mod db;
pub mod site;
pub mod usecase;
pub mod validation;

// Re-export commonly used types
pub use auth::{Cookie, CookieStore, SameSite};
pub use browser::{BrowserError, BrowserLauncher, BrowserPage, ChromeLauncher, LaunchSettings};
pub use config::{AppConfig, CommonConfig, ConfigError, EbookConfig, LoadedConfig};
pub use container::{ConstructionError, Container};
pub use db::{Database, DbError};
pub use site::bigcomics::{BigComicsConfig, BigComicsRepository, BigComicsUseCase};
pub use site::{DownloadError, DownloadPhase, SiteDownloader, SiteRegistry};
pub use usecase::{EbookDownloadUseCase, EbookError};
pub use validation::ValidationError;

//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur while loading or rendering configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}\n  Suggestion: check the --config path", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The config file exists but could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML text is malformed or has fields of the wrong type.
    #[error("failed to parse config from {origin}: {source}")]
    Parse {
        /// File path or `<inline>` for string input.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment override does not name a `SECTION__FIELD` pair.
    #[error("invalid environment override '{key}': expected {prefix}<SECTION>__<FIELD>")]
    EnvKey {
        /// The offending variable name.
        key: String,
        /// The expected prefix.
        prefix: &'static str,
    },

    /// Values parsed but violate a constraint.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Rendering the effective config back to TOML failed.
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

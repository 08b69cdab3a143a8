//! Browser cookie record exchanged with the automation layer.
//!
//! Accepts the browser's camelCase spelling (`httpOnly`, `sameSite`,
//! `partitionKey`) as well as snake_case, and always serializes back to the
//! browser spelling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// `SameSite` policy of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SameSite {
    Lax,
    None,
    Strict,
}

impl SameSite {
    /// Returns the browser label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::None => "None",
            Self::Strict => "Strict",
        }
    }
}

impl FromStr for SameSite {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Lax" => Ok(Self::Lax),
            "None" => Ok(Self::None),
            "Strict" => Ok(Self::Strict),
            other => Err(ValidationError::NotAllowed {
                field: "cookie.sameSite".to_string(),
                value: other.to_string(),
                expected: "Lax, None, Strict".to_string(),
            }),
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single browser cookie.
///
/// The value field is redacted in Debug output to keep session tokens out of logs.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    /// Cookie value. Sensitive, never log it.
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix timestamp in seconds; `-1` marks a session cookie.
    pub expires: f64,
    #[serde(rename = "httpOnly", alias = "http_only")]
    pub http_only: bool,
    pub secure: bool,
    #[serde(rename = "sameSite", alias = "same_site")]
    pub same_site: SameSite,
    #[serde(
        rename = "partitionKey",
        alias = "partition_key",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub partition_key: Option<String>,
}

impl Cookie {
    /// Builds a cookie from a raw JSON mapping.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Malformed`] when a required field is missing,
    /// has the wrong type, or `sameSite` is not `Lax`, `None` or `Strict`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|source| ValidationError::Malformed {
            record: "cookie",
            source,
        })
    }

    /// Builds a cookie from JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`Cookie::from_value`], plus malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(raw).map_err(|source| ValidationError::Malformed {
            record: "cookie",
            source,
        })
    }

    /// Returns the browser-shaped JSON mapping.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Returns true if the cookie is a session cookie or has not expired at `now`.
    #[must_use]
    pub fn is_live_at(&self, now_secs: f64) -> bool {
        self.expires <= 0.0 || self.expires > now_secs
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("http_only", &self.http_only)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("partition_key", &self.partition_key)
            .finish()
    }
}

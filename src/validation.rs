//! Field-level validation errors shared by configuration and domain records.

use thiserror::Error;

/// A configuration value or domain record failed validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A numeric field must be strictly positive.
    #[error("invalid value for `{field}`: {value}. Expected a positive integer")]
    NotPositive {
        /// Dotted field path (e.g. `bigcomics.timeout_ms`).
        field: String,
        /// The rejected value.
        value: i64,
    },

    /// A string or list field must not be empty.
    #[error("invalid value for `{field}`: must not be empty")]
    Empty {
        /// Dotted field path.
        field: String,
    },

    /// A field carried a value outside its allowed set.
    #[error("invalid value for `{field}`: '{value}'. Expected one of: {expected}")]
    NotAllowed {
        /// Dotted field path.
        field: String,
        /// The rejected value.
        value: String,
        /// Human-readable list of accepted values.
        expected: String,
    },

    /// Raw data could not be mapped onto the record (wrong type, missing field).
    #[error("malformed {record}: {source}")]
    Malformed {
        /// Name of the record being built (e.g. `cookie`).
        record: &'static str,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl ValidationError {
    /// Creates a `NotPositive` error.
    #[must_use]
    pub fn not_positive(field: &str, value: i64) -> Self {
        Self::NotPositive {
            field: field.to_string(),
            value,
        }
    }

    /// Creates an `Empty` error.
    #[must_use]
    pub fn empty(field: &str) -> Self {
        Self::Empty {
            field: field.to_string(),
        }
    }
}

/// Rejects zero or negative values for a numeric field.
///
/// # Errors
///
/// Returns [`ValidationError::NotPositive`] when `value <= 0`.
pub fn ensure_positive(field: &str, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::not_positive(field, value));
    }
    Ok(())
}

/// Rejects blank strings.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] when `value` is empty after trimming.
pub fn ensure_not_blank(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty(field));
    }
    Ok(())
}

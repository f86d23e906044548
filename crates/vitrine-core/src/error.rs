//! Error types for Vitrine core.
//!
//! Only catalog loading can fail in this crate. Key resolution and tier
//! classification are total functions: an unknown page falls back to tier 3
//! with no dependencies instead of producing an error.
//!
//! # Example
//!
//! ```
//! use vitrine_core::{Result, VitrineError};
//!
//! fn page_id(raw: &str) -> Result<String> {
//!     if raw.trim().is_empty() {
//!         return Err(VitrineError::invalid_catalog("pages", "page id cannot be empty"));
//!     }
//!     Ok(raw.trim().to_string())
//! }
//!
//! assert!(page_id("  ").is_err());
//! ```

use std::io;
use thiserror::Error;

/// Main error type for Vitrine core operations.
#[derive(Debug, Error)]
pub enum VitrineError {
    /// The catalog content could not be parsed.
    #[error("Failed to parse catalog from '{source_name}': {message}")]
    CatalogParse {
        /// Origin of the catalog (file path, inline, etc.)
        source_name: String,
        /// Description of the parse error
        message: String,
        /// Underlying error, if any
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The catalog parsed but is inconsistent.
    #[error("Invalid catalog section '{section}': {reason}")]
    InvalidCatalog {
        /// Section that failed validation
        section: String,
        /// Why it's invalid
        reason: String,
    },

    /// A tier number outside 1..=3 was supplied.
    #[error("Unknown tier {0}, expected 1, 2 or 3")]
    UnknownTier(u8),

    /// I/O error occurred while reading the catalog.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VitrineError {
    /// Creates a CatalogParse error without a cause.
    pub fn catalog_parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CatalogParse {
            source_name: source_name.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a CatalogParse error with a cause.
    pub fn catalog_parse_with_cause<E>(
        source_name: impl Into<String>,
        message: impl Into<String>,
        cause: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CatalogParse {
            source_name: source_name.into(),
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Creates an InvalidCatalog error.
    pub fn invalid_catalog(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the catalog content itself was malformed.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::CatalogParse { .. })
    }

    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Type alias for Results with VitrineError.
pub type Result<T> = std::result::Result<T, VitrineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_catalog_display() {
        let error = VitrineError::invalid_catalog("tiers", "page 'home' listed twice");
        let msg = error.to_string();

        assert!(msg.contains("tiers"));
        assert!(msg.contains("home"));
    }

    #[test]
    fn test_parse_error_keeps_cause() {
        let io_error = io::Error::new(io::ErrorKind::InvalidData, "bad bytes");
        let error = VitrineError::catalog_parse_with_cause("catalog.yml", "unreadable", io_error);

        use std::error::Error;
        assert!(error.source().is_some());
        assert!(error.is_parse_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "missing");
        let error: VitrineError = io_error.into();

        assert!(error.is_io_error());
        assert!(!error.is_parse_error());
    }

    #[test]
    fn test_unknown_tier_display() {
        assert_eq!(
            VitrineError::UnknownTier(7).to_string(),
            "Unknown tier 7, expected 1, 2 or 3"
        );
    }
}

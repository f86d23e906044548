//! Engine error types.

use vitrine_core::VitrineError;
use vitrine_sources::GeneratorError;
use vitrine_store::StoreError;

use crate::settings::SettingsError;

/// Errors surfaced by engine operations that are allowed to fail.
///
/// Lookups, stores, invalidations and validation passes never fail; they log
/// and report instead. Only refresh jobs and process setup return this type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The content generator failed for a location.
    #[error("generation failed for {key}: {source}")]
    Generation {
        key: String,
        #[source]
        source: GeneratorError,
    },

    /// Settings could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The page catalog could not be loaded.
    #[error("catalog error: {0}")]
    Catalog(#[from] VitrineError),

    /// The durable store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The metrics exporter could not be installed.
    #[error("metrics setup failed: {0}")]
    Metrics(String),
}

impl EngineError {
    pub fn generation(key: impl ToString, source: GeneratorError) -> Self {
        Self::Generation {
            key: key.to_string(),
            source,
        }
    }

    /// Returns true if the failure came from the content generator.
    pub fn is_generation_error(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        let err = EngineError::generation("home::hero", GeneratorError::unavailable("offline"));
        assert_eq!(
            err.to_string(),
            "generation failed for home::hero: generator unavailable: offline"
        );
        assert!(err.is_generation_error());
    }

    #[test]
    fn test_store_error_converts() {
        let err: EngineError = StoreError::unavailable("down").into();
        assert!(matches!(err, EngineError::Store(_)));
        assert!(!err.is_generation_error());
    }
}

//! Error types for external collaborators.

use vitrine_store::StoreError;

/// Errors reported by a content generator.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// The generator backend is not reachable.
    #[error("generator unavailable: {reason}")]
    Unavailable { reason: String },

    /// Generation ran but did not produce content for the location.
    #[error("generation failed for {page}/{widget}: {reason}")]
    Failed {
        page: String,
        widget: String,
        reason: String,
    },
}

impl GeneratorError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn failed(
        page: impl Into<String>,
        widget: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Failed {
            page: page.into(),
            widget: widget.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while running a validation check.
///
/// A failing check is not an error: it returns an outcome with
/// `passed = false`. Errors mean the check could not reach a verdict.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The check needed the durable store and the store failed.
    #[error("check '{check}' could not read the store: {source}")]
    Store {
        check: String,
        #[source]
        source: StoreError,
    },

    /// Any other failure inside a check.
    #[error("check '{check}' failed to run: {reason}")]
    Internal { check: String, reason: String },
}

impl CheckError {
    pub fn internal(check: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Internal {
            check: check.into(),
            reason: reason.into(),
        }
    }

    /// Name of the check that raised the error.
    pub fn check(&self) -> &str {
        match self {
            Self::Store { check, .. } | Self::Internal { check, .. } => check,
        }
    }
}

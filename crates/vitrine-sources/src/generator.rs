//! Content generator boundary.

use async_trait::async_trait;
use serde_json::{Map, Value};
use vitrine_core::SourceKind;

use crate::error::GeneratorError;

/// Content produced for one (page, widget) location.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub content: Value,
    pub source_kind: SourceKind,
    pub confidence_score: u8,
}

/// Produces content for a location.
///
/// How content is computed is outside the cache engine; the engine only calls
/// `generate` while warming or force-refreshing and stores the result.
///
/// # Example
///
/// ```ignore
/// struct Upstream { client: reqwest::Client }
///
/// #[async_trait]
/// impl ContentGenerator for Upstream {
///     async fn generate(&self, page: &str, widget: &str)
///         -> Result<GeneratedContent, GeneratorError> {
///         // call the upstream service here
///     }
///
///     fn name(&self) -> &str {
///         "upstream"
///     }
/// }
/// ```
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generates content for the given location.
    ///
    /// # Errors
    ///
    /// Any error fails the warming or refresh job that requested it; sibling
    /// jobs are unaffected.
    async fn generate(&self, page: &str, widget: &str)
    -> Result<GeneratedContent, GeneratorError>;

    /// Returns the name of this generator, used for logging.
    fn name(&self) -> &str;
}

/// Generator that always returns a fixed payload tagged `static_fallback`.
///
/// Object payloads get `page` and `widget` fields added so every location
/// carries its own coordinates.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    payload: Value,
    confidence_score: u8,
}

impl StaticGenerator {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            confidence_score: 50,
        }
    }

    pub fn with_confidence(mut self, confidence_score: u8) -> Self {
        self.confidence_score = confidence_score;
        self
    }
}

#[async_trait]
impl ContentGenerator for StaticGenerator {
    async fn generate(
        &self,
        page: &str,
        widget: &str,
    ) -> Result<GeneratedContent, GeneratorError> {
        let content = match &self.payload {
            Value::Object(fields) => {
                let mut fields: Map<String, Value> = fields.clone();
                fields.insert("page".to_string(), Value::from(page));
                fields.insert("widget".to_string(), Value::from(widget));
                Value::Object(fields)
            },
            other => other.clone(),
        };

        Ok(GeneratedContent {
            content,
            source_kind: SourceKind::StaticFallback,
            confidence_score: self.confidence_score,
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}

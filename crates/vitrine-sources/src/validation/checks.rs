//! Built-in validation checks.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use vitrine_core::{CacheRecord, ValidationStatus, content_hash};
use vitrine_store::DurableStore;

use super::{CheckOutcome, ValidationCheck};
use crate::error::CheckError;

/// Verifies that a record still describes the location it is stored under.
///
/// Fails when the content is empty, when the stored hash no longer matches
/// the content, or when the content carries `page`/`widget` fields that name
/// a different location.
#[derive(Debug, Default, Clone, Copy)]
pub struct MappingConsistencyCheck;

impl MappingConsistencyCheck {
    pub const NAME: &'static str = "mapping_consistency";
}

#[async_trait]
impl ValidationCheck for MappingConsistencyCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn check(&self, record: &CacheRecord) -> Result<CheckOutcome, CheckError> {
        let content = &record.entry.content;
        if is_empty(content) {
            return Ok(CheckOutcome::fail("content is empty"));
        }

        let actual = content_hash(content);
        if actual != record.content_hash {
            return Ok(CheckOutcome::fail(format!(
                "content hash mismatch: stored {}, computed {}",
                record.content_hash, actual
            )));
        }

        let key = record.key();
        for (field, expected) in [("page", key.page()), ("widget", key.widget())] {
            if let Some(found) = content.get(field).and_then(Value::as_str)
                && !found.trim().eq_ignore_ascii_case(expected)
            {
                return Ok(CheckOutcome::fail(format!(
                    "content {field} '{found}' does not match key {key}"
                )));
            }
        }

        Ok(CheckOutcome::pass("content maps to its key"))
    }
}

fn is_empty(content: &Value) -> bool {
    match content {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Fails when another valid record under a different key carries exactly the
/// same content hash.
pub struct DuplicateContentCheck {
    store: Arc<dyn DurableStore>,
}

impl DuplicateContentCheck {
    pub const NAME: &'static str = "duplicate_content";

    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for DuplicateContentCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateContentCheck")
            .field("store", &self.store.name())
            .finish()
    }
}

#[async_trait]
impl ValidationCheck for DuplicateContentCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn check(&self, record: &CacheRecord) -> Result<CheckOutcome, CheckError> {
        let valid = self
            .store
            .records(Some(ValidationStatus::Valid))
            .await
            .map_err(|source| CheckError::Store {
                check: Self::NAME.to_string(),
                source,
            })?;

        let duplicate = valid
            .iter()
            .find(|other| other.key() != record.key() && other.content_hash == record.content_hash);

        Ok(match duplicate {
            Some(other) => CheckOutcome::fail(format!("same content as {}", other.key())),
            None => CheckOutcome::pass("content is unique"),
        })
    }
}

/// Phrases that mark content as generic filler.
pub const PLACEHOLDER_PHRASES: &[&str] = &[
    "placeholder content",
    "[todo]",
    "lorem ipsum",
    "example data",
    "sample content",
    "generic recommendation",
];

/// Flags content containing generic placeholder phrases.
///
/// Not part of the standard pipeline; enable it explicitly.
#[derive(Debug, Clone)]
pub struct PlaceholderContentCheck {
    phrases: Vec<String>,
}

impl PlaceholderContentCheck {
    pub const NAME: &'static str = "placeholder_content";

    pub fn new() -> Self {
        Self::with_phrases(PLACEHOLDER_PHRASES.iter().copied())
    }

    /// Uses a custom phrase list. Matching is case-insensitive.
    pub fn with_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl Default for PlaceholderContentCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationCheck for PlaceholderContentCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn check(&self, record: &CacheRecord) -> Result<CheckOutcome, CheckError> {
        let text = record.entry.content.to_string().to_lowercase();

        let found: Vec<&str> = self
            .phrases
            .iter()
            .filter(|phrase| text.contains(phrase.as_str()))
            .map(String::as_str)
            .collect();

        Ok(if found.is_empty() {
            CheckOutcome::pass("no placeholder phrases")
        } else {
            CheckOutcome::fail(format!("placeholder phrases found: {}", found.join(", ")))
        })
    }
}

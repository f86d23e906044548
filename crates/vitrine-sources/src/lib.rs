//! # Vitrine Sources
//!
//! Boundaries between the cache engine and the collaborators it does not own:
//! the content generator that produces payloads and the validation checks
//! that decide whether cached content may keep being served.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vitrine_sources::{ValidationPipeline, StaticGenerator};
//!
//! let pipeline = ValidationPipeline::standard(store.clone());
//! let generator = StaticGenerator::new(serde_json::json!({"title": "Coming soon"}));
//! ```

pub mod error;
pub mod generator;
pub mod validation;

pub use error::{CheckError, GeneratorError};
pub use generator::{ContentGenerator, GeneratedContent, StaticGenerator};
pub use validation::{
    CheckOutcome, CheckResult, DuplicateContentCheck, MappingConsistencyCheck, PipelineOutcome,
    PlaceholderContentCheck, ValidationCheck, ValidationPipeline,
};


//! Vitrine Core - Domain types
//!
//! This crate provides the foundational types for the Vitrine content cache:
//! cache keys, tiers, volatile entries and durable records, the static
//! page/tier catalog, content hashing and the clock abstraction.

pub mod catalog;
pub mod clock;
pub mod entry;
pub mod error;
pub mod hash;
pub mod key;
pub mod types;

pub use catalog::{Catalog, CatalogBuilder, Location, PageConfig, TierConfig, TierTable};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CacheRecord, MAX_CONFIDENCE, running_average};
pub use error::{Result, VitrineError};
pub use hash::content_hash;
pub use key::CacheKey;
pub use types::{SourceKind, Tier, ValidationStatus};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let v = version();
        assert_eq!(v.split('.').count(), 3, "Version should be semver");
    }
}

//! # Vitrine Store
//!
//! Durable backing stores for Vitrine cache records.
//!
//! The engine keeps hot entries in a volatile in-process cache and falls back
//! to a [`DurableStore`] on a miss. The durable side also carries the
//! validation bookkeeping (status, schedule, invalidation reason) and the
//! per-record hit/miss statistics.
//!
//! ## Features
//!
//! - Async trait-based store abstraction
//! - Point reads/writes keyed by cache key
//! - Range query of records due for validation
//! - Increment-style hit/miss counters
//! - Glob-based bulk invalidation over rendered keys
//! - JSON snapshot persistence via [`FileStore`]
//!
//! ## Example
//!
//! ```ignore
//! use vitrine_store::{DurableStore, FileStore};
//!
//! let store = FileStore::open("/var/lib/vitrine/records.json").await?;
//! let due = store.due_for_validation(now, 50).await?;
//! ```

pub mod durable;
pub mod error;

// Re-exports
pub use durable::{DurableStore, FileStore, MemoryStore, StoreSummary};
pub use error::StoreError;

// Re-export vitrine_core for consumers
pub use vitrine_core;

//! Durable store abstraction.
//!
//! This module defines the backing-store trait and its in-process
//! implementations.

mod file;
mod memory;
mod summary;
mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use summary::StoreSummary;
pub use traits::DurableStore;

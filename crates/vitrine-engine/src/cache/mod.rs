//! Cache layers: the volatile store, the dependency graph and invalidation.

pub mod dependencies;
pub mod invalidation;
pub mod volatile;

pub use dependencies::{CascadeStep, DependencyGraph};
pub use invalidation::{CLEAR_ALL_REASON, ClearReport, InvalidatedKey, InvalidationReport};
pub use volatile::VolatileStore;

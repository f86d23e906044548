//! Recurring background validation.

mod scheduler;
mod state;

pub use scheduler::{ScheduleConfig, ScheduleHandle, ValidationScheduler};
pub use state::RunState;

//! Background schedulers.

mod sweep_scheduler;

pub use sweep_scheduler::{SweepScheduler, SweepSchedulerConfig};

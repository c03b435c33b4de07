//! Cycle orchestration: dispatching, the cycle itself, and the scheduler

pub mod cycle;
pub mod dispatch;
pub mod scheduler;

pub use cycle::{CycleSettings, Pipeline};
pub use dispatch::{ActionDispatcher, DRY_RUN};
pub use scheduler::{CycleRunner, PipelineScheduler, ScheduleRanges, SchedulerState};

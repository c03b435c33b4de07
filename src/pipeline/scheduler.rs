// Pipeline Scheduler
//
// Drives the pipeline through randomized activation windows:
//
//   Idle -> Scheduled -> Active -> Idle -> ...
//
// Waiting uses monotonic deadlines and a single `sleep_until` per step, so
// the loop never polls. Each cycle runs in its own task and is awaited
// before anything else happens, which contains panics without letting
// cycles overlap.

use super::cycle::Pipeline;
use crate::error::Result;
use crate::settings::SchedulerSettings;
use crate::types::CycleReport;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{error, info};

/// Something the scheduler can run once per tick
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self) -> Result<CycleReport>;
}

#[async_trait]
impl CycleRunner for Pipeline {
    async fn run_cycle(&self) -> Result<CycleReport> {
        Pipeline::run_cycle(self).await
    }
}

/// Jitter ranges the scheduler draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRanges {
    pub activation_delay_max: Duration,
    pub window_min: Duration,
    pub window_max: Duration,
    pub run_interval_min: Duration,
    pub run_interval_max: Duration,
}

impl From<&SchedulerSettings> for ScheduleRanges {
    fn from(s: &SchedulerSettings) -> Self {
        Self {
            activation_delay_max: Duration::from_secs(s.activation_delay_max_secs),
            window_min: Duration::from_secs(s.window_min_secs),
            window_max: Duration::from_secs(s.window_max_secs),
            run_interval_min: Duration::from_secs(s.run_interval_min_secs),
            run_interval_max: Duration::from_secs(s.run_interval_max_secs),
        }
    }
}

impl Default for ScheduleRanges {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

impl ScheduleRanges {
    /// Delay before the next window opens, in [0, activation_delay_max)
    pub fn activation_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let max = self.activation_delay_max.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..max))
    }

    /// Window length, in [window_min, window_max]
    pub fn window_length<R: Rng>(&self, rng: &mut R) -> Duration {
        uniform(rng, self.window_min, self.window_max)
    }

    /// Gap before the next cycle, in [run_interval_min, run_interval_max]
    pub fn run_interval<R: Rng>(&self, rng: &mut R) -> Duration {
        uniform(rng, self.run_interval_min, self.run_interval_max)
    }
}

/// Millisecond-resolution uniform draw; a collapsed range yields `min`
fn uniform<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Scheduler state; deadlines are monotonic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled {
        activation_time: Instant,
    },
    Active {
        deactivation_time: Instant,
        next_run_time: Instant,
    },
}

pub struct PipelineScheduler<R: CycleRunner> {
    runner: Arc<R>,
    ranges: ScheduleRanges,
    run_on_start: bool,
    rng: StdRng,
    cycles_run: u64,
}

impl<R: CycleRunner> PipelineScheduler<R> {
    pub fn new(runner: Arc<R>, ranges: ScheduleRanges) -> Self {
        Self {
            runner,
            ranges,
            run_on_start: true,
            rng: StdRng::from_entropy(),
            cycles_run: 0,
        }
    }

    pub fn run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    /// Replace the jitter source, e.g. with a seeded one
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Cycles attempted so far, including failed and panicked ones
    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    /// Loop until `shutdown` resolves. Returns the scheduler so callers can
    /// inspect it afterwards.
    pub async fn run_until<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run_forever() => {}
            _ = shutdown => info!("Shutdown requested, scheduler stopping"),
        }
        self
    }

    async fn run_forever(&mut self) {
        if self.run_on_start {
            info!("Running initial cycle");
            self.execute_cycle().await;
        }

        let mut state = SchedulerState::Idle;
        loop {
            state = self.step(state).await;
        }
    }

    /// Advance the state machine by one transition or one wait
    pub async fn step(&mut self, state: SchedulerState) -> SchedulerState {
        match state {
            SchedulerState::Idle => {
                let delay = self.ranges.activation_delay(&mut self.rng);
                info!("Next activation window opens in {}s", delay.as_secs());
                SchedulerState::Scheduled {
                    activation_time: Instant::now() + delay,
                }
            }

            SchedulerState::Scheduled { activation_time } => {
                sleep_until(activation_time).await;

                let window = self.ranges.window_length(&mut self.rng);
                let first_run = self.ranges.run_interval(&mut self.rng);
                info!(
                    "Activation window open for {}s, first cycle in {}s",
                    window.as_secs(),
                    first_run.as_secs()
                );
                SchedulerState::Active {
                    deactivation_time: activation_time + window,
                    next_run_time: Instant::now() + first_run,
                }
            }

            SchedulerState::Active {
                deactivation_time,
                next_run_time,
            } => {
                let now = Instant::now();
                if now >= deactivation_time {
                    info!("Activation window closed");
                    return SchedulerState::Idle;
                }

                if now >= next_run_time {
                    self.execute_cycle().await;
                    let interval = self.ranges.run_interval(&mut self.rng);
                    info!("Next cycle in {}s", interval.as_secs());
                    return SchedulerState::Active {
                        deactivation_time,
                        next_run_time: Instant::now() + interval,
                    };
                }

                sleep_until(next_run_time.min(deactivation_time)).await;
                state
            }
        }
    }

    /// Run one cycle in its own task; errors and panics stop here
    async fn execute_cycle(&mut self) {
        self.cycles_run += 1;
        let runner = Arc::clone(&self.runner);

        match tokio::spawn(async move { runner.run_cycle().await }).await {
            Ok(Ok(report)) => info!(
                "Cycle {} done: {} proposed, {} succeeded",
                report.cycle_id, report.actions_proposed, report.actions_succeeded
            ),
            Ok(Err(e)) => error!("Cycle failed: {}", e),
            Err(e) if e.is_panic() => error!("Cycle panicked: {}", e),
            Err(e) => error!("Cycle task aborted: {}", e),
        }
    }
}

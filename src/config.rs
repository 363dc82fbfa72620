use std::time::Duration;

use anyhow::{bail, Context};
use thiserror::Error;

use crate::gate::GateError;

/// One screen line per task slot has to fit on a terminal.
pub const MAX_TASKS: usize = 100;

/// Fatal problems found while setting up a run. Nothing is spawned when one
/// of these occurs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SetupError {
    #[error("need at least 2 task slots for one worker, got {0}")]
    TooFewTasks(usize),
    #[error("{0} task slots do not fit on the screen")]
    TooManyTasks(usize),
    #[error("{0} must not be zero")]
    ZeroDuration(&'static str),
    #[error("coordinator poll interval {poll:?} must be shorter than a worker iteration {iteration:?}")]
    PollTooSlow { poll: Duration, iteration: Duration },
    #[error("cannot create startup gate: {0}")]
    Gate(#[from] GateError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of task slots. Workers get the indices `1..tasks`.
    pub tasks: usize,
    pub threshold: u32,
    /// Worker `i` sleeps `i * unit` twice per iteration.
    pub unit: Duration,
    pub indicator_period: Duration,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tasks: 10,
            threshold: 1000,
            unit: Duration::from_millis(100),
            indicator_period: Duration::from_millis(700),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl Config {
    pub fn from_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Config> {
        let mut config = Config::default();

        if let Some(tasks) = args.next() {
            config.tasks = tasks
                .parse()
                .with_context(|| format!("invalid task count: {tasks}"))?;
        }
        if let Some(threshold) = args.next() {
            config.threshold = threshold
                .parse()
                .with_context(|| format!("invalid threshold: {threshold}"))?;
        }
        if let Some(extra) = args.next() {
            bail!("unexpected argument: {extra}");
        }

        Ok(config)
    }

    pub fn workers(&self) -> impl Iterator<Item = usize> {
        1..self.tasks
    }

    pub fn worker_count(&self) -> usize {
        self.tasks.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.tasks < 2 {
            return Err(SetupError::TooFewTasks(self.tasks));
        }
        if self.tasks > MAX_TASKS {
            return Err(SetupError::TooManyTasks(self.tasks));
        }

        for (name, duration) in [
            ("unit", self.unit),
            ("indicator period", self.indicator_period),
            ("poll interval", self.poll_interval),
        ] {
            if duration.is_zero() {
                return Err(SetupError::ZeroDuration(name));
            }
        }

        // the fastest worker writes once per two units, polling faster than
        // that keeps the overshoot to one write per worker
        let iteration = self.unit * 2;
        if self.poll_interval >= iteration {
            return Err(SetupError::PollTooSlow {
                poll: self.poll_interval,
                iteration,
            });
        }

        Ok(())
    }
}

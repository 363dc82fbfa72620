//! Bootstrap and lifecycle of a whole simulation run.
//!
//! A `System` owns at most one run at a time and moves through
//! `Idle -> Running -> ShuttingDown -> Idle`. A restart is a shutdown
//! followed by a fresh start: every task of the old run is joined and all
//! shared state is built anew.

use log::{debug, error, info};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::{
    config::{Config, SetupError},
    coordinator::{Coordinator, CoordinatorReport},
    counter::SharedCounter,
    display::{counter_row, DisplayHandle, ERROR_ROW, HEADER_COL, HEADER_ROW},
    gate::Gate,
    indicator::{IndicatorReport, IndicatorTimer},
    shutdown::{StopFlags, StopSignal},
    worker::{Worker, WorkerReport},
};

#[derive(Error, Debug)]
pub enum SystemError {
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error("a run is already active")]
    AlreadyRunning,
    #[error("no run is active")]
    NotRunning,
    #[error("task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    ShuttingDown,
}

#[derive(Clone)]
pub struct SharedState {
    pub counter: SharedCounter,
    pub flags: StopFlags,
    pub gate: Gate,
}

impl SharedState {
    pub fn new(gate_capacity: usize) -> Result<SharedState, SetupError> {
        Ok(SharedState {
            counter: SharedCounter::new(),
            flags: StopFlags::new(),
            gate: Gate::new(gate_capacity)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub generation: u64,
    pub counter: u32,
    pub frozen: bool,
    pub stopped: bool,
    pub indicators_stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub generation: u64,
    pub aborted: bool,
    pub final_value: u32,
    /// Coordinators that saw the threshold. At most one.
    pub coordinator_terminations: usize,
    pub workers: Vec<WorkerReport>,
    pub indicators: Vec<IndicatorReport>,
    pub lost_updates: u64,
}

enum TaskOutcome {
    Worker(WorkerReport),
    Indicator(IndicatorReport),
    Coordinator(CoordinatorReport),
}

struct Run {
    generation: u64,
    shared: SharedState,
    abort: StopSignal,
    tasks: JoinSet<TaskOutcome>,
    outcomes: Vec<TaskOutcome>,
}

impl Run {
    /// Join every remaining task. Outcomes are kept as they come in, so this
    /// can be cancelled and called again.
    async fn drain(&mut self) -> Result<(), SystemError> {
        let mut failure = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => self.outcomes.push(outcome),
                Err(e) => {
                    error!("task of run {} failed: {e}", self.generation);
                    // take the rest of the run down with it
                    self.abort.raise();
                    failure.get_or_insert(SystemError::TaskFailed(e.to_string()));
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }

    async fn into_report(self) -> RunReport {
        let mut report = RunReport {
            generation: self.generation,
            aborted: self.abort.is_raised(),
            final_value: self.shared.counter.read().await,
            coordinator_terminations: 0,
            workers: vec![],
            indicators: vec![],
            lost_updates: 0,
        };

        for outcome in self.outcomes {
            match outcome {
                TaskOutcome::Worker(worker) => {
                    report.lost_updates += worker.lost_updates;
                    report.workers.push(worker);
                }
                TaskOutcome::Indicator(indicator) => report.indicators.push(indicator),
                TaskOutcome::Coordinator(coordinator) => {
                    if coordinator.final_value.is_some() {
                        report.coordinator_terminations += 1;
                    }
                }
            }
        }
        report.workers.sort_by_key(|w| w.record.index);
        report.indicators.sort_by_key(|i| i.owner);

        report
    }
}

pub struct System {
    config: Config,
    display: DisplayHandle,
    phase: Phase,
    generation: u64,
    run: Option<Run>,
}

impl System {
    pub fn new(config: Config, display: DisplayHandle) -> Self {
        Self {
            config,
            display,
            phase: Phase::Idle,
            generation: 0,
            run: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// A setup failure is shown on the display and nothing is spawned.
    pub fn start(&mut self) -> Result<(), SystemError> {
        if self.run.is_some() {
            return Err(SystemError::AlreadyRunning);
        }

        match self.bootstrap() {
            Ok(run) => {
                self.run = Some(run);
                self.transition(Phase::Running);
                Ok(())
            }
            Err(e) => {
                error!("cannot start simulation: {e}");
                self.display.render_at(ERROR_ROW, 0, format!("Fatal error: {e}"));
                self.display.refresh();
                Err(e.into())
            }
        }
    }

    fn bootstrap(&mut self) -> Result<Run, SetupError> {
        self.config.validate()?;
        let shared = SharedState::new(self.config.worker_count())?;

        self.generation += 1;
        let generation = self.generation;
        info!(
            "starting run {generation}: {} workers, threshold {}, gate capacity {}",
            self.config.worker_count(),
            self.config.threshold,
            shared.gate.capacity()
        );

        self.display.clear();
        self.display.render_at(
            HEADER_ROW,
            HEADER_COL,
            "Press 'q' to quit application !!!",
        );
        self.display.refresh();

        let abort = StopSignal::new();
        let mut tasks = JoinSet::new();

        for index in self.config.workers() {
            let worker = Worker::new(
                index,
                self.config.unit,
                &shared,
                self.display.clone(),
                abort.token(),
            );
            tasks.spawn(async move { TaskOutcome::Worker(worker.run().await) });

            let timer = IndicatorTimer::new(
                index,
                self.config.indicator_period,
                &shared,
                self.display.clone(),
                abort.token(),
            );
            tasks.spawn(async move { TaskOutcome::Indicator(timer.run().await) });
        }

        let coordinator = Coordinator::new(
            self.config.threshold,
            self.config.poll_interval,
            counter_row(self.config.tasks),
            shared.counter.clone(),
            shared.flags.stopped.clone(),
            self.display.clone(),
            abort.token(),
        );
        tasks.spawn(async move { TaskOutcome::Coordinator(coordinator.run().await) });

        Ok(Run {
            generation,
            shared,
            abort,
            tasks,
            outcomes: vec![],
        })
    }

    /// Cancel safe: dropping the future keeps the run and its progress.
    pub async fn wait(&mut self) -> Result<RunReport, SystemError> {
        let drained = match self.run.as_mut() {
            Some(run) => run.drain().await,
            None => return Err(SystemError::NotRunning),
        };

        let run = self.run.take().ok_or(SystemError::NotRunning)?;
        self.transition(Phase::Idle);
        drained?;

        let report = run.into_report().await;
        info!(
            "run {} finished at {} ({} lost updates)",
            report.generation, report.final_value, report.lost_updates
        );
        Ok(report)
    }

    /// Tear the current run down. Returns `None` if nothing was running.
    pub async fn shutdown(&mut self) -> Result<Option<RunReport>, SystemError> {
        let Some(mut run) = self.run.take() else {
            return Ok(None);
        };

        self.transition(Phase::ShuttingDown);
        run.abort.raise();
        let drained = run.drain().await;
        self.transition(Phase::Idle);
        drained?;

        let report = run.into_report().await;
        info!(
            "run {} shut down at {}",
            report.generation, report.final_value
        );
        Ok(Some(report))
    }

    pub async fn restart(&mut self) -> Result<(), SystemError> {
        self.shutdown().await?;
        self.start()
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        let run = self.run.as_ref()?;

        Some(Snapshot {
            phase: self.phase,
            generation: run.generation,
            counter: run.shared.counter.read().await,
            frozen: run.shared.counter.is_frozen().await,
            stopped: run.shared.flags.stopped.is_raised(),
            indicators_stopped: run.shared.flags.indicators_stopped.is_raised(),
        })
    }

    fn transition(&mut self, next: Phase) {
        debug!("system: {:?} -> {next:?}", self.phase);
        self.phase = next;
    }
}

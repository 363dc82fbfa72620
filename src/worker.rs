use std::time::Duration;

use log::{debug, info, warn};
use tokio::{select, time::sleep};

use crate::{
    counter::{SharedCounter, WriteOutcome},
    display::{worker_row, DisplayHandle, WORKER_STATUS_COL},
    gate::{Gate, GateOutcome},
    shutdown::StopToken,
    system::SharedState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Running,
    Finishing,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub index: usize,
    pub local_cache: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub record: WorkerRecord,
    pub gate: GateOutcome,
    /// Went through `Finishing`. `false` if the run was torn down first.
    pub finished: bool,
    pub iterations: u64,
    pub stored: u64,
    pub lost_updates: u64,
}

pub struct Worker {
    record: WorkerRecord,
    state: WorkerState,
    delay: Duration,
    counter: SharedCounter,
    gate: Gate,
    stopped: StopToken,
    indicators_stopped: StopToken,
    display: DisplayHandle,
    abort: StopToken,
}

impl Worker {
    pub fn new(
        index: usize,
        unit: Duration,
        shared: &SharedState,
        display: DisplayHandle,
        abort: StopToken,
    ) -> Self {
        Self {
            record: WorkerRecord {
                index,
                local_cache: 0,
            },
            state: WorkerState::Starting,
            delay: unit * index as u32,
            counter: shared.counter.clone(),
            gate: shared.gate.clone(),
            stopped: shared.flags.stopped.token(),
            indicators_stopped: shared.flags.indicators_stopped.token(),
            display,
            abort,
        }
    }

    pub async fn run(mut self) -> WorkerReport {
        let index = self.record.index;
        let row = worker_row(index);

        self.display.render_at(row, 0, format!("Task {index}"));

        let gate = self.gate.try_pass();
        match gate {
            GateOutcome::Closed => {
                self.display.render_at(row, WORKER_STATUS_COL, "running...");
                self.display.refresh();
            }
            // unreachable as long as the gate starts without permits
            GateOutcome::Open => warn!("worker {index}: startup gate was open"),
        }

        let mut report = WorkerReport {
            record: self.record.clone(),
            gate,
            finished: false,
            iterations: 0,
            stored: 0,
            lost_updates: 0,
        };

        self.transition(WorkerState::Running);
        loop {
            self.record.local_cache = self.counter.read().await;
            if !self.pause().await {
                return self.terminate(report);
            }

            self.record.local_cache = self.record.local_cache.saturating_add(1);
            if !self.pause().await {
                return self.terminate(report);
            }

            report.iterations += 1;
            match self.counter.write(self.record.local_cache).await {
                WriteOutcome::Stored => report.stored += 1,
                WriteOutcome::Stale { .. } => report.lost_updates += 1,
                WriteOutcome::Frozen { current } => {
                    debug!("worker {index}: counter frozen at {current}");
                }
            }

            if self.stopped.is_raised() {
                break;
            }
        }

        // nothing left to count, only the indicators have to settle
        select! {
            _ = self.indicators_stopped.wait() => {},
            _ = self.abort.wait() => return self.terminate(report),
        }

        self.transition(WorkerState::Finishing);
        self.display.render_at(
            row,
            WORKER_STATUS_COL,
            format!("Task finished: {}", self.record.local_cache),
        );
        self.display.refresh();
        report.finished = true;

        self.terminate(report)
    }

    /// Returns `false` if the run was aborted meanwhile.
    async fn pause(&mut self) -> bool {
        select! {
            _ = sleep(self.delay) => true,
            _ = self.abort.wait() => false,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(
            "worker {}: {:?} -> {next:?}",
            self.record.index, self.state
        );
        self.state = next;
    }

    fn terminate(mut self, mut report: WorkerReport) -> WorkerReport {
        self.transition(WorkerState::Terminated);
        report.record = self.record.clone();
        if report.finished {
            info!(
                "worker {} finished at {} ({} stored, {} lost)",
                report.record.index, report.record.local_cache, report.stored, report.lost_updates
            );
        } else {
            debug!("worker {} aborted", report.record.index);
        }
        report
    }
}

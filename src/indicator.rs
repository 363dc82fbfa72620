use std::time::Duration;

use log::{debug, info};
use tokio::{
    select,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    display::{worker_row, DisplayHandle, INDICATOR_COL},
    gate::Gate,
    shutdown::{StopSignal, StopToken},
    system::SharedState,
};

pub const LABELS: [&str; 4] = ["running", "running.", "running..", "running..."];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorState {
    owner: usize,
    phase: u8,
}

impl IndicatorState {
    pub fn new(owner: usize) -> Self {
        Self { owner, phase: 0 }
    }

    #[cfg(test)]
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Label of the current phase. Moves on to the next phase.
    pub fn advance(&mut self) -> &'static str {
        let label = LABELS[self.phase as usize];
        self.phase = (self.phase + 1) % LABELS.len() as u8;
        label
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorReport {
    pub owner: usize,
    pub firings: u64,
    /// `false` when the run was torn down before `stopped` was seen.
    pub disarmed: bool,
    pub raised_flag: bool,
}

pub struct IndicatorTimer {
    state: IndicatorState,
    period: Duration,
    stopped: StopToken,
    indicators_stopped: StopSignal,
    gate: Gate,
    display: DisplayHandle,
    abort: StopToken,
}

impl IndicatorTimer {
    pub fn new(
        owner: usize,
        period: Duration,
        shared: &SharedState,
        display: DisplayHandle,
        abort: StopToken,
    ) -> Self {
        Self {
            state: IndicatorState::new(owner),
            period,
            stopped: shared.flags.stopped.token(),
            indicators_stopped: shared.flags.indicators_stopped.clone(),
            gate: shared.gate.clone(),
            display,
            abort,
        }
    }

    pub async fn run(mut self) -> IndicatorReport {
        let owner = self.state.owner;
        let mut report = IndicatorReport {
            owner,
            firings: 0,
            disarmed: false,
            raised_flag: false,
        };

        // the gate starts empty, this always comes back closed
        let outcome = self.gate.try_pass();
        debug!("indicator {owner}: startup gate {outcome:?}");

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = ticker.tick() => {},
                _ = self.abort.wait() => {
                    debug!("indicator {owner} aborted after {} firings", report.firings);
                    return report;
                }
            }

            report.firings += 1;
            if self.fire() {
                report.disarmed = true;
                report.raised_flag = self.indicators_stopped.raise();
                if report.raised_flag {
                    info!("indicator {owner} stopped the indicators");
                }
                return report;
            }
        }
    }

    /// One timer callback. Returns `true` when the timer has to disarm.
    fn fire(&mut self) -> bool {
        let label = self.state.advance();
        self.display.render_at(
            worker_row(self.state.owner),
            INDICATOR_COL,
            format!("{label:<width$}", width = LABELS[3].len()),
        );
        self.display.refresh();

        self.stopped.is_raised()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::display::{recording::RecordingDisplay, spawn_renderer};

    #[test]
    fn phases_cycle() {
        let mut state = IndicatorState::new(3);
        let labels = (0..9).map(|_| state.advance()).collect::<Vec<_>>();

        assert_eq!(
            labels,
            vec![
                "running",
                "running.",
                "running..",
                "running...",
                "running",
                "running.",
                "running..",
                "running...",
                "running"
            ]
        );
        assert_eq!(state.phase(), 1);
    }

    proptest! {
        #[test]
        fn phase_follows_previous(steps in 0usize..200) {
            let mut state = IndicatorState::new(1);
            for _ in 0..steps {
                let before = state.phase();
                state.advance();
                prop_assert_eq!(state.phase(), (before + 1) % 4);
            }
            prop_assert_eq!(state.phase() as usize, steps % 4);
        }
    }

    fn timer(display: DisplayHandle, shared: &SharedState, abort: &StopSignal) -> IndicatorTimer {
        IndicatorTimer::new(
            2,
            Duration::from_millis(700),
            shared,
            display,
            abort.token(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn fires_until_stopped() {
        let recording = RecordingDisplay::new();
        let (display, _renderer) = spawn_renderer(recording.clone());
        let shared = SharedState::new(1).unwrap();
        let flags = &shared.flags;
        let abort = StopSignal::new();

        let handle = tokio::spawn(timer(display, &shared, &abort).run());

        // five firings at 700, 1400, 2100, 2800, 3500
        tokio::time::sleep(Duration::from_millis(3600)).await;
        assert!(!handle.is_finished());
        flags.stopped.raise();

        let report = handle.await.unwrap();
        assert_eq!(report.firings, 6);
        assert!(report.disarmed);
        assert!(report.raised_flag);
        assert!(flags.indicators_stopped.is_raised());

        tokio::time::sleep(Duration::from_millis(1)).await;
        let texts = recording.texts_at(worker_row(2), INDICATOR_COL);
        let expected = (0..6)
            .map(|i| format!("{:<10}", LABELS[i % 4]))
            .collect::<Vec<_>>();
        assert_eq!(texts, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn second_timer_does_not_claim_flag() {
        let (display, _renderer) = spawn_renderer(RecordingDisplay::new());
        let shared = SharedState::new(1).unwrap();
        let flags = &shared.flags;
        let abort = StopSignal::new();

        flags.stopped.raise();
        let first = tokio::spawn(timer(display.clone(), &shared, &abort).run());
        let second = tokio::spawn(timer(display, &shared, &abort).run());

        let first = first.await.unwrap();
        let second = second.await.unwrap();

        assert!(first.disarmed && second.disarmed);
        assert_eq!(first.firings, 1);
        assert!(first.raised_flag != second.raised_flag);
        assert!(flags.indicators_stopped.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn abort_ends_timer() {
        let (display, _renderer) = spawn_renderer(RecordingDisplay::new());
        let shared = SharedState::new(1).unwrap();
        let flags = &shared.flags;
        let abort = StopSignal::new();

        let handle = tokio::spawn(timer(display, &shared, &abort).run());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        abort.raise();

        let report = handle.await.unwrap();
        assert_eq!(report.firings, 2);
        assert!(!report.disarmed);
        assert!(!flags.indicators_stopped.is_raised());
    }
}

use std::time::Duration;

use log::{debug, info};
use tokio::{select, time::sleep};

use crate::{
    counter::SharedCounter,
    display::DisplayHandle,
    shutdown::{StopSignal, StopToken},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub polls: u64,
    /// Frozen counter value, `None` if the run was torn down first.
    pub final_value: Option<u32>,
}

/// The only owner of the raising side of `stopped`.
pub struct Coordinator {
    threshold: u32,
    poll_interval: Duration,
    row: u16,
    counter: SharedCounter,
    stopped: StopSignal,
    display: DisplayHandle,
    abort: StopToken,
}

impl Coordinator {
    pub fn new(
        threshold: u32,
        poll_interval: Duration,
        row: u16,
        counter: SharedCounter,
        stopped: StopSignal,
        display: DisplayHandle,
        abort: StopToken,
    ) -> Self {
        Self {
            threshold,
            poll_interval,
            row,
            counter,
            stopped,
            display,
            abort,
        }
    }

    pub async fn run(mut self) -> CoordinatorReport {
        let mut polls = 0;

        loop {
            let value = self.counter.read().await;
            polls += 1;
            self.show(value);

            if value >= self.threshold {
                let final_value = self.counter.freeze().await;
                self.stopped.raise();
                self.show(final_value);
                info!(
                    "counter reached {value} (threshold {}), frozen at {final_value} after {polls} polls",
                    self.threshold
                );

                return CoordinatorReport {
                    polls,
                    final_value: Some(final_value),
                };
            }

            select! {
                _ = sleep(self.poll_interval) => {},
                _ = self.abort.wait() => {
                    debug!("coordinator aborted at {value}");
                    return CoordinatorReport { polls, final_value: None };
                }
            }
        }
    }

    fn show(&self, value: u32) {
        self.display.render_at(self.row, 0, format!("Global Variable: {value}"));
        self.display.refresh();
    }
}

#[cfg(test)]
mod tests {
    use tokio::spawn;

    use super::*;
    use crate::display::{recording::RecordingDisplay, spawn_renderer};

    fn coordinator(
        threshold: u32,
        counter: &SharedCounter,
        stopped: &StopSignal,
        abort: &StopSignal,
        display: DisplayHandle,
    ) -> Coordinator {
        Coordinator::new(
            threshold,
            Duration::from_millis(10),
            15,
            counter.clone(),
            stopped.clone(),
            display,
            abort.token(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn raises_stop_at_threshold() {
        let recording = RecordingDisplay::new();
        let (display, _renderer) = spawn_renderer(recording.clone());
        let counter = SharedCounter::new();
        let stopped = StopSignal::new();
        let abort = StopSignal::new();

        let handle = spawn(coordinator(3, &counter, &stopped, &abort, display).run());

        for v in 1..=2 {
            counter.write(v).await;
            tokio::time::sleep(Duration::from_millis(25)).await;
            assert!(!stopped.is_raised());
        }

        counter.write(3).await;
        // within one poll interval
        tokio::time::sleep(Duration::from_millis(11)).await;
        assert!(stopped.is_raised());

        let report = handle.await.unwrap();
        assert_eq!(report.final_value, Some(3));
        assert!(counter.is_frozen().await);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(
            recording.texts_at(15, 0).last().map(String::as_str),
            Some("Global Variable: 3")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overshoot_is_accepted() {
        let (display, _renderer) = spawn_renderer(RecordingDisplay::new());
        let counter = SharedCounter::new();
        let stopped = StopSignal::new();
        let abort = StopSignal::new();

        // jumped past the threshold before the first poll
        counter.write(12).await;
        let report = coordinator(10, &counter, &stopped, &abort, display)
            .run()
            .await;

        assert_eq!(report.polls, 1);
        assert_eq!(report.final_value, Some(12));
        assert!(stopped.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn abort_leaves_stop_alone() {
        let (display, _renderer) = spawn_renderer(RecordingDisplay::new());
        let counter = SharedCounter::new();
        let stopped = StopSignal::new();
        let abort = StopSignal::new();

        let handle = spawn(coordinator(10, &counter, &stopped, &abort, display).run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        abort.raise();

        let report = handle.await.unwrap();
        assert_eq!(report.final_value, None);
        assert!(report.polls >= 10);
        assert!(!stopped.is_raised());
        assert!(!counter.is_frozen().await);
    }
}

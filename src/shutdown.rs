use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::broadcast;

/// The signal is level-triggered for non-blocking checks (`is_raised`) and
/// edge-triggered for tasks that want to await it (`StopToken::wait`). Raising
/// it more than once is harmless.
#[derive(Clone)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
    should_stop_sender: broadcast::Sender<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (should_stop_sender, _) = broadcast::channel(1);

        StopSignal {
            raised: Arc::new(AtomicBool::new(false)),
            should_stop_sender,
        }
    }

    /// Raise the signal. Returns `true` only for the call that flipped it.
    pub fn raise(&self) -> bool {
        let first = !self.raised.swap(true, Ordering::AcqRel);
        if first {
            // nobody might be subscribed yet, that's fine: late subscribers
            // see the level flag
            self.should_stop_sender.send(()).ok();
        }
        first
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            raised: self.raised.clone(),
            should_stop_receiver: self.should_stop_sender.subscribe(),
        }
    }
}

/// Read-only view of a `StopSignal`. Holders can observe the signal but
/// never raise it.
pub struct StopToken {
    raised: Arc<AtomicBool>,
    should_stop_receiver: broadcast::Receiver<()>,
}

impl StopToken {
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub async fn wait(&mut self) {
        if self.is_raised() {
            return;
        }
        // the receiver was subscribed before the check above, so a raise in
        // between is still buffered in the channel
        self.should_stop_receiver.recv().await.ok();
    }
}

impl Clone for StopToken {
    fn clone(&self) -> Self {
        Self {
            raised: self.raised.clone(),
            should_stop_receiver: self.should_stop_receiver.resubscribe(),
        }
    }
}

/// The pair of signals that unwinds a run.
///
/// `stopped` is raised by the coordinator once the threshold is reached,
/// `indicators_stopped` by the first indicator timer that notices it.
#[derive(Clone)]
pub struct StopFlags {
    pub stopped: StopSignal,
    pub indicators_stopped: StopSignal,
}

impl StopFlags {
    pub fn new() -> Self {
        Self {
            stopped: StopSignal::new(),
            indicators_stopped: StopSignal::new(),
        }
    }
}

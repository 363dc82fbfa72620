//! Output side of the simulation.
//!
//! Tasks never touch the screen themselves. They send `RenderRequest`s through
//! a `DisplayHandle` to a single renderer task that owns the `Display`, so
//! output from different tasks can't interleave and a timer firing never
//! blocks on a lock.

#[cfg(test)]
pub mod recording;
pub mod terminal;

use log::debug;
use tokio::{
    spawn,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

pub const HEADER_ROW: u16 = 2;
pub const HEADER_COL: u16 = 20;
pub const ERROR_ROW: u16 = 0;
pub const WORKER_ROW_BASE: u16 = 5;
pub const WORKER_STATUS_COL: u16 = 15;
pub const INDICATOR_COL: u16 = 40;

pub fn worker_row(index: usize) -> u16 {
    below_workers(index)
}

/// Row below the last worker line, where the counter is shown.
pub fn counter_row(tasks: usize) -> u16 {
    below_workers(tasks)
}

// pins to the last row instead of wrapping around
fn below_workers(offset: usize) -> u16 {
    u16::try_from(offset).map_or(u16::MAX, |offset| WORKER_ROW_BASE.saturating_add(offset))
}

pub trait Display {
    fn render_at(&mut self, row: u16, col: u16, text: &str);

    fn refresh(&mut self);

    fn clear(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderRequest {
    Text { row: u16, col: u16, text: String },
    Refresh,
    Clear,
}

#[derive(Clone)]
pub struct DisplayHandle {
    sender: UnboundedSender<RenderRequest>,
}

impl DisplayHandle {
    pub fn render_at(&self, row: u16, col: u16, text: impl Into<String>) {
        self.send(RenderRequest::Text {
            row,
            col,
            text: text.into(),
        });
    }

    pub fn refresh(&self) {
        self.send(RenderRequest::Refresh);
    }

    pub fn clear(&self) {
        self.send(RenderRequest::Clear);
    }

    fn send(&self, request: RenderRequest) {
        if self.sender.send(request).is_err() {
            debug!("renderer is gone, dropping render request");
        }
    }
}

/// Spawn the renderer task. It runs until every `DisplayHandle` is dropped
/// and then hands the display back.
pub fn spawn_renderer<D>(display: D) -> (DisplayHandle, JoinHandle<D>)
where
    D: Display + Send + 'static,
{
    let (sender, receiver) = unbounded_channel();
    let handle = spawn(render_loop(display, receiver));

    (DisplayHandle { sender }, handle)
}

async fn render_loop<D: Display>(
    mut display: D,
    mut requests: UnboundedReceiver<RenderRequest>,
) -> D {
    while let Some(request) = requests.recv().await {
        match request {
            RenderRequest::Text { row, col, text } => display.render_at(row, col, &text),
            RenderRequest::Refresh => display.refresh(),
            RenderRequest::Clear => display.clear(),
        }
    }
    debug!("all display handles dropped, renderer finished");

    display
}

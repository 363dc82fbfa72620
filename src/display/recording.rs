use std::sync::{Arc, Mutex};

use super::{Display, RenderRequest};

#[derive(Clone, Default)]
pub struct RecordingDisplay {
    log: Arc<Mutex<Vec<RenderRequest>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.lock().clone()
    }

    /// All texts rendered at `(row, col)`, oldest first.
    pub fn texts_at(&self, row: u16, col: u16) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|request| match request {
                RenderRequest::Text { row: r, col: c, text } if *r == row && *c == col => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.lock().iter().any(|request| match request {
            RenderRequest::Text { text, .. } => text.contains(needle),
            _ => false,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RenderRequest>> {
        // a panic while holding this lock can only come from a test thread
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Display for RecordingDisplay {
    fn render_at(&mut self, row: u16, col: u16, text: &str) {
        self.lock().push(RenderRequest::Text {
            row,
            col,
            text: text.to_string(),
        });
    }

    fn refresh(&mut self) {
        self.lock().push(RenderRequest::Refresh);
    }

    fn clear(&mut self) {
        self.lock().push(RenderRequest::Clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_position() {
        let mut display = RecordingDisplay::new();
        let view = display.clone();

        display.render_at(6, 40, "running");
        display.render_at(7, 40, "other");
        display.refresh();
        display.render_at(6, 40, "running.");

        assert_eq!(view.texts_at(6, 40), vec!["running", "running."]);
        assert!(view.contains_text("other"));
        assert!(!view.contains_text("missing"));
        assert_eq!(view.requests().len(), 4);
    }
}

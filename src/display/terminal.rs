use std::io::{self, Write};

use log::warn;

use super::Display;

pub struct TerminalDisplay<W: Write> {
    out: W,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes) {
            warn!("terminal write failed: {e}");
        }
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn render_at(&mut self, row: u16, col: u16, text: &str) {
        // ANSI positions are 1-based
        let seq = format!("\x1b[{};{}H{text}", row + 1, col + 1);
        self.write(seq.as_bytes());
    }

    fn refresh(&mut self) {
        if let Err(e) = self.out.flush() {
            warn!("terminal flush failed: {e}");
        }
    }

    fn clear(&mut self) {
        self.write(b"\x1b[2J\x1b[H");
    }
}

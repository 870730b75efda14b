//! Output surfaces for session lines and client notices.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Somewhere to show lines.  Lines arrive in display order.
pub trait Display {
    fn show(&mut self, line: &str);
}

/// Writes each line to stdout.
#[derive(Debug, Default)]
pub struct StdoutDisplay;

impl Display for StdoutDisplay {
    fn show(&mut self, line: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout leaves nothing useful to do with the line.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

/// Keeps every line in memory.  Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingDisplay {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything shown so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Display for RecordingDisplay {
    fn show(&mut self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_owned());
        }
    }
}

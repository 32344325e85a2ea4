//! Message Log Display
//!
//! Headless [`ProgressDisplay`]: keeps the latest status-bar state and a
//! timestamped message panel in memory. Lines are prefixed `[HH:MM:SS]`.

use chrono::Local;
use parking_lot::RwLock;

use crate::domain::ports::ProgressDisplay;

#[derive(Debug, Default)]
struct LogState {
    progress: u8,
    status: String,
    lines: Vec<String>,
    gauge_visible: bool,
}

/// In-memory status bar and message panel
#[derive(Debug, Default)]
pub struct MessageLog {
    state: RwLock<LogState>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported progress
    pub fn progress(&self) -> u8 {
        self.state.read().progress
    }

    /// Last status-bar message
    pub fn status(&self) -> String {
        self.state.read().status.clone()
    }

    /// Message panel lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.state.read().lines.clone()
    }

    /// Whether the progress gauge is showing
    pub fn gauge_visible(&self) -> bool {
        self.state.read().gauge_visible
    }

    /// Whether any panel line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.state.read().lines.iter().any(|l| l.contains(needle))
    }

    fn stamp(text: &str) -> String {
        format!("[{}] {}", Local::now().format("%H:%M:%S"), text)
    }
}

impl ProgressDisplay for MessageLog {
    fn set_progress(&self, progress: u8, message: &str) {
        let mut state = self.state.write();
        state.progress = progress.min(100);
        state.status = message.to_string();
        state.gauge_visible = true;
    }

    fn append_message(&self, text: &str) {
        let mut state = self.state.write();
        for line in text.lines() {
            state.lines.push(Self::stamp(line));
        }
    }

    fn finish(&self) {
        self.state.write().gauge_visible = false;
    }
}

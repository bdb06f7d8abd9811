// Build monitor state.
// Holds the watched build, the activity log, and the refreshed build list.

use chrono::{DateTime, Utc};
use ratatui::style::Color;
use ratatui::widgets::ListState;

use crate::api::{Build, BuildStatus};
use crate::polling::{NotificationLevel, PollEvent};

/// Oldest activity log lines are dropped past this many.
pub const MAX_MESSAGES: usize = 500;

/// Console message level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl From<NotificationLevel> for ConsoleLevel {
    fn from(level: NotificationLevel) -> Self {
        match level {
            NotificationLevel::Info => ConsoleLevel::Info,
            NotificationLevel::Success => ConsoleLevel::Success,
            NotificationLevel::Error => ConsoleLevel::Error,
        }
    }
}

/// A line in the activity log.
#[derive(Debug, Clone)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub message: String,
    /// Time of the latest occurrence.
    pub timestamp: DateTime<Utc>,
    /// How many consecutive times this message was logged.
    pub count: u32,
}

impl ConsoleMessage {
    pub fn new(level: ConsoleLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            count: 1,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Error, message)
    }
}

/// Complete state of the build monitor screen.
#[derive(Debug)]
pub struct MonitorState {
    /// Latest known state of the watched build.
    pub build: Build,
    /// The project's builds, as refetched once the build finished.
    pub builds: Vec<Build>,
    /// Activity log.
    pub messages: Vec<ConsoleMessage>,
    /// List state for message scrolling.
    pub list_state: ListState,
    /// Set once the terminal state has been observed.
    pub finished: bool,
    /// Poll failures since the last successful update.
    pub consecutive_failures: u32,
}

impl MonitorState {
    pub fn new(build: Build) -> Self {
        let mut state = Self {
            finished: build.is_terminal(),
            build,
            builds: Vec::new(),
            messages: Vec::new(),
            list_state: ListState::default(),
            consecutive_failures: 0,
        };
        let id = state.build.id.clone();
        state.log(ConsoleMessage::info(format!("Watching build {}", id)));
        state
    }

    /// Fold a poller event into the screen state.
    pub fn apply(&mut self, event: PollEvent) {
        match event {
            PollEvent::Updated(build) => {
                self.consecutive_failures = 0;
                if build.phase != self.build.phase {
                    if let Some(phase) = &build.phase {
                        self.log(ConsoleMessage::info(format!("Phase: {}", phase)));
                    }
                }
                if build.status != self.build.status {
                    self.log(ConsoleMessage::info(format!(
                        "Status: {}",
                        build.status.display()
                    )));
                }
                self.build = build;
            }
            PollEvent::Finished {
                build,
                notification,
            } => {
                self.consecutive_failures = 0;
                self.build = build;
                self.finished = true;
                self.log(ConsoleMessage::new(
                    notification.level.into(),
                    notification.message,
                ));
            }
            PollEvent::ListRefreshed(builds) => {
                self.log(ConsoleMessage::info(format!(
                    "Project has {} build(s)",
                    builds.len()
                )));
                self.builds = builds;
            }
            PollEvent::Failed(err) => {
                self.consecutive_failures += 1;
                let message = err.user_message();
                if err.is_connection_error() || err.is_timeout() {
                    self.log(ConsoleMessage::warn(message));
                } else {
                    self.log(ConsoleMessage::error(message));
                }
            }
        }
    }

    /// Append to the activity log. A repeat of the last line bumps its count instead.
    pub fn log(&mut self, message: ConsoleMessage) {
        match self.messages.last_mut() {
            Some(last) if last.level == message.level && last.message == message.message => {
                last.count = last.count.saturating_add(message.count);
                last.timestamp = message.timestamp;
            }
            _ => self.messages.push(message),
        }
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
        }
        self.scroll_to_bottom();
    }

    fn scroll_to_bottom(&mut self) {
        if !self.messages.is_empty() {
            self.list_state.select(Some(self.messages.len() - 1));
        }
    }

    /// Select previous message in list.
    pub fn select_prev(&mut self) {
        if self.messages.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => self.messages.len() - 1,
        };
        self.list_state.select(Some(i));
    }

    /// Select next message in list.
    pub fn select_next(&mut self) {
        if self.messages.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(self.messages.len() - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    /// Status label and color for the header.
    pub fn status_display(&self) -> (&'static str, Color) {
        match self.build.status {
            BuildStatus::Pending => ("PENDING", Color::Blue),
            BuildStatus::Processing if self.consecutive_failures > 0 => ("RECONNECTING", Color::Yellow),
            BuildStatus::Processing => ("BUILDING", Color::Yellow),
            BuildStatus::Completed => ("COMPLETED", Color::Green),
            BuildStatus::Failed => ("FAILED", Color::Red),
        }
    }
}
